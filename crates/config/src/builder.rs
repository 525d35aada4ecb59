use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

use crate::config_store::{CanEditDefaultFn, ConfigStore};
use crate::entity_type::EntityType;
use crate::error::ConfigError;
use crate::schema::ConfigSchema;
use crate::store::DocumentStore;

/// Fluent builder for a [`ConfigStore`].
///
/// A [`DocumentStore`] is required. The stock `user` entity type is added
/// unless one is registered explicitly, and nobody but trusted code may edit
/// the default document unless [`Self::can_edit_default`] says otherwise.
pub struct ConfigStoreBuilder {
    docs: Option<Arc<dyn DocumentStore>>,
    types: Vec<EntityType>,
    schema: ConfigSchema,
    can_edit_default: Option<CanEditDefaultFn>,
}

impl ConfigStoreBuilder {
    pub fn new() -> Self {
        Self {
            docs: None,
            types: Vec::new(),
            schema: ConfigSchema::new(),
            can_edit_default: None,
        }
    }

    /// Set the document store implementation.
    #[must_use]
    pub fn store(mut self, docs: Arc<dyn DocumentStore>) -> Self {
        self.docs = Some(docs);
        self
    }

    /// Register an entity type.
    #[must_use]
    pub fn entity_type(mut self, entity_type: EntityType) -> Self {
        self.types.push(entity_type);
        self
    }

    /// Set the root schema.
    #[must_use]
    pub fn schema(mut self, schema: ConfigSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Nest a schema under `prefix`.
    #[must_use]
    pub fn schema_for_prefix(mut self, prefix: &str, schema: &ConfigSchema) -> Self {
        self.schema.nest(prefix, schema);
        self
    }

    /// Decide which users may edit the default document.
    #[must_use]
    pub fn can_edit_default<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.can_edit_default = Some(Arc::new(f));
        self
    }

    /// Consume the builder and produce a [`ConfigStore`].
    ///
    /// Fails if no document store was set, or if an entity type forbids
    /// overriding a field the schema does not declare.
    pub fn build(self) -> Result<ConfigStore, ConfigError> {
        let docs = self
            .docs
            .ok_or_else(|| ConfigError::Configuration("document store is required".into()))?;

        let mut types: HashMap<String, EntityType> = HashMap::new();
        for entity_type in self.types {
            if let Some(path) = entity_type
                .forbidden_fields()
                .iter()
                .find(|path| !self.schema.allows_path(path))
            {
                return Err(ConfigError::Schema {
                    path: path.clone(),
                    reason: format!(
                        "listed in cannot_override for `{}` but not declared",
                        entity_type.name()
                    ),
                });
            }
            let name = entity_type.name().to_owned();
            if types.insert(name.clone(), entity_type).is_some() {
                warn!(entity_type = %name, "entity type registered twice, keeping the last");
            }
        }
        types
            .entry("user".to_owned())
            .or_insert_with(EntityType::user);

        let can_edit_default = self
            .can_edit_default
            .unwrap_or_else(|| Arc::new(|_: &str| false));

        Ok(ConfigStore {
            docs,
            types: RwLock::new(types),
            schema: RwLock::new(self.schema),
            can_edit_default: RwLock::new(can_edit_default),
        })
    }
}

impl Default for ConfigStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}
