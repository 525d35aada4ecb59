use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use courier_core::{DEFAULT_DOCUMENT_ID, EntityRef};

/// One stored configuration layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    /// `{type}_{id}`, or `_default` for the root.
    pub id: String,
    pub entity_type: String,
    pub entity_id: String,
    #[serde(default = "empty_object")]
    pub config: Value,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl ConfigDocument {
    #[must_use]
    pub fn for_entity(entity: &EntityRef, config: Value) -> Self {
        Self {
            id: entity.document_id(),
            entity_type: entity.entity_type.clone(),
            entity_id: entity.entity_id.clone(),
            config,
        }
    }

    /// The root document every inheritance chain ends at.
    #[must_use]
    pub fn root(config: Value) -> Self {
        Self {
            id: DEFAULT_DOCUMENT_ID.to_owned(),
            entity_type: DEFAULT_DOCUMENT_ID.to_owned(),
            entity_id: DEFAULT_DOCUMENT_ID.to_owned(),
            config,
        }
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.id == DEFAULT_DOCUMENT_ID
    }
}

/// Effective configuration for one entity after inheritance.
///
/// `entity` is always the entity that was asked for, whether or not it has a
/// document of its own.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedConfig {
    pub entity: EntityRef,
    pub config: Value,
}

impl ResolvedConfig {
    /// Look up a dotted path in the merged tree.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        courier_core::tree::get_path(&self.config, path)
    }
}
