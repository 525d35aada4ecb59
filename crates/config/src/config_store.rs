use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use courier_core::tree::{flatten_paths, get_path, merge_layers, set_path};
use courier_core::{DEFAULT_DOCUMENT_ID, EntityRef};

use crate::builder::ConfigStoreBuilder;
use crate::cache::DocumentCache;
use crate::document::{ConfigDocument, ResolvedConfig};
use crate::entity_type::{Actor, EntityType, Inherit, ResolveContext};
use crate::error::ConfigError;
use crate::schema::ConfigSchema;
use crate::store::DocumentStore;

/// Longest inheritance chain accepted before it is treated as runaway.
pub const MAX_CHAIN_DEPTH: usize = 16;

pub type CanEditDefaultFn = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Entity configuration with inheritance.
///
/// Every entity's effective configuration is the `_default` document,
/// overlaid by each ancestor from the outermost inwards, overlaid by the
/// entity's own document. Missing documents contribute nothing.
pub struct ConfigStore {
    pub(crate) docs: Arc<dyn DocumentStore>,
    pub(crate) types: RwLock<HashMap<String, EntityType>>,
    pub(crate) schema: RwLock<ConfigSchema>,
    pub(crate) can_edit_default: RwLock<CanEditDefaultFn>,
}

impl ConfigStore {
    /// Start building a store; a document store is required.
    pub fn builder() -> ConfigStoreBuilder {
        ConfigStoreBuilder::new()
    }

    /// The underlying document store.
    pub fn documents(&self) -> &Arc<dyn DocumentStore> {
        &self.docs
    }

    // -- registration -------------------------------------------------------

    /// Register an entity type. Registering a name twice replaces the earlier
    /// definition.
    pub fn add_entity_type(&self, entity_type: EntityType) {
        let name = entity_type.name().to_owned();
        if self.types.write().insert(name.clone(), entity_type).is_some() {
            warn!(entity_type = %name, "entity type redefined");
        }
    }

    /// Whether an entity type called `name` is registered.
    pub fn has_entity_type(&self, name: &str) -> bool {
        self.types.read().contains_key(name)
    }

    /// Registered type names, sorted.
    pub fn entity_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.types.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Replace the whole configuration schema.
    pub fn set_schema(&self, schema: ConfigSchema) {
        *self.schema.write() = schema;
    }

    /// Install `schema` under `prefix`, leaving other prefixes alone.
    pub fn set_schema_for_prefix(&self, prefix: &str, schema: &ConfigSchema) {
        self.schema.write().nest(prefix, schema);
    }

    /// A copy of the current schema.
    pub fn schema(&self) -> ConfigSchema {
        self.schema.read().clone()
    }

    /// Replace the predicate deciding which users may edit the default document.
    pub fn set_can_edit_default<F>(&self, f: F)
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        *self.can_edit_default.write() = Arc::new(f);
    }

    /// Whether `actor` may write the default document. Trusted callers always can.
    pub fn can_edit_default(&self, actor: &Actor) -> bool {
        match actor {
            Actor::Trusted => true,
            Actor::User(id) => {
                let allowed = self.can_edit_default.read().clone();
                allowed(id)
            }
        }
    }

    // -- reads --------------------------------------------------------------

    /// Ancestors of `entity`, nearest first, excluding the default.
    pub fn inheritance_chain(
        &self,
        entity: &EntityRef,
        ctx: &ResolveContext,
    ) -> Result<Vec<EntityRef>, ConfigError> {
        let types = self.types.read();
        let parent_of = |e: &EntityRef| {
            types
                .get(&e.entity_type)
                .map_or(Inherit::Default, |ty| ty.parent_of(&e.entity_id, ctx))
        };

        let mut chain: Vec<EntityRef> = Vec::new();
        let mut seen = HashSet::from([entity.document_id()]);
        let mut next = parent_of(entity);
        while let Inherit::Parent(parent) = next {
            if !parent.is_well_formed() {
                return Err(ConfigError::InheritanceChain(format!(
                    "{entity}: inherit must name a (type, id) pair, got ({:?}, {:?})",
                    parent.entity_type, parent.entity_id
                )));
            }
            if !seen.insert(parent.document_id()) {
                return Err(ConfigError::InheritanceChain(format!(
                    "{entity}: cycle through {parent}"
                )));
            }
            if chain.len() == MAX_CHAIN_DEPTH {
                return Err(ConfigError::InheritanceChain(format!(
                    "{entity}: chain deeper than {MAX_CHAIN_DEPTH}"
                )));
            }
            next = parent_of(&parent);
            chain.push(parent);
        }
        Ok(chain)
    }

    /// Effective configuration for one entity.
    #[instrument(skip_all, fields(entity = %entity))]
    pub async fn resolve(
        &self,
        entity: &EntityRef,
        ctx: &ResolveContext,
    ) -> Result<ResolvedConfig, ConfigError> {
        let chain = self.inheritance_chain(entity, ctx)?;
        self.merge_chain(entity, &chain, None).await
    }

    /// Effective configuration for many entities, index-aligned with the
    /// input, using one multi-key fetch for every document involved.
    #[instrument(skip_all, fields(entities = entities.len()))]
    pub async fn resolve_bulk(
        &self,
        entities: &[EntityRef],
        ctx: &ResolveContext,
    ) -> Result<Vec<ResolvedConfig>, ConfigError> {
        if entities.is_empty() {
            return Ok(Vec::new());
        }
        let chains = entities
            .iter()
            .map(|entity| self.inheritance_chain(entity, ctx))
            .collect::<Result<Vec<_>, _>>()?;

        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        let needed = std::iter::once(DEFAULT_DOCUMENT_ID.to_owned()).chain(
            entities
                .iter()
                .zip(&chains)
                .flat_map(|(entity, chain)| {
                    std::iter::once(entity).chain(chain.iter())
                })
                .map(EntityRef::document_id),
        );
        for id in needed {
            if seen.insert(id.clone()) {
                ids.push(id);
            }
        }
        let cache = self.prefetch(&ids).await?;
        debug!(documents = ids.len(), "prefetched configuration documents");

        let mut resolved = Vec::with_capacity(entities.len());
        for (entity, chain) in entities.iter().zip(&chains) {
            resolved.push(self.merge_chain(entity, chain, Some(&cache)).await?);
        }
        Ok(resolved)
    }

    /// Resolve one entity against documents the caller already fetched.
    ///
    /// Any document the cache knows nothing about is fetched directly, with a
    /// warning.
    pub async fn resolve_cached(
        &self,
        entity: &EntityRef,
        ctx: &ResolveContext,
        cache: &DocumentCache,
    ) -> Result<ResolvedConfig, ConfigError> {
        let chain = self.inheritance_chain(entity, ctx)?;
        self.merge_chain(entity, &chain, Some(cache)).await
    }

    /// Fetch `ids` in one round trip into a cache for [`Self::resolve_cached`].
    pub async fn prefetch(&self, ids: &[String]) -> Result<DocumentCache, ConfigError> {
        let mut cache = DocumentCache::new();
        for doc in self.docs.get_many(ids).await? {
            cache.insert(doc);
        }
        for id in ids {
            cache.insert_missing(id.clone());
        }
        Ok(cache)
    }

    /// The entity's own configuration, without inheritance. `{}` if it has none.
    pub async fn resolve_own(&self, entity: &EntityRef) -> Result<Value, ConfigError> {
        Ok(self
            .docs
            .get(&entity.document_id())
            .await?
            .map_or_else(empty_object, |doc| doc.config))
    }

    /// Own configuration for many entities in one fetch, index-aligned.
    pub async fn resolve_bulk_own(&self, entities: &[EntityRef]) -> Result<Vec<Value>, ConfigError> {
        if entities.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = entities.iter().map(EntityRef::document_id).collect();
        let found: HashMap<String, Value> = self
            .docs
            .get_many(&ids)
            .await?
            .into_iter()
            .map(|doc| (doc.id, doc.config))
            .collect();
        Ok(ids
            .iter()
            .map(|id| found.get(id).cloned().unwrap_or_else(empty_object))
            .collect())
    }

    async fn merge_chain(
        &self,
        entity: &EntityRef,
        chain: &[EntityRef],
        cache: Option<&DocumentCache>,
    ) -> Result<ResolvedConfig, ConfigError> {
        let ids = std::iter::once(DEFAULT_DOCUMENT_ID.to_owned())
            .chain(chain.iter().rev().map(EntityRef::document_id))
            .chain(std::iter::once(entity.document_id()));

        let mut layers = Vec::with_capacity(chain.len() + 2);
        for id in ids {
            if let Some(doc) = self.lookup(&id, cache).await? {
                layers.push(doc.config);
            }
        }
        Ok(ResolvedConfig {
            entity: entity.clone(),
            config: merge_layers(&layers),
        })
    }

    async fn lookup(
        &self,
        id: &str,
        cache: Option<&DocumentCache>,
    ) -> Result<Option<ConfigDocument>, ConfigError> {
        if let Some(cache) = cache {
            match cache.lookup(id) {
                Some(found) => return Ok(found.cloned()),
                None => warn!(document = id, "document not in cache, fetching directly"),
            }
        }
        self.docs.get(id).await
    }

    /// The default document's configuration, or `None` before one is written.
    pub async fn get_default(&self) -> Result<Option<Value>, ConfigError> {
        Ok(self.docs.get(DEFAULT_DOCUMENT_ID).await?.map(|doc| doc.config))
    }

    /// Whether the default document exists.
    pub async fn has_default(&self) -> Result<bool, ConfigError> {
        Ok(self.docs.get(DEFAULT_DOCUMENT_ID).await?.is_some())
    }

    /// Whether the default document has anything under `prefix`.
    pub async fn has_default_for_prefix(&self, prefix: &str) -> Result<bool, ConfigError> {
        Ok(self
            .get_default()
            .await?
            .is_some_and(|config| get_path(&config, prefix).is_some()))
    }

    /// Documents `actor_id` may see: the default plus whatever each entity
    /// type publishes to them.
    pub async fn visible_documents(&self, actor_id: &str) -> Result<Vec<ConfigDocument>, ConfigError> {
        let mut selections: Vec<(String, Vec<String>)> = self
            .types
            .read()
            .values()
            .map(|ty| (ty.name().to_owned(), ty.published_ids(actor_id)))
            .filter(|(_, ids)| !ids.is_empty())
            .collect();
        selections.sort_by(|a, b| a.0.cmp(&b.0));

        let mut docs = Vec::new();
        if let Some(root) = self.docs.get(DEFAULT_DOCUMENT_ID).await? {
            docs.push(root);
        }
        for (entity_type, ids) in selections {
            docs.extend(self.docs.find_by_type(&entity_type, &ids).await?);
        }
        Ok(docs)
    }

    // -- writes -------------------------------------------------------------

    /// Write configuration for an entity.
    ///
    /// Creates the document if needed. Otherwise `overwrite` replaces the
    /// whole tree, and a plain write sets each leaf path of `props` (arrays
    /// replaced whole) leaving the rest untouched.
    #[instrument(skip_all, fields(entity = %entity, overwrite = overwrite))]
    pub async fn set_for_entity(
        &self,
        actor: &Actor,
        entity: &EntityRef,
        props: Value,
        overwrite: bool,
    ) -> Result<(), ConfigError> {
        let entity_type = self
            .types
            .read()
            .get(&entity.entity_type)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownEntityType(entity.entity_type.clone()))?;

        if let Actor::User(actor_id) = actor
            && !entity_type.allows_write(actor_id, &entity.entity_id)
        {
            return Err(ConfigError::WriteDenied {
                actor: actor.to_string(),
                document: entity.document_id(),
            });
        }

        require_object(&props)?;
        let paths = flatten_paths(&props);
        if let Some(path) = entity_type.forbidden_path(paths.iter().map(|(p, _)| p.as_str())) {
            return Err(ConfigError::ForbiddenField {
                entity_type: entity.entity_type.clone(),
                path: path.to_owned(),
            });
        }
        self.schema.read().validate(&props)?;

        let id = entity.document_id();
        if self.docs.get(&id).await?.is_none() {
            debug!("creating configuration document");
            return self
                .docs
                .insert(ConfigDocument::for_entity(entity, props))
                .await;
        }
        if overwrite {
            self.docs.replace_config(&id, props).await?;
        } else {
            self.docs.set_paths(&id, paths).await?;
        }
        Ok(())
    }

    /// Replace the default document's configuration, creating it if needed.
    pub async fn set_default(&self, actor: &Actor, config: Value) -> Result<(), ConfigError> {
        self.authorize_default(actor)?;
        require_object(&config)?;
        self.schema.read().validate(&config)?;
        if self.docs.replace_config(DEFAULT_DOCUMENT_ID, config.clone()).await? {
            return Ok(());
        }
        self.docs.insert(ConfigDocument::root(config)).await
    }

    /// Set `prefix` in the default document to `data`, creating the default
    /// document if needed.
    pub async fn set_default_for_prefix(
        &self,
        actor: &Actor,
        prefix: &str,
        data: Value,
    ) -> Result<(), ConfigError> {
        self.authorize_default(actor)?;
        let update = vec![(prefix.to_owned(), data)];
        self.schema.read().validate_paths(&update)?;
        if self.docs.set_paths(DEFAULT_DOCUMENT_ID, update.clone()).await? {
            return Ok(());
        }
        let mut config = empty_object();
        for (path, value) in update {
            set_path(&mut config, &path, value);
        }
        self.docs.insert(ConfigDocument::root(config)).await
    }

    fn authorize_default(&self, actor: &Actor) -> Result<(), ConfigError> {
        if self.can_edit_default(actor) {
            Ok(())
        } else {
            Err(ConfigError::WriteDenied {
                actor: actor.to_string(),
                document: DEFAULT_DOCUMENT_ID.to_owned(),
            })
        }
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("entity_types", &self.entity_types())
            .field("schema_fields", &self.schema.read().len())
            .finish_non_exhaustive()
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

fn require_object(value: &Value) -> Result<(), ConfigError> {
    if value.is_object() {
        Ok(())
    } else {
        Err(ConfigError::Schema {
            path: String::new(),
            reason: "configuration must be an object".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDocumentStore;
    use crate::schema::FieldKind;
    use serde_json::json;

    fn user(id: &str) -> EntityRef {
        EntityRef::new("user", id)
    }

    /// `child` entities inherit from `root`, users inherit from their org
    /// (`org_<n>` for user `<n>`), orgs inherit the default.
    fn store_with(docs: Arc<MemoryDocumentStore>) -> ConfigStore {
        ConfigStore::builder()
            .store(docs)
            .entity_type(EntityType::new("root"))
            .entity_type(
                EntityType::new("child")
                    .inherit(|_, _| Inherit::Parent(EntityRef::new("root", "r1"))),
            )
            .entity_type(EntityType::new("org"))
            .entity_type(
                EntityType::user()
                    .inherit(|id, _| Inherit::Parent(EntityRef::new("org", format!("o{id}")))),
            )
            .build()
            .unwrap()
    }

    fn seeded() -> (Arc<MemoryDocumentStore>, ConfigStore) {
        let docs = Arc::new(MemoryDocumentStore::with_documents([
            ConfigDocument::root(json!({"subject": "S", "body": "B", "n": {"a": 1, "b": 1}})),
            ConfigDocument::for_entity(&EntityRef::new("root", "r1"), json!({"body": "B2"})),
            ConfigDocument::for_entity(&EntityRef::new("org", "o1"), json!({"n": {"a": 2, "b": 2}})),
            ConfigDocument::for_entity(&user("1"), json!({"n": {"b": 3}})),
        ]));
        let store = store_with(docs.clone());
        (docs, store)
    }

    #[tokio::test]
    async fn child_inherits_from_root_over_default() {
        let (_, store) = seeded();
        let resolved = store
            .resolve(&EntityRef::new("child", "c1"), &ResolveContext::new())
            .await
            .unwrap();
        assert_eq!(resolved.config, json!({"subject": "S", "body": "B2", "n": {"a": 1, "b": 1}}));
        assert_eq!(resolved.entity, EntityRef::new("child", "c1"));
    }

    #[tokio::test]
    async fn nearest_layer_wins() {
        let (_, store) = seeded();
        let resolved = store.resolve(&user("1"), &ResolveContext::new()).await.unwrap();
        assert_eq!(resolved.get("n.b"), Some(&json!(3)));
        assert_eq!(resolved.get("n.a"), Some(&json!(2)));
        assert_eq!(resolved.get("subject"), Some(&json!("S")));
    }

    #[tokio::test]
    async fn missing_documents_contribute_nothing() {
        let store = store_with(Arc::new(MemoryDocumentStore::new()));
        let resolved = store.resolve(&user("9"), &ResolveContext::new()).await.unwrap();
        assert_eq!(resolved.config, json!({}));
        assert_eq!(resolved.entity, user("9"));
    }

    #[tokio::test]
    async fn bulk_matches_single_with_one_fetch() {
        let (docs, store) = seeded();
        let entities = vec![
            user("1"),
            user("2"),
            EntityRef::new("child", "c1"),
            user("1"),
            EntityRef::new("unregistered", "x"),
        ];
        let ctx = ResolveContext::new();

        let (single_before, multi_before) = (docs.single_reads(), docs.multi_reads());
        let bulk = store.resolve_bulk(&entities, &ctx).await.unwrap();
        assert_eq!(docs.multi_reads() - multi_before, 1);
        assert_eq!(docs.single_reads() - single_before, 0);

        assert_eq!(bulk.len(), entities.len());
        for (entity, resolved) in entities.iter().zip(&bulk) {
            let single = store.resolve(entity, &ctx).await.unwrap();
            assert_eq!(&single, resolved);
        }
    }

    #[tokio::test]
    async fn bulk_of_nothing_reads_nothing() {
        let (docs, store) = seeded();
        assert!(store.resolve_bulk(&[], &ResolveContext::new()).await.unwrap().is_empty());
        assert_eq!(docs.multi_reads(), 0);
    }

    #[tokio::test]
    async fn cache_miss_falls_back_to_direct_fetch() {
        let (docs, store) = seeded();
        // org_o1 deliberately left out of the cache.
        let cache = store
            .prefetch(&["_default".into(), "user_1".into()])
            .await
            .unwrap();
        let before = docs.single_reads();
        let resolved = store
            .resolve_cached(&user("1"), &ResolveContext::new(), &cache)
            .await
            .unwrap();
        assert_eq!(docs.single_reads() - before, 1);
        assert_eq!(resolved.get("n.a"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn malformed_parent_is_rejected() {
        let store = ConfigStore::builder()
            .store(Arc::new(MemoryDocumentStore::new()))
            .entity_type(EntityType::new("bad").inherit(|_, _| Inherit::Parent(EntityRef::new("org", ""))))
            .build()
            .unwrap();
        let err = store
            .resolve(&EntityRef::new("bad", "1"), &ResolveContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::InheritanceChain(_)));
    }

    #[tokio::test]
    async fn cycles_are_rejected() {
        let store = ConfigStore::builder()
            .store(Arc::new(MemoryDocumentStore::new()))
            .entity_type(EntityType::new("a").inherit(|id, _| Inherit::Parent(EntityRef::new("b", id))))
            .entity_type(EntityType::new("b").inherit(|id, _| Inherit::Parent(EntityRef::new("a", id))))
            .build()
            .unwrap();
        let err = store
            .resolve(&EntityRef::new("a", "1"), &ResolveContext::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[tokio::test]
    async fn deep_chains_are_capped() {
        let store = ConfigStore::builder()
            .store(Arc::new(MemoryDocumentStore::new()))
            .entity_type(EntityType::new("n").inherit(|id, _| {
                let depth: u32 = id.parse().unwrap_or(0);
                Inherit::Parent(EntityRef::new("n", (depth + 1).to_string()))
            }))
            .build()
            .unwrap();
        let err = store
            .resolve(&EntityRef::new("n", "0"), &ResolveContext::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("deeper than"));
    }

    #[tokio::test]
    async fn set_for_unknown_type_fails() {
        let store = store_with(Arc::new(MemoryDocumentStore::new()));
        let err = store
            .set_for_entity(&Actor::Trusted, &EntityRef::new("planet", "x"), json!({}), false)
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownEntityType(ref t) if t == "planet"));
    }

    #[tokio::test]
    async fn set_merges_paths_or_overwrites() {
        let store = store_with(Arc::new(MemoryDocumentStore::new()));
        let entity = user("5");
        store
            .set_for_entity(&Actor::Trusted, &entity, json!({"n": {"a": 1, "b": 2}, "list": [1, 2]}), false)
            .await
            .unwrap();
        store
            .set_for_entity(&Actor::Trusted, &entity, json!({"n": {"b": 9}, "list": [3]}), false)
            .await
            .unwrap();
        assert_eq!(
            store.resolve_own(&entity).await.unwrap(),
            json!({"n": {"a": 1, "b": 9}, "list": [3]})
        );

        store
            .set_for_entity(&Actor::Trusted, &entity, json!({"only": true}), true)
            .await
            .unwrap();
        assert_eq!(store.resolve_own(&entity).await.unwrap(), json!({"only": true}));
    }

    #[tokio::test]
    async fn user_writes_go_through_predicate() {
        let store = store_with(Arc::new(MemoryDocumentStore::new()));
        let err = store
            .set_for_entity(&Actor::user("7"), &user("42"), json!({"x": 1}), false)
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::WriteDenied { .. }));
        store
            .set_for_entity(&Actor::user("42"), &user("42"), json!({"x": 1}), false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn forbidden_fields_cannot_be_set() {
        let store = ConfigStore::builder()
            .store(Arc::new(MemoryDocumentStore::new()))
            .entity_type(EntityType::user().cannot_override(["billing"]))
            .build()
            .unwrap();
        let err = store
            .set_for_entity(&Actor::Trusted, &user("1"), json!({"billing": {"plan": "free"}}), false)
            .await
            .unwrap_err();
        assert!(
            matches!(err, ConfigError::ForbiddenField { ref path, .. } if path == "billing.plan")
        );
    }

    #[tokio::test]
    async fn writes_are_schema_checked() {
        let store = store_with(Arc::new(MemoryDocumentStore::new()));
        store.set_schema(ConfigSchema::new().field("subject", FieldKind::String));
        let err = store
            .set_for_entity(&Actor::Trusted, &user("1"), json!({"subject": 3}), false)
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Schema { .. }));
        let err = store
            .set_for_entity(&Actor::Trusted, &user("1"), json!("flat"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Schema { .. }));
    }

    #[tokio::test]
    async fn default_document_management() {
        let store = store_with(Arc::new(MemoryDocumentStore::new()));
        assert!(!store.has_default().await.unwrap());
        assert!(!store.has_default_for_prefix("notifications").await.unwrap());

        let err = store
            .set_default(&Actor::user("1"), json!({"subject": "S"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::WriteDenied { .. }));

        store
            .set_default_for_prefix(&Actor::Trusted, "notifications", json!({"sms": []}))
            .await
            .unwrap();
        assert!(store.has_default().await.unwrap());
        assert!(store.has_default_for_prefix("notifications").await.unwrap());

        store
            .set_default_for_prefix(&Actor::Trusted, "other", json!({"x": 1}))
            .await
            .unwrap();
        assert_eq!(
            store.get_default().await.unwrap(),
            Some(json!({"notifications": {"sms": []}, "other": {"x": 1}}))
        );

        store.set_can_edit_default(|id| id == "admin");
        store
            .set_default(&Actor::user("admin"), json!({"subject": "S"}))
            .await
            .unwrap();
        assert_eq!(store.get_default().await.unwrap(), Some(json!({"subject": "S"})));
    }

    #[tokio::test]
    async fn own_config_skips_inheritance() {
        let (_, store) = seeded();
        assert_eq!(store.resolve_own(&user("1")).await.unwrap(), json!({"n": {"b": 3}}));
        assert_eq!(
            store.resolve_bulk_own(&[user("2"), user("1")]).await.unwrap(),
            vec![json!({}), json!({"n": {"b": 3}})]
        );
    }

    #[tokio::test]
    async fn visible_documents_follow_publish() {
        let (_, store) = seeded();
        let ids: Vec<String> = store
            .visible_documents("1")
            .await
            .unwrap()
            .into_iter()
            .map(|doc| doc.id)
            .collect();
        assert_eq!(ids, vec!["_default".to_owned(), "user_1".to_owned()]);
    }

    #[test]
    fn redefining_a_type_replaces_it() {
        let store = store_with(Arc::new(MemoryDocumentStore::new()));
        store.add_entity_type(EntityType::new("org").cannot_override(["x"]));
        assert!(store.has_entity_type("org"));
        assert_eq!(store.entity_types().len(), 4);
    }
}
