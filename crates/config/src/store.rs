use async_trait::async_trait;
use serde_json::Value;

use crate::document::ConfigDocument;
use crate::error::ConfigError;

/// Persistence for configuration documents, keyed by document id.
///
/// Implementations must be `Send + Sync` and safe for concurrent access.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch one document. Returns `None` if it does not exist.
    async fn get(&self, id: &str) -> Result<Option<ConfigDocument>, ConfigError>;

    /// Fetch every existing document among `ids` in a single round trip.
    ///
    /// Missing ids are simply absent from the result; order is unspecified.
    async fn get_many(&self, ids: &[String]) -> Result<Vec<ConfigDocument>, ConfigError>;

    /// Insert a new document. Fails with [`ConfigError::DocumentExists`] if
    /// the id is taken.
    async fn insert(&self, doc: ConfigDocument) -> Result<(), ConfigError>;

    /// Replace the whole `config` tree of an existing document.
    /// Returns `false` if the document does not exist.
    async fn replace_config(&self, id: &str, config: Value) -> Result<bool, ConfigError>;

    /// Set each dotted path inside `config` of an existing document, leaving
    /// everything else untouched. Returns `false` if the document does not exist.
    async fn set_paths(&self, id: &str, paths: Vec<(String, Value)>)
    -> Result<bool, ConfigError>;

    /// Fetch the documents of one entity type whose entity ids are in `entity_ids`.
    async fn find_by_type(
        &self,
        entity_type: &str,
        entity_ids: &[String],
    ) -> Result<Vec<ConfigDocument>, ConfigError>;
}
