use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::Value;

use courier_core::tree::set_path;

use crate::document::ConfigDocument;
use crate::error::ConfigError;
use crate::store::DocumentStore;

/// In-memory [`DocumentStore`] backed by a [`DashMap`].
///
/// Counts reads so callers can check how many round trips a resolution took.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    docs: DashMap<String, ConfigDocument>,
    single_reads: AtomicU64,
    multi_reads: AtomicU64,
}

impl MemoryDocumentStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `docs`. Later duplicates win.
    pub fn with_documents(docs: impl IntoIterator<Item = ConfigDocument>) -> Self {
        let store = Self::new();
        for doc in docs {
            store.docs.insert(doc.id.clone(), doc);
        }
        store
    }

    /// Number of [`DocumentStore::get`] calls served.
    pub fn single_reads(&self) -> u64 {
        self.single_reads.load(Ordering::Relaxed)
    }

    /// Number of [`DocumentStore::get_many`] calls served.
    pub fn multi_reads(&self) -> u64 {
        self.multi_reads.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, id: &str) -> Result<Option<ConfigDocument>, ConfigError> {
        self.single_reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.docs.get(id).map(|doc| doc.clone()))
    }

    async fn get_many(&self, ids: &[String]) -> Result<Vec<ConfigDocument>, ConfigError> {
        self.multi_reads.fetch_add(1, Ordering::Relaxed);
        Ok(ids
            .iter()
            .filter_map(|id| self.docs.get(id).map(|doc| doc.clone()))
            .collect())
    }

    async fn insert(&self, doc: ConfigDocument) -> Result<(), ConfigError> {
        match self.docs.entry(doc.id.clone()) {
            Entry::Occupied(_) => Err(ConfigError::DocumentExists(doc.id)),
            Entry::Vacant(vacant) => {
                vacant.insert(doc);
                Ok(())
            }
        }
    }

    async fn replace_config(&self, id: &str, config: Value) -> Result<bool, ConfigError> {
        Ok(match self.docs.get_mut(id) {
            Some(mut doc) => {
                doc.config = config;
                true
            }
            None => false,
        })
    }

    async fn set_paths(
        &self,
        id: &str,
        paths: Vec<(String, Value)>,
    ) -> Result<bool, ConfigError> {
        let Some(mut doc) = self.docs.get_mut(id) else {
            return Ok(false);
        };
        for (path, value) in paths {
            set_path(&mut doc.config, &path, value);
        }
        Ok(true)
    }

    async fn find_by_type(
        &self,
        entity_type: &str,
        entity_ids: &[String],
    ) -> Result<Vec<ConfigDocument>, ConfigError> {
        Ok(self
            .docs
            .iter()
            .filter(|doc| doc.entity_type == entity_type && entity_ids.contains(&doc.entity_id))
            .map(|doc| doc.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::run_document_store_conformance_tests;

    #[tokio::test]
    async fn conformance() {
        let store = MemoryDocumentStore::new();
        run_document_store_conformance_tests(&store).await.unwrap();
    }

    #[tokio::test]
    async fn counts_reads() {
        let store = MemoryDocumentStore::new();
        store.get("a").await.unwrap();
        store.get_many(&["a".into(), "b".into()]).await.unwrap();
        store.get_many(&[]).await.unwrap();
        assert_eq!(store.single_reads(), 1);
        assert_eq!(store.multi_reads(), 2);
    }
}
