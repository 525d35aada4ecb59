use std::collections::HashMap;

use crate::document::ConfigDocument;

/// Documents fetched ahead of a bulk resolution, keyed by document id.
///
/// Ids that were looked up but do not exist are remembered as missing so they
/// are not fetched again.
#[derive(Debug, Clone, Default)]
pub struct DocumentCache {
    entries: HashMap<String, Option<ConfigDocument>>,
}

impl DocumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, doc: ConfigDocument) {
        self.entries.insert(doc.id.clone(), Some(doc));
    }

    /// Record that `id` was looked up and does not exist.
    pub fn insert_missing(&mut self, id: impl Into<String>) {
        self.entries.entry(id.into()).or_insert(None);
    }

    /// `None` if the cache knows nothing about `id`.
    pub fn lookup(&self, id: &str) -> Option<Option<&ConfigDocument>> {
        self.entries.get(id).map(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
