use std::collections::HashSet;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use courier_core::{ChannelName, EntityRef, SuppressionRecord, SuppressionStatus};

use crate::error::LedgerError;
use crate::ledger::ErrorLedger;

/// In-memory [`ErrorLedger`] backed by [`DashMap`]s.
///
/// A second map indexes the unresolved record per (entity, channel) so
/// deduplication and skip lookups do not scan every record.
#[derive(Debug, Default)]
pub struct MemoryErrorLedger {
    records: DashMap<String, SuppressionRecord>,
    open: DashMap<(EntityRef, ChannelName), String>,
}

impl MemoryErrorLedger {
    /// Create a new, empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted(mut records: Vec<SuppressionRecord>) -> Vec<SuppressionRecord> {
        records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        records
    }
}

#[async_trait]
impl ErrorLedger for MemoryErrorLedger {
    async fn record(&self, record: SuppressionRecord) -> Result<SuppressionRecord, LedgerError> {
        let key = (record.entity.clone(), record.channel.clone());
        match self.open.entry(key) {
            Entry::Occupied(existing) => {
                let id = existing.get().clone();
                drop(existing);
                debug!(entity = %record.entity, channel = %record.channel, "suppression already recorded");
                self.records
                    .get(&id)
                    .map(|r| r.clone())
                    .ok_or_else(|| LedgerError::Backend(format!("index points at missing record {id}")))
            }
            Entry::Vacant(slot) => {
                let mut stored = record;
                stored.status = SuppressionStatus::Unresolved;
                slot.insert(stored.id.clone());
                self.records.insert(stored.id.clone(), stored.clone());
                Ok(stored)
            }
        }
    }

    async fn unresolved_channels(
        &self,
        entity: &EntityRef,
    ) -> Result<HashSet<ChannelName>, LedgerError> {
        Ok(self
            .open
            .iter()
            .filter(|entry| entry.key().0 == *entity)
            .map(|entry| entry.key().1.clone())
            .collect())
    }

    async fn unresolved_for(
        &self,
        entity: &EntityRef,
    ) -> Result<Vec<SuppressionRecord>, LedgerError> {
        Ok(Self::sorted(
            self.records
                .iter()
                .filter(|r| r.entity == *entity && r.is_unresolved())
                .map(|r| r.clone())
                .collect(),
        ))
    }

    async fn resolve(&self, id: &str) -> Result<bool, LedgerError> {
        let key = {
            let Some(mut record) = self.records.get_mut(id) else {
                return Ok(false);
            };
            if !record.is_unresolved() {
                return Ok(false);
            }
            record.status = SuppressionStatus::Resolved;
            (record.entity.clone(), record.channel.clone())
        };
        self.open.remove_if(&key, |_, open_id| open_id == id);
        Ok(true)
    }

    async fn list(&self) -> Result<Vec<SuppressionRecord>, LedgerError> {
        Ok(Self::sorted(
            self.records.iter().map(|r| r.clone()).collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::run_ledger_conformance_tests;

    #[tokio::test]
    async fn conformance() {
        let ledger = MemoryErrorLedger::new();
        run_ledger_conformance_tests(&ledger).await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_duplicates_collapse() {
        let ledger = std::sync::Arc::new(MemoryErrorLedger::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger
                    .record(SuppressionRecord::new(
                        EntityRef::new("user", "42"),
                        "sms",
                        "Blacklisted",
                        None,
                    ))
                    .await
                    .unwrap()
                    .id
            }));
        }
        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap());
        }
        assert_eq!(ids.len(), 1);
        assert_eq!(ledger.list().await.unwrap().len(), 1);
    }
}
