use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use courier_core::{ChannelName, EntityRef, SuppressionRecord};

use crate::error::LedgerError;

/// Record of channels that must not be used for a recipient until an operator
/// clears the problem.
///
/// Implementations must be `Send + Sync` and safe for concurrent access.
#[async_trait]
pub trait ErrorLedger: Send + Sync {
    /// Store a new unresolved record.
    ///
    /// If an unresolved record for the same entity and channel already
    /// exists it is returned instead and nothing is written, so a failure
    /// reported twice yields one record.
    async fn record(&self, record: SuppressionRecord) -> Result<SuppressionRecord, LedgerError>;

    /// Channels with at least one unresolved record for `entity`.
    async fn unresolved_channels(
        &self,
        entity: &EntityRef,
    ) -> Result<HashSet<ChannelName>, LedgerError>;

    /// [`Self::unresolved_channels`] for many entities. Entities with nothing
    /// suppressed may be absent from the map.
    async fn unresolved_channels_many(
        &self,
        entities: &[EntityRef],
    ) -> Result<HashMap<EntityRef, HashSet<ChannelName>>, LedgerError> {
        let mut out = HashMap::new();
        for entity in entities {
            let channels = self.unresolved_channels(entity).await?;
            if !channels.is_empty() {
                out.insert(entity.clone(), channels);
            }
        }
        Ok(out)
    }

    /// Unresolved records for `entity`, oldest first.
    async fn unresolved_for(&self, entity: &EntityRef)
    -> Result<Vec<SuppressionRecord>, LedgerError>;

    /// Mark a record resolved. Returns `false` if no unresolved record has
    /// that id.
    async fn resolve(&self, id: &str) -> Result<bool, LedgerError>;

    /// Every record, resolved or not, oldest first.
    async fn list(&self) -> Result<Vec<SuppressionRecord>, LedgerError>;
}
