use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::EntityRef;
use crate::types::ChannelName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionStatus {
    #[default]
    Unresolved,
    Resolved,
}

/// A recorded reason to stop sending one channel to one recipient.
///
/// While a record is [`SuppressionStatus::Unresolved`] the router skips that
/// channel for that entity. Clearing it is an operator action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuppressionRecord {
    pub id: String,
    pub entity: EntityRef,
    pub channel: ChannelName,
    pub reason: String,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub status: SuppressionStatus,
    pub timestamp: DateTime<Utc>,
}

impl SuppressionRecord {
    /// Create a new unresolved record stamped with the current time.
    #[must_use]
    pub fn new(
        entity: EntityRef,
        channel: impl Into<ChannelName>,
        reason: impl Into<String>,
        resolution: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            entity,
            channel: channel.into(),
            reason: reason.into(),
            resolution,
            status: SuppressionStatus::Unresolved,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn is_unresolved(&self) -> bool {
        self.status == SuppressionStatus::Unresolved
    }

    /// Same recipient and channel as `other`.
    #[must_use]
    pub fn same_target(&self, other: &Self) -> bool {
        self.entity == other.entity && self.channel == other.channel
    }
}
