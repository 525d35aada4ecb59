use serde::Serialize;

use courier_core::{ChannelName, EntityRef, ErrorLevel, JobId};

/// Side effects of a delivery failure, delivered to whoever holds the
/// queue's event receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DeliveryEvent {
    /// Stop sending this channel to this recipient until resolved.
    Suppressed(Suppression),
    /// Something is wrong with the provider or account itself.
    Catastrophic {
        job_id: JobId,
        channel: ChannelName,
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suppression {
    pub job_id: JobId,
    pub channel: ChannelName,
    /// `None` when the message was built without a recipient entity.
    pub recipient: Option<EntityRef>,
    pub reason: String,
    pub resolution: Option<String>,
    pub level: ErrorLevel,
}

/// What [`JobHandle::handle_response`](crate::JobHandle::handle_response)
/// did with a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseOutcome {
    Completed,
    /// Accepted but not final; the job keeps running until the next status.
    Pending,
    /// Recoverable failure; the job waits for retry number `retry_count`.
    Retrying { retry_count: u32 },
    Failed {
        level: ErrorLevel,
        /// A suppression event was emitted.
        suppressed: bool,
    },
}
