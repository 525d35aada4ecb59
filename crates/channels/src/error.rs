use thiserror::Error;

use courier_queue::QueueError;

/// Errors raised while applying a provider report to the queue.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The provider report could not be parsed.
    #[error("invalid provider payload: {0}")]
    InvalidPayload(String),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl From<serde_json::Error> for ChannelError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidPayload(err.to_string())
    }
}
