use thiserror::Error;

use courier_core::{ChannelKind, DeliveryResponse, ErrorLevel, JobId};

use crate::job::JobStatus;

/// Errors from queue registration, enqueueing and job transitions.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("no task registered with name `{0}`")]
    UnknownTask(String),

    #[error("task `{0}` registered twice")]
    DuplicateTask(String),

    #[error("invalid payload for task `{task}`: {reason}")]
    InvalidPayload { task: String, reason: String },

    #[error("job not found: {0}")]
    UnknownJob(JobId),

    #[error("job {job} is {from}; cannot move to {to}")]
    InvalidTransition {
        job: JobId,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("external id ({source_name}, {external_id}) already linked to job {job}")]
    ExternalIdTaken {
        source_name: String,
        external_id: String,
        job: JobId,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("job store error: {0}")]
    Store(String),
}

impl QueueError {
    pub(crate) fn wrong_kind(task: &str, expected: ChannelKind, got: ChannelKind) -> Self {
        Self::InvalidPayload {
            task: task.to_owned(),
            reason: format!("expected {expected} transport, got {got}"),
        }
    }
}

/// Why a delivery attempt did not succeed, by how the job should react.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// Transient. The job waits and is retried until the retry limit.
    #[error("recoverable delivery error: {0}")]
    Recoverable(String),

    /// Permanent for this recipient. No retry.
    #[error("fatal delivery error: {0}")]
    Fatal(String),

    /// Systemic provider or account failure. No retry.
    #[error("catastrophic delivery error: {0}")]
    Catastrophic(String),
}

impl DeliveryError {
    /// Classify a failed provider response. `None` if the response is ok.
    pub fn from_response(response: &DeliveryResponse) -> Option<Self> {
        if response.ok {
            return None;
        }
        let message = response
            .error
            .clone()
            .unwrap_or_else(|| "unspecified provider error".to_owned());
        Some(match response.error_level {
            ErrorLevel::None | ErrorLevel::Minor => Self::Recoverable(message),
            ErrorLevel::Fatal => Self::Fatal(message),
            ErrorLevel::Catastrophic => Self::Catastrophic(message),
        })
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Recoverable(_))
    }

    pub fn level(&self) -> ErrorLevel {
        match self {
            Self::Recoverable(_) => ErrorLevel::Minor,
            Self::Fatal(_) => ErrorLevel::Fatal,
            Self::Catastrophic(_) => ErrorLevel::Catastrophic,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Recoverable(m) | Self::Fatal(m) | Self::Catastrophic(m) => m,
        }
    }
}
