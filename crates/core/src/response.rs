use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity of a provider-reported failure. Ordered from harmless to
/// "wake everyone up".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorLevel {
    /// No error.
    #[default]
    None = 0,
    /// Transient; the job is retried.
    Minor = 1,
    /// Permanent for this recipient; no retry, the channel is suppressed.
    Fatal = 2,
    /// Systemic provider or account failure; suppress and alert an operator.
    Catastrophic = 3,
}

impl ErrorLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Minor => "minor",
            Self::Fatal => "fatal",
            Self::Catastrophic => "catastrophic",
        }
    }
}

impl fmt::Display for ErrorLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provider response translated into the shape the job state machine
/// understands.
///
/// Channel senders build one of these from whatever their provider returned
/// (synchronously or via a later status callback) and hand it to the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryResponse {
    /// The provider did not report an error.
    pub ok: bool,
    /// Delivery is final; nothing more will be reported.
    pub done: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_level: ErrorLevel,
    /// Provider status string, logged on the job.
    #[serde(default)]
    pub status: Option<String>,
    /// What the recipient can do to fix a fatal error.
    #[serde(default)]
    pub resolution: Option<String>,
}

impl DeliveryResponse {
    /// Provider accepted the message and will report nothing further.
    #[must_use]
    pub fn delivered(status: impl Into<String>) -> Self {
        Self {
            ok: true,
            done: true,
            error: None,
            error_level: ErrorLevel::None,
            status: Some(status.into()),
            resolution: None,
        }
    }

    /// Provider accepted the message but the final status is still pending.
    #[must_use]
    pub fn pending(status: impl Into<String>) -> Self {
        Self {
            done: false,
            ..Self::delivered(status)
        }
    }

    /// Provider reported an error of the given severity.
    #[must_use]
    pub fn failed(level: ErrorLevel, error: impl Into<String>) -> Self {
        Self {
            ok: false,
            done: false,
            error: Some(error.into()),
            error_level: level,
            status: None,
            resolution: None,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    #[must_use]
    pub fn with_resolution(mut self, resolution: impl Into<String>) -> Self {
        self.resolution = Some(resolution.into());
        self
    }
}
