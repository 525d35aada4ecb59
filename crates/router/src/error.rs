use thiserror::Error;

use courier_config::ConfigError;
use courier_ledger::LedgerError;

/// Errors that stop a routing call as a whole.
///
/// Failures to build a single message never surface here; that candidate is
/// dropped and routing continues.
#[derive(Debug, Error)]
pub enum RouterError {
    /// A configured `when` tier has no registered check.
    #[error("no preference check registered for tier `{0}`")]
    MissingPreferenceCheck(String),

    #[error("event `{0}` is not registered with the router")]
    UnknownEvent(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    /// A host hook failed.
    #[error("{hook} failed: {reason}")]
    Hook { hook: &'static str, reason: String },

    /// A channel formatter could not build a transport.
    #[error("cannot format `{channel}` message: {reason}")]
    Format { channel: String, reason: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl RouterError {
    pub fn hook(hook: &'static str, reason: impl ToString) -> Self {
        Self::Hook {
            hook,
            reason: reason.to_string(),
        }
    }

    pub fn format(channel: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Format {
            channel: channel.into(),
            reason: reason.into(),
        }
    }
}
