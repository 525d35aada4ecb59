use thiserror::Error;

/// Errors from error ledger backends.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("backend error: {0}")]
    Backend(String),
}
