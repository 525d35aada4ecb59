use thiserror::Error;

/// Errors surfaced by the [`Dispatcher`](crate::Dispatcher).
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("routing error: {0}")]
    Router(#[from] courier_router::RouterError),

    #[error("queue error: {0}")]
    Queue(#[from] courier_queue::QueueError),

    #[error("configuration store error: {0}")]
    Config(#[from] courier_config::ConfigError),

    #[error("ledger error: {0}")]
    Ledger(#[from] courier_ledger::LedgerError),

    /// The dispatcher was misconfigured (e.g. missing required components).
    #[error("configuration error: {0}")]
    Configuration(String),
}
