use std::time::Duration;

use crate::retry::RetryStrategy;

/// Settings for a [`DeliveryQueue`](crate::DeliveryQueue) and its
/// [`WorkerPool`](crate::WorkerPool).
///
/// ```
/// use courier_queue::QueueConfig;
///
/// let config = QueueConfig::default();
/// assert_eq!(config.retry_limit, 10);
/// assert_eq!(config.max_concurrent, 10);
/// ```
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Retries allowed after recoverable errors before a job fails for good.
    pub retry_limit: u32,
    pub retry_strategy: RetryStrategy,
    /// Jobs the worker pool runs at once. Enforced with a
    /// [`tokio::sync::Semaphore`].
    pub max_concurrent: usize,
    /// How often the worker pool looks for due jobs.
    pub poll_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            retry_limit: 10,
            retry_strategy: RetryStrategy::default(),
            max_concurrent: 10,
            poll_interval: Duration::from_millis(500),
        }
    }
}
