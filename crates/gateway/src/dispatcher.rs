use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument, warn};

use courier_config::ConfigStore;
use courier_core::JobId;
use courier_ledger::ErrorLedger;
use courier_queue::{DeliveryQueue, Job};
use courier_router::{RouteReport, RoutingEngine};

use crate::builder::DispatcherBuilder;
use crate::error::DispatchError;
use crate::metrics::DispatcherMetrics;

/// Rewrites a job right before it is stored.
pub trait JobTransform: Send + Sync {
    fn transform(&self, job: Job, data: &Value) -> Job;
}

impl<F> JobTransform for F
where
    F: Fn(Job, &Value) -> Job + Send + Sync,
{
    fn transform(&self, job: Job, data: &Value) -> Job {
        self(job, data)
    }
}

/// Outcome of one [`Dispatcher::send`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SendReport {
    pub event: String,
    pub recipients: usize,
    /// Jobs stored, in message order.
    pub jobs: Vec<JobId>,
    /// Messages the queue refused.
    pub failed: usize,
    pub skipped: usize,
    pub gated: usize,
    pub dropped: usize,
}

/// Entry point for business events.
///
/// Routes an event to messages, stores one delivery job per message and, in
/// the background, records suppressions and raises alerts for the failures
/// the queue reports.
pub struct Dispatcher {
    pub(crate) router: Arc<RoutingEngine>,
    pub(crate) queue: DeliveryQueue,
    pub(crate) metrics: Arc<DispatcherMetrics>,
    pub(crate) transform_job: Option<Arc<dyn JobTransform>>,
    pub(crate) tracker: TaskTracker,
    pub(crate) cancel: CancellationToken,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Route `event` and enqueue a job for every resulting message.
    ///
    /// Fails only when routing as a whole fails. A message the queue refuses
    /// is logged and counted in [`SendReport::failed`].
    #[instrument(skip_all, fields(event = %event))]
    pub async fn send(&self, event: &str, data: &Value) -> Result<SendReport, DispatchError> {
        self.metrics.increment_events();
        let routed = self.router.route(event, data).await?;
        self.metrics
            .add_routing(routed.dropped, routed.skipped, routed.gated);

        let mut report = SendReport {
            event: event.to_owned(),
            recipients: routed.recipients,
            skipped: routed.skipped,
            gated: routed.gated,
            dropped: routed.dropped,
            ..SendReport::default()
        };

        for message in routed.messages {
            let channel = message.channel.clone();
            match self.enqueue(message, data).await {
                Ok(job) => {
                    debug!(job_id = %job.id, %channel, "sending message");
                    self.metrics.increment_enqueued();
                    report.jobs.push(job.id);
                }
                Err(err) => {
                    warn!(%channel, error = %err, "failed to enqueue message");
                    self.metrics.increment_enqueue_failed();
                    report.failed += 1;
                }
            }
        }

        info!(
            jobs = report.jobs.len(),
            failed = report.failed,
            "dispatched event"
        );
        Ok(report)
    }

    /// Route `event` without enqueueing anything.
    pub async fn preview(&self, event: &str, data: &Value) -> Result<RouteReport, DispatchError> {
        Ok(self.router.route(event, data).await?)
    }

    async fn enqueue(
        &self,
        message: courier_core::Message,
        data: &Value,
    ) -> Result<Job, DispatchError> {
        let mut job = self.queue.prepare(message)?;
        if let Some(transform) = &self.transform_job {
            job = transform.transform(job, data);
        }
        Ok(self.queue.submit(job).await?)
    }

    pub fn router(&self) -> &RoutingEngine {
        &self.router
    }

    pub fn queue(&self) -> &DeliveryQueue {
        &self.queue
    }

    pub fn ledger(&self) -> &Arc<dyn ErrorLedger> {
        self.router.ledger()
    }

    pub fn config(&self) -> &Arc<ConfigStore> {
        self.router.config_store()
    }

    pub fn metrics(&self) -> &DispatcherMetrics {
        &self.metrics
    }

    /// Stop the event listener after it has handled every event already
    /// emitted, and wait for it.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        info!("dispatcher shutdown complete");
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("router", &self.router)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}
