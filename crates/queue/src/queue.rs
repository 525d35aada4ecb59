use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use courier_core::{ChannelKind, ChannelName, JobId, Message, SharedClock};

use crate::builder::DeliveryQueueBuilder;
use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::event::DeliveryEvent;
use crate::handle::JobHandle;
use crate::job::{Job, JobStatus};
use crate::store::JobStore;
use crate::worker::Worker;

pub(crate) struct Shared {
    pub(crate) store: Arc<dyn JobStore>,
    pub(crate) tasks: HashMap<ChannelName, ChannelKind>,
    pub(crate) workers: RwLock<HashMap<ChannelName, Arc<dyn Worker>>>,
    pub(crate) config: QueueConfig,
    pub(crate) clock: SharedClock,
    pub(crate) events: mpsc::UnboundedSender<DeliveryEvent>,
    pub(crate) receiver: Mutex<Option<mpsc::UnboundedReceiver<DeliveryEvent>>>,
}

impl Shared {
    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn emit(&self, event: DeliveryEvent) {
        if self.events.send(event).is_err() {
            debug!("delivery event dropped, nobody is listening");
        }
    }
}

/// Durable delivery jobs, one per outbound message.
///
/// Cloning is cheap; clones share the same store, registrations and event
/// channel.
#[derive(Clone)]
pub struct DeliveryQueue {
    pub(crate) shared: Arc<Shared>,
}

impl DeliveryQueue {
    pub fn builder() -> DeliveryQueueBuilder {
        DeliveryQueueBuilder::new()
    }

    pub fn config(&self) -> &QueueConfig {
        &self.shared.config
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.shared.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.shared.now()
    }

    /// Registered tasks and the transport each accepts, sorted by name.
    pub fn tasks(&self) -> Vec<(ChannelName, ChannelKind)> {
        let mut tasks: Vec<_> = self
            .shared
            .tasks
            .iter()
            .map(|(name, kind)| (name.clone(), *kind))
            .collect();
        tasks.sort_by(|a, b| a.0.cmp(&b.0));
        tasks
    }

    pub fn has_task(&self, task: &str) -> bool {
        self.shared.tasks.contains_key(task)
    }

    /// Take the receiving end of the delivery event channel. Only the first
    /// caller gets it.
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<DeliveryEvent>> {
        self.shared.receiver.lock().take()
    }

    /// Bind a worker to a registered task. A second registration replaces the
    /// first.
    pub fn register_worker(&self, task: &str, worker: Arc<dyn Worker>) -> Result<(), QueueError> {
        let Some((name, _)) = self.shared.tasks.get_key_value(task) else {
            return Err(QueueError::UnknownTask(task.to_owned()));
        };
        if self
            .shared
            .workers
            .write()
            .insert(name.clone(), worker)
            .is_some()
        {
            warn!(task, "worker replaced");
        }
        Ok(())
    }

    pub(crate) fn worker_for(&self, task: &str) -> Option<Arc<dyn Worker>> {
        self.shared.workers.read().get(task).cloned()
    }

    /// Check `message` against its task and build a queued job for it,
    /// without storing it.
    pub fn prepare(&self, message: Message) -> Result<Job, QueueError> {
        self.validate(&message)?;
        Ok(Job::new(message, self.now()))
    }

    /// Store a prepared job.
    #[instrument(skip_all, fields(job_id = %job.id, task = %job.task))]
    pub async fn submit(&self, job: Job) -> Result<Job, QueueError> {
        if job.task != job.message.channel {
            return Err(QueueError::InvalidPayload {
                task: job.task.to_string(),
                reason: format!("job task differs from message channel `{}`", job.message.channel),
            });
        }
        if job.status != JobStatus::Queued {
            return Err(QueueError::InvalidTransition {
                job: job.id.clone(),
                from: job.status,
                to: JobStatus::Queued,
            });
        }
        self.validate(&job.message)?;
        self.shared.store.insert(job.clone()).await?;
        info!(run_at = %job.run_at, "queued task");
        Ok(job)
    }

    /// Validate, build and store a job for `message`.
    pub async fn enqueue(&self, message: Message) -> Result<Job, QueueError> {
        let job = self.prepare(message)?;
        self.submit(job).await
    }

    fn validate(&self, message: &Message) -> Result<(), QueueError> {
        let task = message.channel.as_str();
        let Some(&kind) = self.shared.tasks.get(task) else {
            return Err(QueueError::UnknownTask(task.to_owned()));
        };
        let got = message.transport.kind();
        if got != kind {
            return Err(QueueError::wrong_kind(task, kind, got));
        }
        message
            .transport
            .validate()
            .map_err(|err| QueueError::InvalidPayload {
                task: task.to_owned(),
                reason: err.reason,
            })
    }

    pub async fn job(&self, id: &JobId) -> Result<Option<Job>, QueueError> {
        self.shared.store.get(id).await
    }

    pub async fn jobs(&self, status: Option<JobStatus>) -> Result<Vec<Job>, QueueError> {
        self.shared.store.list(status).await
    }

    /// Count jobs per status.
    pub async fn counts(&self) -> Result<HashMap<JobStatus, usize>, QueueError> {
        let mut counts = HashMap::new();
        for job in self.shared.store.list(None).await? {
            *counts.entry(job.status).or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// A handle for an existing job.
    pub async fn handle(&self, id: &JobId) -> Result<JobHandle, QueueError> {
        let job = self
            .shared
            .store
            .get(id)
            .await?
            .ok_or_else(|| QueueError::UnknownJob(id.clone()))?;
        Ok(JobHandle::new(self.shared.clone(), job))
    }

    /// Find the job linked to an outside identifier, e.g. a provider message
    /// id carried by a status callback.
    pub async fn job_by_external_id(
        &self,
        source: &str,
        external_id: &str,
    ) -> Result<Option<JobHandle>, QueueError> {
        Ok(self
            .shared
            .store
            .find_by_external_id(source, external_id)
            .await?
            .map(|job| JobHandle::new(self.shared.clone(), job)))
    }

    /// Requeue waiting jobs whose backoff has elapsed, then claim the next due
    /// job for this caller.
    pub async fn claim_next(&self) -> Result<Option<JobHandle>, QueueError> {
        let now = self.now();
        let promoted = self.shared.store.promote_due(now).await?;
        if promoted > 0 {
            debug!(promoted, "requeued jobs after backoff");
        }
        Ok(self
            .shared
            .store
            .claim_next(now)
            .await?
            .map(|job| JobHandle::new(self.shared.clone(), job)))
    }
}

impl std::fmt::Debug for DeliveryQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryQueue")
            .field("tasks", &self.tasks())
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::Duration;

    use chrono::TimeZone;
    use courier_core::{Clock, ManualClock, TransportConfig};

    use super::*;
    use crate::job::fixtures::sms_message;
    use crate::memory::MemoryJobStore;
    use crate::retry::RetryStrategy;

    pub(crate) fn test_queue(retry_limit: u32) -> (DeliveryQueue, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        let queue = DeliveryQueue::builder()
            .store(Arc::new(MemoryJobStore::new()))
            .task("sms", ChannelKind::Sms)
            .task("email", ChannelKind::Email)
            .config(QueueConfig {
                retry_limit,
                retry_strategy: RetryStrategy::Constant {
                    delay: Duration::from_secs(30),
                },
                max_concurrent: 4,
                poll_interval: Duration::from_millis(10),
            })
            .clock(Arc::new(clock.clone()))
            .build()
            .unwrap();
        (queue, clock)
    }

    #[tokio::test]
    async fn enqueue_stores_queued_job() {
        let (queue, clock) = test_queue(3);
        let job = queue.enqueue(sms_message("+15550001111")).await.unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.run_at, clock.now());
        let stored = queue.job(&job.id).await.unwrap().unwrap();
        assert_eq!(stored, job);
        assert_eq!(queue.counts().await.unwrap()[&JobStatus::Queued], 1);
    }

    #[tokio::test]
    async fn enqueue_unknown_task() {
        let (queue, _) = test_queue(3);
        let mut message = sms_message("+15550001111");
        message.channel = "pager".into();
        let err = queue.enqueue(message).await.unwrap_err();
        assert!(matches!(err, QueueError::UnknownTask(task) if task == "pager"));
        assert!(queue.jobs(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn enqueue_wrong_transport_kind() {
        let (queue, _) = test_queue(3);
        let mut message = sms_message("+15550001111");
        message.channel = "email".into();
        let err = queue.enqueue(message).await.unwrap_err();
        assert!(
            matches!(err, QueueError::InvalidPayload { task, reason } if task == "email" && reason.contains("sms"))
        );
    }

    #[tokio::test]
    async fn enqueue_empty_address() {
        let (queue, _) = test_queue(3);
        let mut message = sms_message("+15550001111");
        message.transport = TransportConfig::Sms {
            to: String::new(),
            from: None,
        };
        let err = queue.enqueue(message).await.unwrap_err();
        assert!(matches!(err, QueueError::InvalidPayload { reason, .. } if reason.contains("`to`")));
    }

    #[tokio::test]
    async fn delayed_job_is_not_claimed_early() {
        let (queue, clock) = test_queue(3);
        let mut message = sms_message("+15550001111");
        message.delay_ms = 60_000;
        queue.enqueue(message).await.unwrap();
        assert!(queue.claim_next().await.unwrap().is_none());
        clock.advance(Duration::from_secs(61));
        let handle = queue.claim_next().await.unwrap().unwrap();
        assert_eq!(handle.job().status, JobStatus::Running);
    }

    #[tokio::test]
    async fn submit_rejects_non_queued_job() {
        let (queue, _) = test_queue(3);
        let mut job = queue.prepare(sms_message("+15550001111")).unwrap();
        job.status = JobStatus::Completed;
        let err = queue.submit(job).await.unwrap_err();
        assert!(matches!(err, QueueError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn register_worker_requires_task() {
        let (queue, _) = test_queue(3);
        let worker = crate::worker::worker_fn(|_job| async { Ok(()) });
        assert!(queue.register_worker("sms", worker.clone()).is_ok());
        assert!(matches!(
            queue.register_worker("pager", worker),
            Err(QueueError::UnknownTask(_))
        ));
        assert!(queue.worker_for("sms").is_some());
        assert!(queue.worker_for("email").is_none());
    }
}
