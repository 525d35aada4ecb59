use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::error::{DeliveryError, QueueError};
use crate::handle::JobHandle;
use crate::job::JobStatus;
use crate::queue::DeliveryQueue;

/// Delivers the jobs of one task.
///
/// A worker finishes the job through the handle (`done`, `complete` or
/// `handle_response`), or links it to an external id and returns `Ok` to leave
/// it running until a provider callback finishes it. Returning `Err` on a job
/// that is still running finishes it with that error.
#[async_trait]
pub trait Worker: Send + Sync {
    async fn work(&self, job: JobHandle) -> Result<(), DeliveryError>;
}

/// Adapter turning an async closure into a [`Worker`].
pub struct FnWorker<F>(F);

#[async_trait]
impl<F, Fut> Worker for FnWorker<F>
where
    F: Fn(JobHandle) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), DeliveryError>> + Send,
{
    async fn work(&self, job: JobHandle) -> Result<(), DeliveryError> {
        (self.0)(job).await
    }
}

/// Wrap an async closure as a shareable [`Worker`].
pub fn worker_fn<F, Fut>(f: F) -> Arc<dyn Worker>
where
    F: Fn(JobHandle) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), DeliveryError>> + Send + 'static,
{
    Arc::new(FnWorker(f))
}

/// Upper bound on concurrently running jobs in one pool.
const MAX_PERMITS: usize = 1024;

/// Pulls due jobs off a [`DeliveryQueue`] and runs their workers.
///
/// At most `max_concurrent` jobs run at once, each in its own task. A worker
/// that panics or returns an error never leaves its job running.
#[derive(Clone)]
pub struct WorkerPool {
    queue: DeliveryQueue,
    semaphore: Arc<Semaphore>,
    permits: u32,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl WorkerPool {
    pub fn new(queue: DeliveryQueue) -> Self {
        let permits = queue.config().max_concurrent.clamp(1, MAX_PERMITS);
        Self {
            semaphore: Arc::new(Semaphore::new(permits)),
            permits: u32::try_from(permits).unwrap_or(1),
            queue,
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Poll for due jobs every `poll_interval` until [`Self::shutdown`].
    pub fn start(&self) {
        let pool = self.clone();
        let interval = self.queue.config().poll_interval;
        info!(
            max_concurrent = self.permits,
            poll_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            "worker pool started"
        );
        self.tracker.spawn(async move {
            loop {
                tokio::select! {
                    () = pool.cancel.cancelled() => break,
                    () = tokio::time::sleep(interval) => {}
                }
                if let Err(err) = pool.run_once().await {
                    warn!(error = %err, "polling for jobs failed");
                }
            }
            debug!("worker pool poll loop stopped");
        });
    }

    /// Claim and start as many due jobs as there are free slots.
    /// Returns how many were started.
    pub async fn run_once(&self) -> Result<usize, QueueError> {
        let mut started = 0;
        while let Ok(permit) = self.semaphore.clone().try_acquire_owned() {
            let Some(handle) = self.queue.claim_next().await? else {
                break;
            };
            let queue = self.queue.clone();
            self.tracker.spawn(async move {
                run_job(&queue, handle).await;
                drop(permit);
            });
            started += 1;
        }
        Ok(started)
    }

    /// Wait until no job is running.
    pub async fn wait_idle(&self) {
        if let Ok(all) = self.semaphore.acquire_many(self.permits).await {
            drop(all);
        }
    }

    /// Stop polling and wait for running jobs to finish.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        info!("worker pool stopped");
    }
}

async fn run_job(queue: &DeliveryQueue, handle: JobHandle) {
    let task = handle.job().task.clone();
    let Some(worker) = queue.worker_for(&task) else {
        warn!(job_id = %handle.id(), %task, "no worker registered");
        finish_with(
            &handle,
            DeliveryError::Recoverable(format!("No worker registered for {task}")),
        )
        .await;
        return;
    };

    debug!(job_id = %handle.id(), %task, "sending");
    let worker_handle = handle.clone();
    let joined = tokio::spawn(async move { worker.work(worker_handle).await }).await;
    let err = match joined {
        Ok(Ok(())) => {
            if let Ok(job) = handle.current().await
                && job.status == JobStatus::Running
            {
                debug!(job_id = %handle.id(), "job awaiting external completion");
            }
            return;
        }
        Ok(Err(err)) => err,
        Err(join_err) if join_err.is_panic() => {
            let payload = join_err.into_panic();
            let detail = payload
                .downcast_ref::<&str>()
                .map(ToString::to_string)
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_owned());
            DeliveryError::Recoverable(format!("worker panicked: {detail}"))
        }
        Err(_) => DeliveryError::Recoverable("worker task cancelled".to_owned()),
    };
    finish_with(&handle, err).await;
}

async fn finish_with(handle: &JobHandle, err: DeliveryError) {
    match handle.done(Err(err)).await {
        Ok(_) => {}
        Err(QueueError::InvalidTransition { from, .. }) => {
            debug!(job_id = %handle.id(), %from, "worker error after job was already finished");
        }
        Err(other) => warn!(job_id = %handle.id(), error = %other, "could not record worker failure"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::job::fixtures::sms_message;
    use crate::queue::tests::test_queue;

    #[tokio::test]
    async fn completing_worker() {
        let (queue, _) = test_queue(3);
        queue
            .register_worker("sms", worker_fn(|job: JobHandle| async move {
                job.complete().await.map(|_| ()).map_err(|e| DeliveryError::Fatal(e.to_string()))
            }))
            .unwrap();
        let job = queue.enqueue(sms_message("+15550001111")).await.unwrap();
        let pool = WorkerPool::new(queue.clone());
        assert_eq!(pool.run_once().await.unwrap(), 1);
        pool.wait_idle().await;
        assert_eq!(
            queue.job(&job.id).await.unwrap().unwrap().status,
            JobStatus::Completed
        );
    }

    #[tokio::test]
    async fn panicking_worker_schedules_retry() {
        let (queue, _) = test_queue(3);
        queue
            .register_worker("sms", worker_fn(|_job| async { panic!("provider exploded") }))
            .unwrap();
        let job = queue.enqueue(sms_message("+15550001111")).await.unwrap();
        let pool = WorkerPool::new(queue.clone());
        pool.run_once().await.unwrap();
        pool.wait_idle().await;
        let job = queue.job(&job.id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Waiting);
        assert!(job.last_error.unwrap().contains("provider exploded"));
    }

    #[tokio::test]
    async fn worker_error_finishes_running_job() {
        let (queue, _) = test_queue(3);
        queue
            .register_worker("sms", worker_fn(|_job| async {
                Err(DeliveryError::Fatal("invalid number".into()))
            }))
            .unwrap();
        let job = queue.enqueue(sms_message("+15550001111")).await.unwrap();
        let pool = WorkerPool::new(queue.clone());
        pool.run_once().await.unwrap();
        pool.wait_idle().await;
        assert_eq!(
            queue.job(&job.id).await.unwrap().unwrap().status,
            JobStatus::Failed
        );
    }

    #[tokio::test]
    async fn missing_worker_is_recoverable() {
        let (queue, _) = test_queue(3);
        let job = queue.enqueue(sms_message("+15550001111")).await.unwrap();
        let pool = WorkerPool::new(queue.clone());
        pool.run_once().await.unwrap();
        pool.wait_idle().await;
        let job = queue.job(&job.id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Waiting);
        assert_eq!(
            job.last_error.as_deref(),
            Some("No worker registered for sms")
        );
    }

    #[tokio::test]
    async fn ok_without_done_leaves_job_running() {
        let (queue, _) = test_queue(3);
        queue
            .register_worker("sms", worker_fn(|job: JobHandle| async move {
                job.link_to_external_id("twilio", "SM1")
                    .await
                    .map_err(|e| DeliveryError::Recoverable(e.to_string()))
            }))
            .unwrap();
        let job = queue.enqueue(sms_message("+15550001111")).await.unwrap();
        let pool = WorkerPool::new(queue.clone());
        pool.run_once().await.unwrap();
        pool.wait_idle().await;
        assert_eq!(
            queue.job(&job.id).await.unwrap().unwrap().status,
            JobStatus::Running
        );
    }

    #[tokio::test]
    async fn respects_max_concurrent() {
        let (queue, _) = test_queue(3);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (a, p) = (active.clone(), peak.clone());
        queue
            .register_worker("sms", worker_fn(move |job: JobHandle| {
                let (active, peak) = (a.clone(), p.clone());
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    job.complete()
                        .await
                        .map(|_| ())
                        .map_err(|e| DeliveryError::Fatal(e.to_string()))
                }
            }))
            .unwrap();
        for _ in 0..10 {
            queue.enqueue(sms_message("+15550001111")).await.unwrap();
        }
        let pool = WorkerPool::new(queue.clone());
        assert_eq!(pool.run_once().await.unwrap(), 4);
        assert_eq!(pool.run_once().await.unwrap(), 0);
        pool.wait_idle().await;
        while pool.run_once().await.unwrap() > 0 {
            pool.wait_idle().await;
        }
        assert!(peak.load(Ordering::SeqCst) <= 4);
        assert_eq!(
            queue.jobs(Some(JobStatus::Completed)).await.unwrap().len(),
            10
        );
    }

    #[tokio::test]
    async fn started_pool_drains_queue() {
        let (queue, _) = test_queue(3);
        queue
            .register_worker("sms", worker_fn(|job: JobHandle| async move {
                job.complete().await.map(|_| ()).map_err(|e| DeliveryError::Fatal(e.to_string()))
            }))
            .unwrap();
        for _ in 0..3 {
            queue.enqueue(sms_message("+15550001111")).await.unwrap();
        }
        let pool = WorkerPool::new(queue.clone());
        pool.start();
        for _ in 0..100 {
            if queue.jobs(Some(JobStatus::Completed)).await.unwrap().len() == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        pool.shutdown().await;
        assert_eq!(
            queue.jobs(Some(JobStatus::Completed)).await.unwrap().len(),
            3
        );
    }
}
