use std::sync::Arc;

use chrono::TimeDelta;
use tracing::{error, info, instrument, warn};

use courier_core::{DeliveryResponse, ErrorLevel, JobId, Message};

use crate::error::{DeliveryError, QueueError};
use crate::event::{DeliveryEvent, ResponseOutcome, Suppression};
use crate::job::{Job, JobLogEntry, JobStatus, JobTransition};
use crate::queue::Shared;

/// What a worker or status callback gets to act on a job.
///
/// The handle carries a snapshot of the job taken when it was obtained;
/// every transition goes through the queue's store.
#[derive(Clone)]
pub struct JobHandle {
    shared: Arc<Shared>,
    job: Job,
}

impl JobHandle {
    pub(crate) fn new(shared: Arc<Shared>, job: Job) -> Self {
        Self { shared, job }
    }

    pub fn id(&self) -> &JobId {
        &self.job.id
    }

    /// The job as it was when this handle was obtained.
    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn message(&self) -> &Message {
        &self.job.message
    }

    /// Re-read the job from the store.
    pub async fn current(&self) -> Result<Job, QueueError> {
        self.shared
            .store
            .get(&self.job.id)
            .await?
            .ok_or_else(|| QueueError::UnknownJob(self.job.id.clone()))
    }

    /// Append a line to the job's log.
    pub async fn log(&self, message: impl Into<String>) -> Result<(), QueueError> {
        let entry = JobLogEntry {
            at: self.shared.now(),
            message: message.into(),
        };
        if self.shared.store.append_log(&self.job.id, entry).await? {
            Ok(())
        } else {
            Err(QueueError::UnknownJob(self.job.id.clone()))
        }
    }

    /// Make this job findable by `(source, external_id)`.
    pub async fn link_to_external_id(
        &self,
        source: &str,
        external_id: &str,
    ) -> Result<(), QueueError> {
        self.shared
            .store
            .link_external_id(&self.job.id, source, external_id)
            .await
    }

    /// Finish a running job.
    ///
    /// `Ok` completes it. A recoverable error puts it in `Waiting` with a
    /// backoff until the retry limit is used up, then fails it; fatal and
    /// catastrophic errors fail it at once. Returns the job as stored.
    #[instrument(skip_all, fields(job_id = %self.job.id, task = %self.job.task))]
    pub async fn done(&self, result: Result<(), DeliveryError>) -> Result<Job, QueueError> {
        let now = self.shared.now();
        let current = self.current().await?;
        let config = &self.shared.config;

        let mut transition = JobTransition::to(&current, JobStatus::Completed, now);
        transition.last_error = result.as_ref().err().map(|err| err.message().to_owned());
        let line = match &result {
            Ok(()) => "completed".to_owned(),
            Err(err) if err.is_retryable() && current.retry_count < config.retry_limit => {
                let delay = config.retry_strategy.delay_for(current.retry_count);
                transition.status = JobStatus::Waiting;
                transition.retry_count = current.retry_count + 1;
                transition.run_at = now
                    .checked_add_signed(TimeDelta::from_std(delay).unwrap_or(TimeDelta::MAX))
                    .unwrap_or(now);
                format!(
                    "retry {} of {} in {}ms: {err}",
                    transition.retry_count,
                    config.retry_limit,
                    delay.as_millis()
                )
            }
            Err(err) => {
                transition.status = JobStatus::Failed;
                format!("failed: {err}")
            }
        };
        transition.note = Some(line);
        let status = transition.status;

        if current.status != JobStatus::Running {
            return Err(QueueError::InvalidTransition {
                job: current.id,
                from: current.status,
                to: status,
            });
        }

        let Some(job) = self
            .shared
            .store
            .transition(&current.id, JobStatus::Running, transition)
            .await?
        else {
            let current = self.current().await?;
            return Err(QueueError::InvalidTransition {
                job: current.id,
                from: current.status,
                to: status,
            });
        };

        match status {
            JobStatus::Completed => info!("job completed"),
            JobStatus::Waiting => {
                warn!(retry_count = job.retry_count, run_at = %job.run_at, error = ?job.last_error, "job will retry");
            }
            _ => warn!(error = ?job.last_error, retries = job.retry_count, "job failed"),
        }
        Ok(job)
    }

    /// Complete the job.
    pub async fn complete(&self) -> Result<Job, QueueError> {
        self.done(Ok(())).await
    }

    /// Apply a provider response translated by a channel sender.
    ///
    /// Ok and final completes the job; ok but not final leaves it running.
    /// Failures below [`ErrorLevel::Fatal`] are retried. Fatal and worse fail
    /// the job and emit [`DeliveryEvent::Suppressed`]; catastrophic failures
    /// also emit [`DeliveryEvent::Catastrophic`].
    pub async fn handle_response(
        &self,
        response: DeliveryResponse,
    ) -> Result<ResponseOutcome, QueueError> {
        self.log(format!(
            "Current status: {}",
            response.status.as_deref().unwrap_or("unknown")
        ))
        .await?;

        let Some(err) = DeliveryError::from_response(&response) else {
            if !response.done {
                return Ok(ResponseOutcome::Pending);
            }
            self.done(Ok(())).await?;
            return Ok(ResponseOutcome::Completed);
        };

        let level = err.level();
        let job = self.done(Err(err.clone())).await?;

        let suppressed = level >= ErrorLevel::Fatal;
        if suppressed {
            self.shared.emit(DeliveryEvent::Suppressed(Suppression {
                job_id: job.id.clone(),
                channel: job.task.clone(),
                recipient: job.message.recipient.clone(),
                reason: err.message().to_owned(),
                resolution: response.resolution.clone(),
                level,
            }));
        }
        if level >= ErrorLevel::Catastrophic {
            error!(job_id = %job.id, task = %job.task, error = err.message(), "catastrophic delivery error");
            self.shared.emit(DeliveryEvent::Catastrophic {
                job_id: job.id.clone(),
                channel: job.task.clone(),
                error: err.message().to_owned(),
            });
        }

        Ok(match job.status {
            JobStatus::Waiting => ResponseOutcome::Retrying {
                retry_count: job.retry_count,
            },
            _ => ResponseOutcome::Failed { level, suppressed },
        })
    }
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("job_id", &self.job.id)
            .field("task", &self.job.task)
            .finish_non_exhaustive()
    }
}
