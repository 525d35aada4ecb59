use async_trait::async_trait;
use chrono::{DateTime, Utc};

use courier_core::JobId;

use crate::error::QueueError;
use crate::job::{Job, JobLogEntry, JobStatus, JobTransition};

/// Persistence for delivery jobs with a secondary index on external ids.
///
/// Implementations must be `Send + Sync` and safe for concurrent access.
/// [`claim_next`](Self::claim_next) and
/// [`transition`](Self::transition) must be atomic per job so two
/// workers never transition the same job.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Store a new job.
    async fn insert(&self, job: Job) -> Result<(), QueueError>;

    async fn get(&self, id: &JobId) -> Result<Option<Job>, QueueError>;

    /// Apply `transition` in place only if the job's stored status is still
    /// `expected`, leaving its log and external links otherwise untouched.
    /// Returns the job as stored, or `None` when it is missing or has moved on.
    async fn transition(
        &self,
        id: &JobId,
        expected: JobStatus,
        transition: JobTransition,
    ) -> Result<Option<Job>, QueueError>;

    /// Atomically pick the earliest due queued job and mark it running.
    async fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<Job>, QueueError>;

    /// Move every waiting job whose backoff has elapsed back to queued.
    /// Returns how many moved.
    async fn promote_due(&self, now: DateTime<Utc>) -> Result<usize, QueueError>;

    /// Append to a job's log. Returns `false` if the job does not exist.
    async fn append_log(&self, id: &JobId, entry: JobLogEntry) -> Result<bool, QueueError>;

    /// Index `(source, external_id)` to the job and record the link on it.
    ///
    /// Linking the same pair to the same job twice is a no-op; linking it to
    /// a different job fails with [`QueueError::ExternalIdTaken`].
    async fn link_external_id(
        &self,
        id: &JobId,
        source: &str,
        external_id: &str,
    ) -> Result<(), QueueError>;

    async fn find_by_external_id(
        &self,
        source: &str,
        external_id: &str,
    ) -> Result<Option<Job>, QueueError>;

    /// Jobs in the given status, or all jobs, oldest first.
    async fn list(&self, status: Option<JobStatus>) -> Result<Vec<Job>, QueueError>;
}
