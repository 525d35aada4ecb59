use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use courier_core::JobId;

use crate::error::QueueError;
use crate::job::{ExternalLink, Job, JobLogEntry, JobStatus, JobTransition};
use crate::store::JobStore;

/// In-memory [`JobStore`] backed by [`DashMap`]s.
///
/// Transitions take the job's shard lock, which makes claims and
/// status transitions atomic per job.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: DashMap<JobId, Job>,
    external: DashMap<(String, String), JobId>,
}

impl MemoryJobStore {
    /// Create a new, empty job store.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    fn due_candidates(&self, now: DateTime<Utc>) -> Vec<(DateTime<Utc>, JobId)> {
        let mut due: Vec<_> = self
            .jobs
            .iter()
            .filter(|job| job.status == JobStatus::Queued && job.is_due(now))
            .map(|job| (job.run_at, job.id.clone()))
            .collect();
        due.sort();
        due
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: Job) -> Result<(), QueueError> {
        match self.jobs.entry(job.id.clone()) {
            Entry::Occupied(_) => Err(QueueError::Store(format!("job {} already exists", job.id))),
            Entry::Vacant(slot) => {
                slot.insert(job);
                Ok(())
            }
        }
    }

    async fn get(&self, id: &JobId) -> Result<Option<Job>, QueueError> {
        Ok(self.jobs.get(id).map(|job| job.clone()))
    }

    async fn transition(
        &self,
        id: &JobId,
        expected: JobStatus,
        transition: JobTransition,
    ) -> Result<Option<Job>, QueueError> {
        let Some(mut stored) = self.jobs.get_mut(id) else {
            return Ok(None);
        };
        if stored.status != expected {
            return Ok(None);
        }
        transition.apply(&mut stored);
        Ok(Some(stored.clone()))
    }

    async fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<Job>, QueueError> {
        // Another claimer may win a candidate between the scan and the lock;
        // move on to the next one when that happens.
        for (_, id) in self.due_candidates(now) {
            if let Some(mut job) = self.jobs.get_mut(&id)
                && job.status == JobStatus::Queued
            {
                job.status = JobStatus::Running;
                job.updated_at = now;
                return Ok(Some(job.clone()));
            }
        }
        Ok(None)
    }

    async fn promote_due(&self, now: DateTime<Utc>) -> Result<usize, QueueError> {
        let mut promoted = 0;
        for mut job in self.jobs.iter_mut() {
            if job.status == JobStatus::Waiting && job.is_due(now) {
                job.status = JobStatus::Queued;
                job.updated_at = now;
                promoted += 1;
            }
        }
        Ok(promoted)
    }

    async fn append_log(&self, id: &JobId, entry: JobLogEntry) -> Result<bool, QueueError> {
        Ok(match self.jobs.get_mut(id) {
            Some(mut job) => {
                job.log.push(entry);
                true
            }
            None => false,
        })
    }

    async fn link_external_id(
        &self,
        id: &JobId,
        source: &str,
        external_id: &str,
    ) -> Result<(), QueueError> {
        let Some(mut job) = self.jobs.get_mut(id) else {
            return Err(QueueError::UnknownJob(id.clone()));
        };
        match self
            .external
            .entry((source.to_owned(), external_id.to_owned()))
        {
            Entry::Occupied(existing) if existing.get() != id => {
                return Err(QueueError::ExternalIdTaken {
                    source_name: source.to_owned(),
                    external_id: external_id.to_owned(),
                    job: existing.get().clone(),
                });
            }
            Entry::Occupied(_) => {}
            Entry::Vacant(slot) => {
                slot.insert(id.clone());
            }
        }
        let link = ExternalLink {
            source: source.to_owned(),
            external_id: external_id.to_owned(),
        };
        if !job.external_links.contains(&link) {
            job.external_links.push(link);
        }
        Ok(())
    }

    async fn find_by_external_id(
        &self,
        source: &str,
        external_id: &str,
    ) -> Result<Option<Job>, QueueError> {
        let Some(id) = self
            .external
            .get(&(source.to_owned(), external_id.to_owned()))
            .map(|id| id.clone())
        else {
            return Ok(None);
        };
        self.get(&id).await
    }

    async fn list(&self, status: Option<JobStatus>) -> Result<Vec<Job>, QueueError> {
        let mut jobs: Vec<Job> = self
            .jobs
            .iter()
            .filter(|job| status.is_none_or(|s| job.status == s))
            .map(|job| job.clone())
            .collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::run_job_store_conformance_tests;

    #[tokio::test]
    async fn conformance() {
        let store = MemoryJobStore::new();
        run_job_store_conformance_tests(&store).await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_claims_hand_out_each_job_once() {
        use std::collections::HashSet;
        use std::sync::Arc;

        let store = Arc::new(MemoryJobStore::new());
        let now = Utc::now();
        for n in 0..20 {
            store
                .insert(Job::new(crate::job::fixtures::sms_message(&format!("+1{n}")), now))
                .await
                .unwrap();
        }
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let mut claimed = Vec::new();
                while let Some(job) = store.claim_next(now).await.unwrap() {
                    claimed.push(job.id);
                    tokio::task::yield_now().await;
                }
                claimed
            }));
        }
        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.await.unwrap() {
                assert!(seen.insert(id), "job claimed twice");
            }
        }
        assert_eq!(seen.len(), 20);
    }
}
