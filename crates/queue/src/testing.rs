use chrono::{TimeDelta, Utc};
use serde_json::Map;

use courier_core::{EntityRef, Message, TransportConfig};

use crate::error::QueueError;
use crate::job::{Job, JobLogEntry, JobStatus, JobTransition};
use crate::store::JobStore;

/// Run the job store conformance test suite.
///
/// Call this from your backend's test module with a fresh, empty store.
///
/// # Errors
///
/// Returns an error if the backend fails an operation outright; behavioral
/// mismatches panic.
pub async fn run_job_store_conformance_tests(store: &dyn JobStore) -> Result<(), QueueError> {
    test_insert_and_get(store).await?;
    test_claim_respects_run_at(store).await?;
    test_transition(store).await?;
    test_promote_due(store).await?;
    test_log(store).await?;
    test_external_ids(store).await?;
    test_list(store).await?;
    Ok(())
}

fn message(to: &str) -> Message {
    Message {
        channel: "email".into(),
        subject_template: "Hello".into(),
        body_template: "Body".into(),
        transport: TransportConfig::Email { to: to.into() },
        delay_ms: 0,
        timeout_ms: 0,
        template_data: Map::new(),
        recipient: Some(EntityRef::new("user", to)),
    }
}

async fn drain(store: &dyn JobStore) -> Result<(), QueueError> {
    let far = Utc::now() + TimeDelta::days(3650);
    while let Some(job) = store.claim_next(far).await? {
        finish(store, &job).await?;
    }
    Ok(())
}

async fn finish(store: &dyn JobStore, job: &Job) -> Result<(), QueueError> {
    let done = JobTransition::to(job, JobStatus::Completed, Utc::now());
    let finished = store.transition(&job.id, JobStatus::Running, done).await?;
    assert!(finished.is_some(), "running job {} should complete", job.id);
    Ok(())
}

async fn test_insert_and_get(store: &dyn JobStore) -> Result<(), QueueError> {
    let job = Job::new(message("insert@example.com"), Utc::now());
    store.insert(job.clone()).await?;
    assert_eq!(store.get(&job.id).await?, Some(job.clone()));
    assert!(store.insert(job).await.is_err(), "duplicate insert must fail");
    drain(store).await
}

async fn test_claim_respects_run_at(store: &dyn JobStore) -> Result<(), QueueError> {
    let now = Utc::now();
    let mut later = message("later@example.com");
    later.delay_ms = 60_000;
    let delayed = Job::new(later, now);
    let ready = Job::new(message("ready@example.com"), now);
    store.insert(delayed.clone()).await?;
    store.insert(ready.clone()).await?;

    let claimed = store.claim_next(now).await?.expect("ready job should be claimed");
    assert_eq!(claimed.id, ready.id);
    assert_eq!(claimed.status, JobStatus::Running);
    assert!(store.claim_next(now).await?.is_none(), "delayed job is not due");

    finish(store, &claimed).await?;

    let claimed = store
        .claim_next(now + TimeDelta::minutes(2))
        .await?
        .expect("delayed job is due later");
    assert_eq!(claimed.id, delayed.id);
    finish(store, &claimed).await?;
    drain(store).await
}

async fn test_transition(store: &dyn JobStore) -> Result<(), QueueError> {
    let now = Utc::now();
    let job = Job::new(message("transition@example.com"), now);
    store.insert(job.clone()).await?;
    let running = store.claim_next(now).await?.expect("job should be claimed");

    // Written after the claim; the transition below is built from the older
    // snapshot and must not drop either.
    let entry = JobLogEntry {
        at: now,
        message: "Current status: sent".into(),
    };
    assert!(store.append_log(&job.id, entry.clone()).await?);
    store.link_external_id(&job.id, "mandrill", "MD-1").await?;

    let mut done = JobTransition::to(&running, JobStatus::Completed, now);
    done.note = Some("completed".into());
    let stored = store
        .transition(&job.id, JobStatus::Running, done.clone())
        .await?
        .expect("first transition from running wins");
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.external_id("mandrill"), Some("MD-1"));
    let lines: Vec<_> = stored.log.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(lines, ["Current status: sent", "completed"]);

    assert!(
        store
            .transition(&job.id, JobStatus::Running, done.clone())
            .await?
            .is_none(),
        "second transition from running must lose"
    );
    assert!(
        store
            .transition(&"missing".into(), JobStatus::Running, done)
            .await?
            .is_none()
    );
    assert_eq!(store.get(&job.id).await?, Some(stored));
    Ok(())
}

async fn test_promote_due(store: &dyn JobStore) -> Result<(), QueueError> {
    let now = Utc::now();
    let mut job = Job::new(message("wait@example.com"), now);
    job.status = JobStatus::Waiting;
    job.run_at = now + TimeDelta::seconds(30);
    store.insert(job.clone()).await?;

    assert_eq!(store.promote_due(now).await?, 0);
    assert_eq!(store.promote_due(now + TimeDelta::seconds(31)).await?, 1);
    assert_eq!(
        store.get(&job.id).await?.map(|j| j.status),
        Some(JobStatus::Queued)
    );
    drain(store).await
}

async fn test_log(store: &dyn JobStore) -> Result<(), QueueError> {
    let job = Job::new(message("log@example.com"), Utc::now());
    store.insert(job.clone()).await?;
    let entry = JobLogEntry {
        at: Utc::now(),
        message: "Current status: queued".into(),
    };
    assert!(store.append_log(&job.id, entry.clone()).await?);
    assert_eq!(store.get(&job.id).await?.map(|j| j.log), Some(vec![entry.clone()]));
    assert!(!store.append_log(&"missing".into(), entry).await?);
    drain(store).await
}

async fn test_external_ids(store: &dyn JobStore) -> Result<(), QueueError> {
    let a = Job::new(message("ext-a@example.com"), Utc::now());
    let b = Job::new(message("ext-b@example.com"), Utc::now());
    store.insert(a.clone()).await?;
    store.insert(b.clone()).await?;

    store.link_external_id(&a.id, "twilio", "SM123").await?;
    store.link_external_id(&a.id, "twilio", "SM123").await?;
    let found = store
        .find_by_external_id("twilio", "SM123")
        .await?
        .expect("linked job should be found");
    assert_eq!(found.id, a.id);
    assert_eq!(found.external_id("twilio"), Some("SM123"));
    assert_eq!(found.external_links.len(), 1);

    assert!(store.find_by_external_id("mandrill", "SM123").await?.is_none());
    assert!(matches!(
        store.link_external_id(&b.id, "twilio", "SM123").await,
        Err(QueueError::ExternalIdTaken { .. })
    ));
    assert!(matches!(
        store.link_external_id(&"missing".into(), "twilio", "SM999").await,
        Err(QueueError::UnknownJob(_))
    ));
    drain(store).await
}

async fn test_list(store: &dyn JobStore) -> Result<(), QueueError> {
    let now = Utc::now();
    store.insert(Job::new(message("list@example.com"), now)).await?;
    let queued = store.list(Some(JobStatus::Queued)).await?;
    assert_eq!(queued.len(), 1);
    let all = store.list(None).await?;
    assert!(all.len() > queued.len());
    assert!(all.iter().all(|job| job.status != JobStatus::Running));
    drain(store).await
}
