use async_trait::async_trait;
use tracing::info;

use courier_queue::{DeliveryError, JobHandle, QueueError, Worker};

/// A development sender: logs each message instead of contacting a provider,
/// then completes the job.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogWorker;

#[async_trait]
impl Worker for LogWorker {
    async fn work(&self, job: JobHandle) -> Result<(), DeliveryError> {
        let message = job.message();
        info!(
            job_id = %job.id(),
            channel = %message.channel,
            kind = %message.transport.kind(),
            recipient = ?message.recipient,
            transport = ?message.transport,
            subject = %message.subject_template,
            body = %message.body_template,
            "delivering message to log"
        );
        job.log("Delivered to log").await.map_err(recoverable)?;
        job.complete().await.map_err(recoverable)?;
        Ok(())
    }
}

fn recoverable(err: QueueError) -> DeliveryError {
    DeliveryError::Recoverable(err.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use courier_core::{ChannelKind, EntityRef, Message, TransportConfig};
    use courier_queue::{DeliveryQueue, JobStatus, MemoryJobStore, WorkerPool};
    use serde_json::Map;

    use super::*;

    #[tokio::test]
    async fn completes_every_job() {
        let queue = DeliveryQueue::builder()
            .store(Arc::new(MemoryJobStore::new()))
            .task("email", ChannelKind::Email)
            .worker("email", Arc::new(LogWorker))
            .build()
            .unwrap();
        let job = queue
            .enqueue(Message {
                channel: "email".into(),
                subject_template: "Hi".into(),
                body_template: "Welcome".into(),
                transport: TransportConfig::Email {
                    to: "a@example.com".into(),
                },
                delay_ms: 0,
                timeout_ms: 0,
                template_data: Map::new(),
                recipient: Some(EntityRef::new("user", "1")),
            })
            .await
            .unwrap();

        let pool = WorkerPool::new(queue.clone());
        pool.run_once().await.unwrap();
        pool.wait_idle().await;

        let job = queue.job(&job.id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.log.iter().any(|l| l.message == "Delivered to log"));
    }
}
