use async_trait::async_trait;
use serde::Serialize;
use tracing::error;

use courier_core::{ChannelName, JobId};

/// A catastrophic delivery failure that needs an operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub job_id: JobId,
    pub channel: ChannelName,
    pub error: String,
}

/// Where catastrophic failures are reported.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn alert(&self, alert: &Alert);
}

/// Logs alerts at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn alert(&self, alert: &Alert) {
        error!(
            job_id = %alert.job_id,
            channel = %alert.channel,
            error = %alert.error,
            "catastrophic delivery failure, operator attention needed"
        );
    }
}
