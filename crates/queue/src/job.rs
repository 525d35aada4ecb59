use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use courier_core::{ChannelName, JobId, Message};

/// Lifecycle of a delivery job.
///
/// `Queued -> Running -> {Completed | Waiting | Failed}`; `Waiting` returns to
/// `Queued` once its backoff elapses. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Waiting,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Waiting => "waiting",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobLogEntry {
    pub at: DateTime<Utc>,
    pub message: String,
}

/// Correlates a job with an identifier assigned by an outside system, such
/// as a provider's message id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalLink {
    pub source: String,
    pub external_id: String,
}

/// One attempted delivery of one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Queue task, equal to the message's channel.
    pub task: ChannelName,
    pub message: Message,
    pub status: JobStatus,
    /// Retries consumed so far.
    pub retry_count: u32,
    /// Earliest time the job may be picked up.
    pub run_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub external_links: Vec<ExternalLink>,
    #[serde(default)]
    pub log: Vec<JobLogEntry>,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl Job {
    /// A queued job for `message`, eligible after the message's delay.
    pub fn new(message: Message, now: DateTime<Utc>) -> Self {
        let delay = chrono::TimeDelta::from_std(message.delay()).unwrap_or(chrono::TimeDelta::MAX);
        Self {
            id: JobId::generate(),
            task: message.channel.clone(),
            run_at: now.checked_add_signed(delay).unwrap_or(now),
            message,
            status: JobStatus::Queued,
            retry_count: 0,
            created_at: now,
            updated_at: now,
            external_links: Vec::new(),
            log: Vec::new(),
            last_error: None,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.run_at <= now
    }

    pub fn external_id(&self, source: &str) -> Option<&str> {
        self.external_links
            .iter()
            .find(|link| link.source == source)
            .map(|link| link.external_id.as_str())
    }
}

/// The fields a finished attempt changes on a job.
///
/// Stores apply a transition in place under the job's lock, so log lines and
/// external links written by others in the meantime are kept.
#[derive(Debug, Clone, PartialEq)]
pub struct JobTransition {
    pub status: JobStatus,
    pub retry_count: u32,
    pub run_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub at: DateTime<Utc>,
    /// Appended to the job's log when set.
    pub note: Option<String>,
}

impl JobTransition {
    /// A transition to `status` that leaves retry bookkeeping as `job` has it.
    pub fn to(job: &Job, status: JobStatus, at: DateTime<Utc>) -> Self {
        Self {
            status,
            retry_count: job.retry_count,
            run_at: job.run_at,
            last_error: job.last_error.clone(),
            at,
            note: None,
        }
    }

    pub fn apply(self, job: &mut Job) {
        job.status = self.status;
        job.retry_count = self.retry_count;
        job.run_at = self.run_at;
        job.last_error = self.last_error;
        job.updated_at = self.at;
        if let Some(message) = self.note {
            job.log.push(JobLogEntry {
                at: self.at,
                message,
            });
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use courier_core::TransportConfig;
    use serde_json::Map;

    use super::*;

    pub fn sms_message(to: &str) -> Message {
        Message {
            channel: "sms".into(),
            subject_template: String::new(),
            body_template: "Your code is {{code}}".into(),
            transport: TransportConfig::Sms {
                to: to.into(),
                from: None,
            },
            delay_ms: 0,
            timeout_ms: 0,
            template_data: Map::new(),
            recipient: Some(courier_core::EntityRef::new("user", "42")),
        }
    }
}
