//! Twilio SMS status handling.
//!
//! Twilio reports a message's fate twice: once in the send response and later
//! through a status callback posted to the application. Both go through
//! [`interpret`]; callbacks find their job through the external id linked
//! under [`SOURCE`] when the message was sent.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use courier_core::{DeliveryResponse, ErrorLevel};
use courier_queue::{DeliveryQueue, ResponseOutcome};

use crate::error::ChannelError;

/// External id source under which Twilio message SIDs are linked to jobs.
pub const SOURCE: &str = "twilio";

/// Translate a Twilio message status and error code.
///
/// `delivered` is final. `queued`, `sending` and `sent` are accepted but keep
/// the job open for the callback. `undelivered` is classified by error code;
/// anything else is treated as transient.
#[must_use]
pub fn interpret(status: &str, error_code: Option<&str>) -> DeliveryResponse {
    match status {
        "delivered" => DeliveryResponse::delivered(status),
        "queued" | "sending" | "sent" => DeliveryResponse::pending(status),
        "undelivered" => {
            let (level, error) = undelivered(error_code);
            DeliveryResponse::failed(level, error).with_status(status)
        }
        other => DeliveryResponse::failed(
            ErrorLevel::Minor,
            format!("Unrecognized status ({other})"),
        )
        .with_status(other),
    }
}

fn undelivered(error_code: Option<&str>) -> (ErrorLevel, &'static str) {
    match error_code.map(str::trim) {
        Some("30001") => (ErrorLevel::Minor, "Queue overflow"),
        Some("30002") => (ErrorLevel::Catastrophic, "Account suspended"),
        Some("30003") => (ErrorLevel::Fatal, "Unreachable destination"),
        Some("30004") => (ErrorLevel::Fatal, "Blacklisted"),
        Some("30005") => (ErrorLevel::Fatal, "Unknown destination"),
        Some("30006") => (ErrorLevel::Fatal, "Landline"),
        Some("30007") => (
            ErrorLevel::Minor,
            "Carrier violation (content/spam filtering)",
        ),
        Some("30009") => (ErrorLevel::Minor, "Missing segment (network error)"),
        _ => (ErrorLevel::Minor, "Unknown"),
    }
}

/// Body of a Twilio status callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCallback {
    #[serde(rename = "MessageSid")]
    pub message_sid: String,

    #[serde(rename = "MessageStatus")]
    pub message_status: String,

    /// Present when the status is `undelivered` or `failed`.
    #[serde(rename = "ErrorCode", default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl StatusCallback {
    pub fn from_json(body: &str) -> Result<Self, ChannelError> {
        Ok(serde_json::from_str(body)?)
    }

    #[must_use]
    pub fn response(&self) -> DeliveryResponse {
        interpret(&self.message_status, self.error_code.as_deref())
    }

    /// Apply the callback to the job linked to its message SID.
    ///
    /// Returns `None` when no job is linked to the SID.
    #[instrument(skip_all, fields(sid = %self.message_sid, status = %self.message_status))]
    pub async fn apply(
        &self,
        queue: &DeliveryQueue,
    ) -> Result<Option<ResponseOutcome>, ChannelError> {
        let Some(handle) = queue.job_by_external_id(SOURCE, &self.message_sid).await? else {
            debug!("no job linked to twilio message");
            return Ok(None);
        };

        let response = self.response();
        if !response.ok {
            warn!(
                job_id = %handle.id(),
                error = response.error.as_deref().unwrap_or_default(),
                level = %response.error_level,
                "twilio reported a delivery failure"
            );
        }
        Ok(Some(handle.handle_response(response).await?))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use courier_core::{ChannelKind, EntityRef, ManualClock, Message, TransportConfig};
    use courier_queue::{DeliveryEvent, JobStatus, MemoryJobStore, QueueConfig};
    use serde_json::Map;

    use super::*;

    fn sms(to: &str) -> Message {
        Message {
            channel: "sms".into(),
            subject_template: String::new(),
            body_template: "Hello".into(),
            transport: TransportConfig::Sms {
                to: to.into(),
                from: None,
            },
            delay_ms: 0,
            timeout_ms: 0,
            template_data: Map::new(),
            recipient: Some(EntityRef::new("user", "42")),
        }
    }

    async fn sent_job(sid: &str) -> DeliveryQueue {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        let queue = DeliveryQueue::builder()
            .store(Arc::new(MemoryJobStore::new()))
            .task("sms", ChannelKind::Sms)
            .config(QueueConfig::default())
            .clock(Arc::new(clock))
            .build()
            .unwrap();
        queue.enqueue(sms("+15550001111")).await.unwrap();
        let handle = queue.claim_next().await.unwrap().unwrap();
        handle.link_to_external_id(SOURCE, sid).await.unwrap();
        let outcome = handle
            .handle_response(interpret("queued", None))
            .await
            .unwrap();
        assert_eq!(outcome, ResponseOutcome::Pending);
        queue
    }

    #[test]
    fn delivered_is_final() {
        let resp = interpret("delivered", None);
        assert!(resp.ok && resp.done);
    }

    #[test]
    fn in_flight_statuses_stay_open() {
        for status in ["queued", "sending", "sent"] {
            let resp = interpret(status, None);
            assert!(resp.ok, "{status}");
            assert!(!resp.done, "{status}");
            assert_eq!(resp.status.as_deref(), Some(status));
        }
    }

    #[test]
    fn undelivered_codes() {
        let cases = [
            ("30001", ErrorLevel::Minor, "Queue overflow"),
            ("30002", ErrorLevel::Catastrophic, "Account suspended"),
            ("30003", ErrorLevel::Fatal, "Unreachable destination"),
            ("30004", ErrorLevel::Fatal, "Blacklisted"),
            ("30005", ErrorLevel::Fatal, "Unknown destination"),
            ("30006", ErrorLevel::Fatal, "Landline"),
            ("30007", ErrorLevel::Minor, "Carrier violation (content/spam filtering)"),
            ("30008", ErrorLevel::Minor, "Unknown"),
            ("30009", ErrorLevel::Minor, "Missing segment (network error)"),
        ];
        for (code, level, error) in cases {
            let resp = interpret("undelivered", Some(code));
            assert!(!resp.ok, "{code}");
            assert_eq!(resp.error_level, level, "{code}");
            assert_eq!(resp.error.as_deref(), Some(error), "{code}");
        }
        assert_eq!(
            interpret("undelivered", None).error.as_deref(),
            Some("Unknown")
        );
    }

    #[test]
    fn unrecognized_status_is_minor() {
        let resp = interpret("failed", Some("30004"));
        assert_eq!(resp.error_level, ErrorLevel::Minor);
        assert_eq!(resp.error.as_deref(), Some("Unrecognized status (failed)"));
    }

    #[test]
    fn callback_uses_twilio_field_names() {
        let cb = StatusCallback::from_json(
            r#"{"MessageSid":"SM1","MessageStatus":"undelivered","ErrorCode":"30004","AccountSid":"AC1"}"#,
        )
        .unwrap();
        assert_eq!(cb.message_sid, "SM1");
        assert_eq!(cb.error_code.as_deref(), Some("30004"));
        assert_eq!(cb.response().error.as_deref(), Some("Blacklisted"));

        assert!(matches!(
            StatusCallback::from_json(r#"{"MessageStatus":"sent"}"#),
            Err(ChannelError::InvalidPayload(_))
        ));
    }

    #[tokio::test]
    async fn blacklisted_callback_fails_and_suppresses() {
        let queue = sent_job("1234-ASDF").await;
        let mut events = queue.take_events().unwrap();

        let outcome = StatusCallback {
            message_sid: "1234-ASDF".into(),
            message_status: "undelivered".into(),
            error_code: Some("30004".into()),
        }
        .apply(&queue)
        .await
        .unwrap();

        assert_eq!(
            outcome,
            Some(ResponseOutcome::Failed {
                level: ErrorLevel::Fatal,
                suppressed: true,
            })
        );
        let Ok(DeliveryEvent::Suppressed(suppression)) = events.try_recv() else {
            panic!("expected a suppression event");
        };
        assert_eq!(suppression.reason, "Blacklisted");
        assert_eq!(suppression.resolution, None);
        assert_eq!(suppression.recipient, Some(EntityRef::new("user", "42")));

        let jobs = queue.jobs(Some(JobStatus::Failed)).await.unwrap();
        assert_eq!(jobs.len(), 1);
    }

    #[tokio::test]
    async fn delivered_callback_completes() {
        let queue = sent_job("SM-OK").await;
        let outcome = StatusCallback {
            message_sid: "SM-OK".into(),
            message_status: "delivered".into(),
            error_code: None,
        }
        .apply(&queue)
        .await
        .unwrap();
        assert_eq!(outcome, Some(ResponseOutcome::Completed));
        assert_eq!(queue.jobs(Some(JobStatus::Completed)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_sid_is_ignored() {
        let queue = sent_job("SM-KNOWN").await;
        let outcome = StatusCallback {
            message_sid: "SM-OTHER".into(),
            message_status: "delivered".into(),
            error_code: None,
        }
        .apply(&queue)
        .await
        .unwrap();
        assert_eq!(outcome, None);
        assert_eq!(queue.jobs(Some(JobStatus::Running)).await.unwrap().len(), 1);
    }
}
