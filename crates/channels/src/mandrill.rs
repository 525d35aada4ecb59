//! Mandrill email send results.

use serde::{Deserialize, Serialize};

use courier_core::{DeliveryResponse, ErrorLevel};

/// Translate a Mandrill send status and reject reason.
#[must_use]
pub fn interpret(status: &str, reject_reason: Option<&str>) -> DeliveryResponse {
    let (level, error) = match status {
        "sent" | "queued" => return DeliveryResponse::delivered(status),
        "rejected" => match reject_reason.unwrap_or_default() {
            "hard-bounce" => (ErrorLevel::Fatal, "Bounce".to_owned()),
            "soft-bounce" => (ErrorLevel::Minor, "Soft bounce".to_owned()),
            "spam" => (ErrorLevel::Fatal, "Spam".to_owned()),
            "unsub" => (ErrorLevel::Fatal, "Unsubscribed".to_owned()),
            "invalid-sender" => (ErrorLevel::Catastrophic, "Invalid Mandrill sender".to_owned()),
            other => (ErrorLevel::Minor, format!("Unknown reject reason: {other}")),
        },
        "invalid" => (ErrorLevel::Fatal, "Invalid".to_owned()),
        other => (ErrorLevel::Minor, format!("Unknown Mandrill status: {other}")),
    };
    DeliveryResponse::failed(level, error).with_status(status)
}

/// One recipient's entry in a Mandrill `messages/send-template` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResult {
    pub email: String,
    pub status: String,
    #[serde(default)]
    pub reject_reason: Option<String>,
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
}

impl SendResult {
    #[must_use]
    pub fn response(&self) -> DeliveryResponse {
        interpret(&self.status, self.reject_reason.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sent_and_queued_are_final() {
        for status in ["sent", "queued"] {
            let resp = interpret(status, None);
            assert!(resp.ok && resp.done, "{status}");
        }
    }

    #[test]
    fn reject_reasons() {
        let cases = [
            ("hard-bounce", ErrorLevel::Fatal, "Bounce"),
            ("soft-bounce", ErrorLevel::Minor, "Soft bounce"),
            ("spam", ErrorLevel::Fatal, "Spam"),
            ("unsub", ErrorLevel::Fatal, "Unsubscribed"),
            ("invalid-sender", ErrorLevel::Catastrophic, "Invalid Mandrill sender"),
            ("rule", ErrorLevel::Minor, "Unknown reject reason: rule"),
        ];
        for (reason, level, error) in cases {
            let resp = interpret("rejected", Some(reason));
            assert!(!resp.ok, "{reason}");
            assert_eq!(resp.error_level, level, "{reason}");
            assert_eq!(resp.error.as_deref(), Some(error), "{reason}");
            assert_eq!(resp.status.as_deref(), Some("rejected"));
        }
    }

    #[test]
    fn invalid_and_unknown_statuses() {
        let invalid = interpret("invalid", None);
        assert_eq!(invalid.error_level, ErrorLevel::Fatal);
        assert_eq!(invalid.error.as_deref(), Some("Invalid"));

        let odd = interpret("scheduled", None);
        assert_eq!(odd.error_level, ErrorLevel::Minor);
        assert_eq!(odd.error.as_deref(), Some("Unknown Mandrill status: scheduled"));
    }

    #[test]
    fn parses_api_result() {
        let results: Vec<SendResult> = serde_json::from_str(
            r#"[{"email":"a@example.com","status":"rejected","reject_reason":"hard-bounce","_id":"abc"}]"#,
        )
        .unwrap();
        assert_eq!(results[0].id.as_deref(), Some("abc"));
        assert_eq!(results[0].response().error.as_deref(), Some("Bounce"));
    }
}
