use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entity::EntityRef;
use crate::types::ChannelName;

/// The delivery mechanism family a channel belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Email,
    Sms,
    Push,
    Webhook,
    Custom,
}

impl ChannelKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Sms => "sms",
            Self::Push => "push",
            Self::Webhook => "webhook",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP verbs a webhook channel may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
    Put,
    Delete,
    Patch,
}

/// Channel-specific addressing and transport settings carried by a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportConfig {
    Email {
        to: String,
    },
    Sms {
        to: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<String>,
    },
    Push {
        user_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        badge: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    Webhook {
        url: String,
        #[serde(default)]
        method: HttpMethod,
        #[serde(default)]
        headers: BTreeMap<String, String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        basic_auth: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expect_status: Option<u16>,
    },
    /// Opaque settings for channels the core knows nothing about.
    Custom {
        #[serde(default)]
        fields: Map<String, Value>,
    },
}

/// Returned by [`TransportConfig::validate`] when a required field is empty.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} transport: {reason}")]
pub struct InvalidTransport {
    pub kind: ChannelKind,
    pub reason: String,
}

impl TransportConfig {
    #[must_use]
    pub fn kind(&self) -> ChannelKind {
        match self {
            Self::Email { .. } => ChannelKind::Email,
            Self::Sms { .. } => ChannelKind::Sms,
            Self::Push { .. } => ChannelKind::Push,
            Self::Webhook { .. } => ChannelKind::Webhook,
            Self::Custom { .. } => ChannelKind::Custom,
        }
    }

    /// Check that the fields a sender cannot do without are present.
    pub fn validate(&self) -> Result<(), InvalidTransport> {
        let missing = match self {
            Self::Email { to } | Self::Sms { to, .. } if to.trim().is_empty() => Some("`to`"),
            Self::Push { user_id, .. } if user_id.is_empty() => Some("`user_id`"),
            Self::Webhook { url, .. } if url.trim().is_empty() => Some("`url`"),
            _ => None,
        };
        match missing {
            Some(field) => Err(InvalidTransport {
                kind: self.kind(),
                reason: format!("{field} must not be empty"),
            }),
            None => Ok(()),
        }
    }
}

/// A fully materialized outbound notification, ready to be wrapped in a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Channel (and queue task) this message goes through.
    pub channel: ChannelName,
    #[serde(default)]
    pub subject_template: String,
    pub body_template: String,
    pub transport: TransportConfig,
    /// Delay before the job becomes eligible, in milliseconds.
    #[serde(default)]
    pub delay_ms: u64,
    /// Delivery timeout the sender should honor, in milliseconds. Zero means none.
    #[serde(default)]
    pub timeout_ms: u64,
    #[serde(default)]
    pub template_data: Map<String, Value>,
    /// Who this message is for, kept so a permanent failure can be pinned to
    /// the right recipient.
    #[serde(default)]
    pub recipient: Option<EntityRef>,
}

impl Message {
    #[must_use]
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}
