//! Builders for the transport part of a message, one per channel.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

use courier_core::{ChannelKind, EntityRef, HttpMethod, TransportConfig};

use crate::error::RouterError;

/// Inputs available when addressing one message.
#[derive(Debug, Clone, Copy)]
pub struct FormatContext<'a> {
    pub channel: &'a str,
    pub entity: &'a EntityRef,
    /// The host's record for the recipient. `None` when the directory had no
    /// record for it.
    pub recipient: Option<&'a Value>,
    /// Channel-level `config` with the event-level `config` merged over it.
    pub config: &'a Value,
    pub event: &'a str,
    pub data: &'a Value,
    pub template_data: &'a Map<String, Value>,
}

impl FormatContext<'_> {
    /// A string field of the recipient record.
    pub fn recipient_str(&self, field: &str) -> Option<&str> {
        self.recipient?.get(field)?.as_str().filter(|s| !s.is_empty())
    }

    pub fn config_str(&self, field: &str) -> Option<&str> {
        self.config.get(field)?.as_str()
    }

    fn missing(&self, what: &str) -> RouterError {
        match self.recipient {
            Some(_) => RouterError::format(self.channel, format!("recipient {} has no {what}", self.entity)),
            None => RouterError::format(
                self.channel,
                format!("no record for recipient {}, cannot find {what}", self.entity),
            ),
        }
    }
}

/// Builds a channel's [`TransportConfig`] from a recipient and its merged
/// channel configuration.
pub trait ChannelFormatter: Send + Sync {
    /// Transport family this formatter produces.
    fn kind(&self) -> ChannelKind;

    fn transport(&self, ctx: &FormatContext<'_>) -> Result<TransportConfig, RouterError>;
}

/// `to` from the recipient's `email`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmailFormatter;

impl ChannelFormatter for EmailFormatter {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    fn transport(&self, ctx: &FormatContext<'_>) -> Result<TransportConfig, RouterError> {
        let to = ctx.recipient_str("email").ok_or_else(|| ctx.missing("email"))?;
        Ok(TransportConfig::Email { to: to.to_owned() })
    }
}

/// `to` from the recipient's `phone_number`; `from` from the channel config.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmsFormatter;

impl ChannelFormatter for SmsFormatter {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Sms
    }

    fn transport(&self, ctx: &FormatContext<'_>) -> Result<TransportConfig, RouterError> {
        let to = ctx
            .recipient_str("phone_number")
            .ok_or_else(|| ctx.missing("phone_number"))?;
        Ok(TransportConfig::Sms {
            to: to.to_owned(),
            from: ctx.config_str("from").map(str::to_owned),
        })
    }
}

/// Addresses the recipient's `id`, or the entity id when the record has
/// none. `badge` and `payload` come from the channel config.
#[derive(Debug, Clone, Copy, Default)]
pub struct PushFormatter;

impl ChannelFormatter for PushFormatter {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Push
    }

    fn transport(&self, ctx: &FormatContext<'_>) -> Result<TransportConfig, RouterError> {
        let user_id = match ctx.recipient.and_then(|r| r.get("id")) {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => ctx.entity.entity_id.clone(),
        };
        let badge = ctx
            .config
            .get("badge")
            .and_then(Value::as_u64)
            .and_then(|b| u32::try_from(b).ok());
        Ok(TransportConfig::Push {
            user_id,
            badge,
            payload: ctx.config.get("payload").cloned(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct WebhookSettings {
    #[serde(default)]
    url: String,
    #[serde(default)]
    method: HttpMethod,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default)]
    basic_auth: Option<String>,
    #[serde(default)]
    expect_status: Option<u16>,
}

/// Everything from the merged channel config: `url`, `method`, `headers`,
/// `basic_auth` and `expect_status`. The recipient record is not consulted.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebhookFormatter;

impl ChannelFormatter for WebhookFormatter {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Webhook
    }

    fn transport(&self, ctx: &FormatContext<'_>) -> Result<TransportConfig, RouterError> {
        let settings: WebhookSettings = serde_json::from_value(ctx.config.clone())
            .map_err(|err| RouterError::format(ctx.channel, err.to_string()))?;
        if settings.url.trim().is_empty() {
            return Err(RouterError::format(ctx.channel, "webhook config has no url"));
        }
        Ok(TransportConfig::Webhook {
            url: settings.url,
            method: settings.method,
            headers: settings.headers,
            basic_auth: settings.basic_auth,
            expect_status: settings.expect_status,
        })
    }
}

/// Passes the merged channel config through untouched, for channels the
/// router has no special knowledge of.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughFormatter;

impl ChannelFormatter for PassthroughFormatter {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Custom
    }

    fn transport(&self, ctx: &FormatContext<'_>) -> Result<TransportConfig, RouterError> {
        Ok(TransportConfig::Custom {
            fields: ctx.config.as_object().cloned().unwrap_or_default(),
        })
    }
}
