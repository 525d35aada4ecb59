use std::fmt;
use std::sync::Arc;

use courier_core::{ChannelKind, ChannelName};

use crate::formatter::{
    ChannelFormatter, EmailFormatter, PushFormatter, SmsFormatter, WebhookFormatter,
};

/// A notification channel the router can produce messages for.
///
/// A `multi` channel is configured as a list; each entry is routed on its own,
/// so one recipient can have several webhooks with different events.
#[derive(Clone)]
pub struct NotificationChannel {
    pub name: ChannelName,
    pub multi: bool,
    pub formatter: Arc<dyn ChannelFormatter>,
}

impl NotificationChannel {
    pub fn new(name: impl Into<ChannelName>, formatter: Arc<dyn ChannelFormatter>) -> Self {
        Self {
            name: name.into(),
            multi: false,
            formatter,
        }
    }

    #[must_use]
    pub fn multi(mut self) -> Self {
        self.multi = true;
        self
    }

    pub fn kind(&self) -> ChannelKind {
        self.formatter.kind()
    }

    /// email, sms, push and a multi webhook, using the stock formatters.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("email", Arc::new(EmailFormatter)),
            Self::new("sms", Arc::new(SmsFormatter)),
            Self::new("push", Arc::new(PushFormatter)),
            Self::new("webhook", Arc::new(WebhookFormatter)).multi(),
        ]
    }
}

impl fmt::Debug for NotificationChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationChannel")
            .field("name", &self.name)
            .field("multi", &self.multi)
            .field("kind", &self.kind())
            .finish()
    }
}
