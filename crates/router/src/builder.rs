use std::collections::HashMap;
use std::sync::Arc;

use courier_config::ConfigStore;
use courier_ledger::ErrorLedger;

use crate::channel::NotificationChannel;
use crate::defaults::{DEFAULT_PREFIX, router_schema};
use crate::engine::RoutingEngine;
use crate::error::RouterError;
use crate::hooks::{MessageTransform, RecipientDirectory, SkipFilter};
use crate::preference::PreferenceCheck;

/// Builder for [`RoutingEngine`].
///
/// `build` validates the registrations and installs the router schema under
/// the prefix of the configuration store. With no channels registered the
/// stock email, sms, push and webhook channels are used.
pub struct RoutingEngineBuilder {
    config: Option<Arc<ConfigStore>>,
    ledger: Option<Arc<dyn ErrorLedger>>,
    directory: Option<Arc<dyn RecipientDirectory>>,
    prefix: String,
    events: Vec<String>,
    channels: Vec<NotificationChannel>,
    preferences: Vec<(String, Arc<dyn PreferenceCheck>)>,
    skip_filter: Option<Arc<dyn SkipFilter>>,
    transform: Option<Arc<dyn MessageTransform>>,
}

impl Default for RoutingEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutingEngineBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            ledger: None,
            directory: None,
            prefix: DEFAULT_PREFIX.to_owned(),
            events: Vec::new(),
            channels: Vec::new(),
            preferences: Vec::new(),
            skip_filter: None,
            transform: None,
        }
    }

    #[must_use]
    pub fn config_store(mut self, config: Arc<ConfigStore>) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn ledger(mut self, ledger: Arc<dyn ErrorLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    #[must_use]
    pub fn directory(mut self, directory: Arc<dyn RecipientDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn event(mut self, event: impl Into<String>) -> Self {
        self.events.push(event.into());
        self
    }

    #[must_use]
    pub fn events<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.events.extend(events.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn channel(mut self, channel: NotificationChannel) -> Self {
        self.channels.push(channel);
        self
    }

    /// Register a tier and the check that gates it.
    #[must_use]
    pub fn preference(mut self, tier: impl Into<String>, check: Arc<dyn PreferenceCheck>) -> Self {
        self.preferences.push((tier.into(), check));
        self
    }

    #[must_use]
    pub fn skip_filter(mut self, filter: Arc<dyn SkipFilter>) -> Self {
        self.skip_filter = Some(filter);
        self
    }

    #[must_use]
    pub fn message_transform(mut self, transform: Arc<dyn MessageTransform>) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn build(self) -> Result<RoutingEngine, RouterError> {
        let config = self
            .config
            .ok_or_else(|| RouterError::Configuration("config store is required".into()))?;
        let ledger = self
            .ledger
            .ok_or_else(|| RouterError::Configuration("error ledger is required".into()))?;
        let directory = self
            .directory
            .ok_or_else(|| RouterError::Configuration("recipient directory is required".into()))?;
        if self.prefix.is_empty() {
            return Err(RouterError::Configuration("prefix must not be empty".into()));
        }

        let channels = if self.channels.is_empty() {
            NotificationChannel::defaults()
        } else {
            self.channels
        };
        for (i, channel) in channels.iter().enumerate() {
            if channels[..i].iter().any(|c| c.name == channel.name) {
                return Err(RouterError::Configuration(format!(
                    "channel `{}` registered twice",
                    channel.name
                )));
            }
        }

        let mut tiers = Vec::with_capacity(self.preferences.len());
        let mut checks = HashMap::with_capacity(self.preferences.len());
        for (tier, check) in self.preferences {
            if checks.insert(tier.clone(), check).is_some() {
                return Err(RouterError::Configuration(format!(
                    "preference tier `{tier}` registered twice"
                )));
            }
            tiers.push(tier);
        }

        config.set_schema_for_prefix(
            &self.prefix,
            &router_schema(&channels, &self.events, &tiers),
        );

        Ok(RoutingEngine {
            config,
            ledger,
            directory,
            prefix: self.prefix,
            events: self.events,
            channels,
            tiers,
            checks,
            skip_filter: self.skip_filter,
            transform: self.transform,
        })
    }
}
