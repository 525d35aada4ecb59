use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use courier_config::{Actor, ConfigSchema, ConfigStore, ResolveContext, ResolvedConfig};
use courier_core::tree::deep_merge;
use courier_core::{ChannelName, EntityRef, Message};
use courier_ledger::ErrorLedger;

use crate::builder::RoutingEngineBuilder;
use crate::channel::NotificationChannel;
use crate::defaults::{router_defaults, router_schema};
use crate::error::RouterError;
use crate::formatter::FormatContext;
use crate::hooks::{MessageTransform, RecipientDirectory, SkipFilter};
use crate::preference::{CheckContext, PreferenceCheck};

/// Result of routing one event.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RouteReport {
    /// Messages to enqueue, in recipient order.
    pub messages: Vec<Message>,
    pub recipients: usize,
    /// Candidates left out by the skip filter or an unresolved suppression.
    pub skipped: usize,
    /// Candidates whose tier check said no.
    pub gated: usize,
    /// Candidates whose message could not be built.
    pub dropped: usize,
}

/// One channel entry configured for the event being routed.
struct Candidate<'a> {
    channel: &'a NotificationChannel,
    /// Position in a multi channel's list.
    index: Option<usize>,
    entry: &'a Value,
    event_conf: &'a Value,
}

/// Everything known about one recipient while routing.
struct RecipientView<'a> {
    entity: &'a EntityRef,
    record: Option<&'a Value>,
    resolved: &'a ResolvedConfig,
}

/// Decides which messages an event produces.
///
/// For every recipient the engine reads the channel entries under its
/// configuration prefix, keeps those configured for the event, groups them by
/// their `when` tier and asks each tier's [`PreferenceCheck`] whether the
/// group goes out. Channels named by the skip filter or suppressed in the
/// [`ErrorLedger`] are left out.
pub struct RoutingEngine {
    pub(crate) config: Arc<ConfigStore>,
    pub(crate) ledger: Arc<dyn ErrorLedger>,
    pub(crate) directory: Arc<dyn RecipientDirectory>,
    pub(crate) prefix: String,
    pub(crate) events: Vec<String>,
    pub(crate) channels: Vec<NotificationChannel>,
    pub(crate) tiers: Vec<String>,
    pub(crate) checks: HashMap<String, Arc<dyn PreferenceCheck>>,
    pub(crate) skip_filter: Option<Arc<dyn SkipFilter>>,
    pub(crate) transform: Option<Arc<dyn MessageTransform>>,
}

impl RoutingEngine {
    pub fn builder() -> RoutingEngineBuilder {
        RoutingEngineBuilder::new()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn events(&self) -> &[String] {
        &self.events
    }

    pub fn channels(&self) -> &[NotificationChannel] {
        &self.channels
    }

    pub fn channel(&self, name: &str) -> Option<&NotificationChannel> {
        self.channels.iter().find(|c| c.name.as_str() == name)
    }

    /// Registered tier names, in registration order.
    pub fn tiers(&self) -> &[String] {
        &self.tiers
    }

    pub fn config_store(&self) -> &Arc<ConfigStore> {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<dyn ErrorLedger> {
        &self.ledger
    }

    /// Schema of the router's subtree, relative to the prefix.
    pub fn schema(&self) -> ConfigSchema {
        router_schema(&self.channels, &self.events, &self.tiers)
    }

    pub fn defaults(&self) -> Value {
        router_defaults(&self.channels, &self.events)
    }

    /// Write the router defaults into the default document unless something
    /// is already there under the prefix. Returns whether it wrote.
    pub async fn install_defaults(&self) -> Result<bool, RouterError> {
        if self.config.has_default_for_prefix(&self.prefix).await? {
            return Ok(false);
        }
        self.config
            .set_default_for_prefix(&Actor::Trusted, &self.prefix, self.defaults())
            .await?;
        info!(prefix = %self.prefix, "installed router defaults");
        Ok(true)
    }

    /// Work out the messages `event` produces.
    ///
    /// Fails only for misconfiguration or a failing hook or store; a message
    /// that cannot be built is logged and counted in [`RouteReport::dropped`].
    #[instrument(skip_all, fields(event = %event))]
    pub async fn route(&self, event: &str, data: &Value) -> Result<RouteReport, RouterError> {
        if !self.events.is_empty() && !self.events.iter().any(|e| e == event) {
            return Err(RouterError::UnknownEvent(event.to_owned()));
        }

        let recipients = self.directory.recipients(event, data).await?;
        let mut report = RouteReport {
            recipients: recipients.len(),
            ..RouteReport::default()
        };
        if recipients.is_empty() {
            debug!("no recipients");
            return Ok(report);
        }

        let ctx = ResolveContext::new().with("event", event);
        let resolved = self.config.resolve_bulk(&recipients, &ctx).await?;
        let records = self.directory.entities(&recipients).await?;
        let suppressed = self.ledger.unresolved_channels_many(&recipients).await?;
        let template_data = self.directory.template_data(event, data).await?;
        let none = HashSet::new();

        for (entity, resolved) in recipients.iter().zip(&resolved) {
            let record = records.get(&entity.document_id());
            if record.is_none() {
                warn!(entity = %entity, "recipient record not found, routing without it");
            }
            let view = RecipientView {
                entity,
                record,
                resolved,
            };
            let mut skip: HashSet<ChannelName> =
                suppressed.get(entity).unwrap_or(&none).clone();
            if let Some(filter) = &self.skip_filter {
                skip.extend(filter.skip(entity, record, resolved, event));
            }
            let messages =
                self.messages_for(&view, event, data, &template_data, &skip, &mut report)?;
            report.messages.extend(messages);
        }

        info!(
            recipients = report.recipients,
            messages = report.messages.len(),
            skipped = report.skipped,
            gated = report.gated,
            dropped = report.dropped,
            "routed event"
        );
        Ok(report)
    }

    fn messages_for(
        &self,
        view: &RecipientView<'_>,
        event: &str,
        data: &Value,
        template_data: &Map<String, Value>,
        skip: &HashSet<ChannelName>,
        report: &mut RouteReport,
    ) -> Result<Vec<Message>, RouterError> {
        let mut messages = Vec::new();
        for (tier, candidates) in self.candidates(view, event) {
            let check = self
                .checks
                .get(tier)
                .ok_or_else(|| RouterError::MissingPreferenceCheck(tier.to_owned()))?;
            let passed = check.check(&CheckContext {
                entity: view.entity,
                recipient: view.record,
                config: view.resolved,
                event,
            });
            if !passed {
                debug!(entity = %view.entity, tier, candidates = candidates.len(), "tier check failed");
                report.gated += candidates.len();
                continue;
            }

            for candidate in candidates {
                let channel = &candidate.channel.name;
                if skip.contains(channel) {
                    debug!(entity = %view.entity, %channel, "channel skipped for recipient");
                    report.skipped += 1;
                    continue;
                }
                match self.materialize(view, &candidate, event, data, template_data) {
                    Ok(message) => messages.push(message),
                    Err(err) => {
                        warn!(
                            entity = %view.entity,
                            %channel,
                            index = ?candidate.index,
                            error = %err,
                            "dropping message"
                        );
                        report.dropped += 1;
                    }
                }
            }
        }
        Ok(messages)
    }

    /// Channel entries configured for `event`, grouped by tier in order of
    /// first appearance; within a tier, channel declaration order.
    fn candidates<'a>(
        &'a self,
        view: &RecipientView<'a>,
        event: &str,
    ) -> Vec<(&'a str, Vec<Candidate<'a>>)> {
        let mut tiers: Vec<(&'a str, Vec<Candidate<'a>>)> = Vec::new();
        let Some(section) = view.resolved.get(&self.prefix) else {
            return tiers;
        };

        for channel in &self.channels {
            let entries: Vec<(Option<usize>, &'a Value)> = match section.get(channel.name.as_str()) {
                Some(Value::Array(list)) => list.iter().enumerate().map(|(i, e)| (Some(i), e)).collect(),
                Some(entry @ Value::Object(_)) => vec![(None, entry)],
                _ => continue,
            };
            for (index, entry) in entries {
                let Some(event_conf) = entry.get("events").and_then(|events| events.get(event)) else {
                    continue;
                };
                let Some(tier) = event_conf.get("when").and_then(Value::as_str) else {
                    continue;
                };
                let candidate = Candidate {
                    channel,
                    index,
                    entry,
                    event_conf,
                };
                match tiers.iter_mut().find(|(name, _)| *name == tier) {
                    Some((_, group)) => group.push(candidate),
                    None => tiers.push((tier, vec![candidate])),
                }
            }
        }
        tiers
    }

    fn materialize(
        &self,
        view: &RecipientView<'_>,
        candidate: &Candidate<'_>,
        event: &str,
        data: &Value,
        global: &Map<String, Value>,
    ) -> Result<Message, RouterError> {
        let event_conf = candidate.event_conf;
        let template = |name: &str| {
            event_conf
                .get("templates")
                .and_then(|t| t.get(name))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned()
        };
        let timing = |name: &str| {
            event_conf
                .get("timing")
                .and_then(|t| t.get(name))
                .and_then(Value::as_u64)
                .unwrap_or(0)
        };

        let mut merged = candidate
            .entry
            .get("config")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        if let Some(overlay) = event_conf.get("config") {
            deep_merge(&mut merged, overlay);
        }

        let mut template_data = global.clone();
        if let Some(Value::Object(specific)) = event_conf.get("template_data") {
            template_data.extend(specific.clone());
        }

        let channel = candidate.channel;
        let transport = channel.formatter.transport(&FormatContext {
            channel: channel.name.as_str(),
            entity: view.entity,
            recipient: view.record,
            config: &merged,
            event,
            data,
            template_data: &template_data,
        })?;

        let message = Message {
            channel: channel.name.clone(),
            subject_template: template("subject"),
            body_template: template("body"),
            transport,
            delay_ms: timing("delay"),
            timeout_ms: timing("timeout"),
            template_data,
            recipient: Some(view.entity.clone()),
        };
        Ok(match &self.transform {
            Some(transform) => transform.transform(message, event, data),
            None => message,
        })
    }
}

impl std::fmt::Debug for RoutingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingEngine")
            .field("prefix", &self.prefix)
            .field("events", &self.events)
            .field("channels", &self.channels)
            .field("tiers", &self.tiers)
            .finish_non_exhaustive()
    }
}
