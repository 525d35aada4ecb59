use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use courier_queue::DeliveryQueue;
use courier_router::RoutingEngine;

use crate::alert::{AlertSink, LogAlertSink};
use crate::dispatcher::{Dispatcher, JobTransform};
use crate::error::DispatchError;
use crate::listener::EventListener;
use crate::metrics::DispatcherMetrics;

/// Fluent builder for a [`Dispatcher`].
///
/// A [`RoutingEngine`] and a [`DeliveryQueue`] are required. Every router
/// channel must be a queue task accepting the same transport. Unless turned
/// off, the router defaults are written to the default configuration
/// document when it has nothing under the router prefix.
pub struct DispatcherBuilder {
    router: Option<RoutingEngine>,
    queue: Option<DeliveryQueue>,
    alerts: Arc<dyn AlertSink>,
    transform_job: Option<Arc<dyn JobTransform>>,
    install_defaults: bool,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            router: None,
            queue: None,
            alerts: Arc::new(LogAlertSink),
            transform_job: None,
            install_defaults: true,
        }
    }

    #[must_use]
    pub fn router(mut self, router: RoutingEngine) -> Self {
        self.router = Some(router);
        self
    }

    #[must_use]
    pub fn queue(mut self, queue: DeliveryQueue) -> Self {
        self.queue = Some(queue);
        self
    }

    #[must_use]
    pub fn alert_sink(mut self, alerts: Arc<dyn AlertSink>) -> Self {
        self.alerts = alerts;
        self
    }

    #[must_use]
    pub fn transform_job(mut self, transform: Arc<dyn JobTransform>) -> Self {
        self.transform_job = Some(transform);
        self
    }

    #[must_use]
    pub fn install_defaults(mut self, install: bool) -> Self {
        self.install_defaults = install;
        self
    }

    /// Validate, install defaults and start the event listener. Must be
    /// called inside a Tokio runtime.
    pub async fn build(self) -> Result<Dispatcher, DispatchError> {
        let router = self
            .router
            .ok_or_else(|| DispatchError::Configuration("routing engine is required".into()))?;
        let queue = self
            .queue
            .ok_or_else(|| DispatchError::Configuration("delivery queue is required".into()))?;

        let tasks = queue.tasks();
        for channel in router.channels() {
            match tasks.iter().find(|(name, _)| *name == channel.name) {
                None => {
                    return Err(DispatchError::Configuration(format!(
                        "router channel `{}` has no queue task",
                        channel.name
                    )));
                }
                Some((_, kind)) if *kind != channel.kind() => {
                    return Err(DispatchError::Configuration(format!(
                        "router channel `{}` produces {} transports but its task accepts {kind}",
                        channel.name,
                        channel.kind()
                    )));
                }
                Some(_) => {}
            }
        }

        // The receiver can only be taken once, so take it after the last
        // step that can fail.
        if self.install_defaults {
            router.install_defaults().await?;
        }

        let events = queue.take_events().ok_or_else(|| {
            DispatchError::Configuration("delivery events are already consumed elsewhere".into())
        })?;

        let metrics = Arc::new(DispatcherMetrics::default());
        let tracker = TaskTracker::new();
        let cancel = CancellationToken::new();
        EventListener {
            ledger: router.ledger().clone(),
            alerts: self.alerts,
            metrics: metrics.clone(),
        }
        .spawn(&tracker, events, cancel.clone());

        Ok(Dispatcher {
            router: Arc::new(router),
            queue,
            metrics,
            transform_job: self.transform_job,
            tracker,
            cancel,
        })
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
