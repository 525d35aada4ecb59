//! Background task turning delivery events into ledger records and alerts.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use courier_core::SuppressionRecord;
use courier_ledger::ErrorLedger;
use courier_queue::{DeliveryEvent, Suppression};

use crate::alert::{Alert, AlertSink};
use crate::metrics::DispatcherMetrics;

pub(crate) struct EventListener {
    pub(crate) ledger: Arc<dyn ErrorLedger>,
    pub(crate) alerts: Arc<dyn AlertSink>,
    pub(crate) metrics: Arc<DispatcherMetrics>,
}

impl EventListener {
    /// Consume `events` until cancelled, then drain what is already queued.
    pub(crate) fn spawn(
        self,
        tracker: &TaskTracker,
        mut events: mpsc::UnboundedReceiver<DeliveryEvent>,
        cancel: CancellationToken,
    ) {
        tracker.spawn(async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    event = events.recv() => match event {
                        Some(event) => self.handle(event).await,
                        None => break,
                    },
                }
            }
            while let Ok(event) = events.try_recv() {
                self.handle(event).await;
            }
            debug!("delivery event listener stopped");
        });
    }

    pub(crate) async fn handle(&self, event: DeliveryEvent) {
        match event {
            DeliveryEvent::Suppressed(suppression) => self.suppress(suppression).await,
            DeliveryEvent::Catastrophic {
                job_id,
                channel,
                error,
            } => {
                self.metrics.increment_alerts();
                self.alerts
                    .alert(&Alert {
                        job_id,
                        channel,
                        error,
                    })
                    .await;
            }
        }
    }

    async fn suppress(&self, suppression: Suppression) {
        let Some(entity) = suppression.recipient else {
            warn!(
                job_id = %suppression.job_id,
                channel = %suppression.channel,
                "cannot suppress a channel for a message without a recipient"
            );
            return;
        };
        let record = SuppressionRecord::new(
            entity,
            suppression.channel,
            suppression.reason,
            suppression.resolution,
        );
        let new_id = record.id.clone();
        match self.ledger.record(record).await {
            Ok(stored) if stored.id == new_id => {
                self.metrics.increment_suppressions_recorded();
                info!(
                    entity = %stored.entity,
                    channel = %stored.channel,
                    reason = %stored.reason,
                    level = %suppression.level,
                    "channel suppressed for recipient"
                );
            }
            Ok(stored) => {
                debug!(record = %stored.id, "suppression already recorded");
            }
            Err(err) => {
                warn!(job_id = %suppression.job_id, error = %err, "failed to record suppression");
            }
        }
    }
}
