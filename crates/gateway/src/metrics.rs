use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Atomic counters tracking dispatch outcomes.
///
/// All counters use relaxed ordering. For a consistent point-in-time view,
/// call [`snapshot`](Self::snapshot).
#[derive(Debug, Default)]
pub struct DispatcherMetrics {
    /// Events passed to `send`.
    pub events: AtomicU64,
    /// Jobs stored in the delivery queue.
    pub enqueued: AtomicU64,
    /// Messages the queue refused.
    pub enqueue_failed: AtomicU64,
    /// Candidates whose message could not be built.
    pub dropped: AtomicU64,
    /// Candidates left out by a suppression or the skip filter.
    pub skipped: AtomicU64,
    /// Candidates held back by their preference tier.
    pub gated: AtomicU64,
    /// New suppression records written to the ledger.
    pub suppressions_recorded: AtomicU64,
    /// Catastrophic failures forwarded to the alert sink.
    pub alerts: AtomicU64,
}

impl DispatcherMetrics {
    pub fn increment_events(&self) {
        self.events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_enqueue_failed(&self) {
        self.enqueue_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Add the candidate counts of one routed event.
    pub fn add_routing(&self, dropped: usize, skipped: usize, gated: usize) {
        let as_u64 = |n: usize| u64::try_from(n).unwrap_or(u64::MAX);
        self.dropped.fetch_add(as_u64(dropped), Ordering::Relaxed);
        self.skipped.fetch_add(as_u64(skipped), Ordering::Relaxed);
        self.gated.fetch_add(as_u64(gated), Ordering::Relaxed);
    }

    pub fn increment_suppressions_recorded(&self) {
        self.suppressions_recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_alerts(&self) {
        self.alerts.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events: self.events.load(Ordering::Relaxed),
            enqueued: self.enqueued.load(Ordering::Relaxed),
            enqueue_failed: self.enqueue_failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            gated: self.gated.load(Ordering::Relaxed),
            suppressions_recorded: self.suppressions_recorded.load(Ordering::Relaxed),
            alerts: self.alerts.load(Ordering::Relaxed),
        }
    }
}

/// A plain data snapshot of [`DispatcherMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub events: u64,
    pub enqueued: u64,
    pub enqueue_failed: u64,
    pub dropped: u64,
    pub skipped: u64,
    pub gated: u64,
    pub suppressions_recorded: u64,
    pub alerts: u64,
}
