use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;

use courier_core::{ChannelKind, ChannelName, SharedClock, SystemClock};

use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::queue::{DeliveryQueue, Shared};
use crate::store::JobStore;
use crate::worker::Worker;

/// Builder for [`DeliveryQueue`].
///
/// ```
/// use std::sync::Arc;
/// use courier_core::ChannelKind;
/// use courier_queue::{DeliveryQueue, MemoryJobStore};
///
/// let queue = DeliveryQueue::builder()
///     .store(Arc::new(MemoryJobStore::new()))
///     .task("sms", ChannelKind::Sms)
///     .build()
///     .unwrap();
/// assert!(queue.has_task("sms"));
/// ```
#[derive(Default)]
pub struct DeliveryQueueBuilder {
    store: Option<Arc<dyn JobStore>>,
    tasks: Vec<(ChannelName, ChannelKind)>,
    workers: Vec<(ChannelName, Arc<dyn Worker>)>,
    config: QueueConfig,
    clock: Option<SharedClock>,
}

impl DeliveryQueueBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn store(mut self, store: Arc<dyn JobStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Register a task accepting transports of `kind`.
    #[must_use]
    pub fn task(mut self, name: impl Into<ChannelName>, kind: ChannelKind) -> Self {
        self.tasks.push((name.into(), kind));
        self
    }

    #[must_use]
    pub fn worker(mut self, task: impl Into<ChannelName>, worker: Arc<dyn Worker>) -> Self {
        self.workers.push((task.into(), worker));
        self
    }

    #[must_use]
    pub fn config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<DeliveryQueue, QueueError> {
        let store = self
            .store
            .ok_or_else(|| QueueError::Configuration("job store is required".into()))?;

        let mut tasks = HashMap::with_capacity(self.tasks.len());
        for (name, kind) in self.tasks {
            if tasks.contains_key(&name) {
                return Err(QueueError::DuplicateTask(name.to_string()));
            }
            tasks.insert(name, kind);
        }

        let mut workers = HashMap::with_capacity(self.workers.len());
        for (task, worker) in self.workers {
            if !tasks.contains_key(&task) {
                return Err(QueueError::UnknownTask(task.to_string()));
            }
            workers.insert(task, worker);
        }

        let (events, receiver) = mpsc::unbounded_channel();
        Ok(DeliveryQueue {
            shared: Arc::new(Shared {
                store,
                tasks,
                workers: RwLock::new(workers),
                config: self.config,
                clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
                events,
                receiver: Mutex::new(Some(receiver)),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryJobStore;
    use crate::worker::worker_fn;

    #[test]
    fn store_is_required() {
        let err = DeliveryQueueBuilder::new()
            .task("sms", ChannelKind::Sms)
            .build()
            .unwrap_err();
        assert!(matches!(err, QueueError::Configuration(msg) if msg.contains("job store")));
    }

    #[test]
    fn duplicate_task_rejected() {
        let err = DeliveryQueueBuilder::new()
            .store(Arc::new(MemoryJobStore::new()))
            .task("sms", ChannelKind::Sms)
            .task("sms", ChannelKind::Email)
            .build()
            .unwrap_err();
        assert!(matches!(err, QueueError::DuplicateTask(task) if task == "sms"));
    }

    #[test]
    fn worker_for_unknown_task_rejected() {
        let err = DeliveryQueueBuilder::new()
            .store(Arc::new(MemoryJobStore::new()))
            .task("sms", ChannelKind::Sms)
            .worker("email", worker_fn(|_job| async { Ok(()) }))
            .build()
            .unwrap_err();
        assert!(matches!(err, QueueError::UnknownTask(task) if task == "email"));
    }

    #[test]
    fn events_receiver_taken_once() {
        let queue = DeliveryQueueBuilder::new()
            .store(Arc::new(MemoryJobStore::new()))
            .task("sms", ChannelKind::Sms)
            .build()
            .unwrap();
        assert!(queue.take_events().is_some());
        assert!(queue.take_events().is_none());
    }
}
