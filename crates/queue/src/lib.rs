//! Delivery jobs for outbound notifications.
//!
//! A [`DeliveryQueue`] validates messages against registered tasks and stores
//! one [`Job`] per message. A [`WorkerPool`] claims due jobs and hands each to
//! the [`Worker`] bound to its task. Workers and provider status callbacks
//! finish jobs through a [`JobHandle`]; fatal failures surface as
//! [`DeliveryEvent`]s for the suppression ledger.

pub mod builder;
pub mod config;
pub mod error;
pub mod event;
pub mod handle;
pub mod job;
pub mod memory;
pub mod queue;
pub mod retry;
pub mod store;
pub mod testing;
pub mod worker;

pub use builder::DeliveryQueueBuilder;
pub use config::QueueConfig;
pub use error::{DeliveryError, QueueError};
pub use event::{DeliveryEvent, ResponseOutcome, Suppression};
pub use handle::JobHandle;
pub use job::{ExternalLink, Job, JobLogEntry, JobStatus, JobTransition};
pub use memory::MemoryJobStore;
pub use queue::DeliveryQueue;
pub use retry::RetryStrategy;
pub use store::JobStore;
pub use worker::{FnWorker, Worker, WorkerPool, worker_fn};
