//! Event dispatch: the glue between routing, the delivery queue and the
//! suppression ledger.

pub mod alert;
pub mod builder;
pub mod dispatcher;
pub mod error;
mod listener;
pub mod metrics;

pub use alert::{Alert, AlertSink, LogAlertSink};
pub use builder::DispatcherBuilder;
pub use dispatcher::{Dispatcher, JobTransform, SendReport};
pub use error::DispatchError;
pub use metrics::{DispatcherMetrics, MetricsSnapshot};
