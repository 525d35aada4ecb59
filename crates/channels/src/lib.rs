//! Provider-specific pieces of Courier's delivery channels.
//!
//! Each provider module translates what its API reports into a
//! [`DeliveryResponse`](courier_core::DeliveryResponse), which a
//! [`JobHandle`](courier_queue::JobHandle) turns into a job transition.
//! Network clients are left to the embedding application.

pub mod error;
pub mod log_worker;
pub mod mandrill;
pub mod twilio;
pub mod webhook;

pub use error::ChannelError;
pub use log_worker::LogWorker;
pub use twilio::StatusCallback;
