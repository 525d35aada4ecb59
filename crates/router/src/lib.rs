//! Event routing: from a business event to the list of messages to send.
//!
//! The [`RoutingEngine`] resolves every recipient's configuration in bulk,
//! selects the channel entries configured for the event, gates them by
//! preference tier, drops suppressed channels and builds one [`Message`] per
//! surviving entry.
//!
//! [`Message`]: courier_core::Message

pub mod builder;
pub mod channel;
pub mod defaults;
pub mod engine;
pub mod error;
pub mod formatter;
pub mod hooks;
pub mod preference;

pub use builder::RoutingEngineBuilder;
pub use channel::NotificationChannel;
pub use defaults::{DEFAULT_PREFIX, router_defaults, router_schema};
pub use engine::{RouteReport, RoutingEngine};
pub use error::RouterError;
pub use formatter::{
    ChannelFormatter, EmailFormatter, FormatContext, PassthroughFormatter, PushFormatter,
    SmsFormatter, WebhookFormatter,
};
pub use hooks::{MessageTransform, RecipientDirectory, SkipFilter, StaticDirectory};
pub use preference::{AlwaysCheck, CheckContext, PreferenceCheck, TimeWindowCheck};
