pub mod clock;
pub mod entity;
pub mod message;
pub mod response;
pub mod suppression;
pub mod tree;
pub mod types;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use entity::{DEFAULT_DOCUMENT_ID, EntityRef, ParseEntityRefError};
pub use message::{ChannelKind, HttpMethod, InvalidTransport, Message, TransportConfig};
pub use response::{DeliveryResponse, ErrorLevel};
pub use suppression::{SuppressionRecord, SuppressionStatus};
pub use types::{ChannelName, JobId};
