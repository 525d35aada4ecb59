pub mod builder;
pub mod cache;
pub mod config_store;
pub mod document;
pub mod entity_type;
pub mod error;
pub mod memory;
pub mod schema;
pub mod store;
pub mod testing;

pub use builder::ConfigStoreBuilder;
pub use cache::DocumentCache;
pub use config_store::{ConfigStore, MAX_CHAIN_DEPTH};
pub use document::{ConfigDocument, ResolvedConfig};
pub use entity_type::{Actor, EntityType, Inherit, ResolveContext};
pub use error::ConfigError;
pub use memory::MemoryDocumentStore;
pub use schema::{ConfigSchema, FieldKind, FieldSpec};
pub use store::DocumentStore;
