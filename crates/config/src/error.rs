use thiserror::Error;

/// Errors from configuration resolution, registration and writes.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown entity type `{0}`; register it with add_entity_type first")]
    UnknownEntityType(String),

    #[error("schema violation at `{path}`: {reason}")]
    Schema { path: String, reason: String },

    #[error("`{path}` cannot be overridden for the {entity_type} entity type")]
    ForbiddenField { entity_type: String, path: String },

    #[error("bad inheritance chain: {0}")]
    InheritanceChain(String),

    #[error("write to `{document}` denied for {actor}")]
    WriteDenied { actor: String, document: String },

    #[error("document `{0}` already exists")]
    DocumentExists(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("document store error: {0}")]
    Store(String),
}
