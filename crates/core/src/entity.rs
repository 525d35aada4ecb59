use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier of the root configuration document every chain ends at.
pub const DEFAULT_DOCUMENT_ID: &str = "_default";

/// Two-part identifier for anything that can own configuration or receive
/// notifications, e.g. `("user", "42")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_type: String,
    pub entity_id: String,
}

impl EntityRef {
    /// Create a new entity reference.
    #[must_use]
    pub fn new(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
        }
    }

    /// Key of this entity's configuration document: `{type}_{id}`.
    ///
    /// The same key addresses the entity in the map returned by the host's
    /// entity lookup.
    #[must_use]
    pub fn document_id(&self) -> String {
        format!("{}_{}", self.entity_type, self.entity_id)
    }

    /// Both halves are non-empty.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        !self.entity_type.is_empty() && !self.entity_id.is_empty()
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.entity_id)
    }
}

/// Error returned when parsing an [`EntityRef`] from `type:id` text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected `<type>:<id>`, got {0:?}")]
pub struct ParseEntityRefError(String);

impl FromStr for EntityRef {
    type Err = ParseEntityRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((t, id)) if !t.is_empty() && !id.is_empty() => Ok(Self::new(t, id)),
            _ => Err(ParseEntityRefError(s.to_owned())),
        }
    }
}

impl<T: Into<String>, I: Into<String>> From<(T, I)> for EntityRef {
    fn from((entity_type, entity_id): (T, I)) -> Self {
        Self::new(entity_type, entity_id)
    }
}
