use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use courier_core::EntityRef;

/// Where an entity's configuration falls back to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inherit {
    /// Straight to the root default document.
    Default,
    /// Another entity, which in turn resolves its own parent.
    Parent(EntityRef),
}

/// Caller-supplied context handed to every inherit function during a
/// resolution, for inheritance that depends on who is asking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolveContext {
    values: Map<String, Value>,
}

impl ResolveContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }
}

/// Who is performing a configuration write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    /// Server-side code; write predicates are not consulted.
    Trusted,
    /// An end user, checked against the entity type's write predicate.
    User(String),
}

impl Actor {
    pub fn user(id: impl Into<String>) -> Self {
        Self::User(id.into())
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trusted => f.write_str("trusted code"),
            Self::User(id) => write!(f, "user {id}"),
        }
    }
}

pub type InheritFn = Arc<dyn Fn(&str, &ResolveContext) -> Inherit + Send + Sync>;
pub type WriteFn = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;
pub type PublishFn = Arc<dyn Fn(&str) -> Vec<String> + Send + Sync>;

/// Registration record for a kind of entity that can own configuration.
#[derive(Clone)]
pub struct EntityType {
    name: String,
    inherit: InheritFn,
    write: WriteFn,
    publish: PublishFn,
    cannot_override: Vec<String>,
}

impl EntityType {
    /// A type that inherits straight from the default, is writable by anyone
    /// and publishes nothing.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inherit: Arc::new(|_, _| Inherit::Default),
            write: Arc::new(|_, _| true),
            publish: Arc::new(|_| Vec::new()),
            cannot_override: Vec::new(),
        }
    }

    /// The stock `user` type: inherits the default, each user may edit and
    /// sees only their own document.
    pub fn user() -> Self {
        Self::new("user")
            .write(|actor_id, entity_id| actor_id == entity_id)
            .publish(|actor_id| vec![actor_id.to_owned()])
    }

    /// Pick the parent for an entity id. Receives the resolution context.
    #[must_use]
    pub fn inherit<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &ResolveContext) -> Inherit + Send + Sync + 'static,
    {
        self.inherit = Arc::new(f);
        self
    }

    /// Gate user writes: `(actor_id, entity_id) -> allowed`.
    #[must_use]
    pub fn write<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &str) -> bool + Send + Sync + 'static,
    {
        self.write = Arc::new(f);
        self
    }

    /// Which entity ids of this type an actor may see.
    #[must_use]
    pub fn publish<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Vec<String> + Send + Sync + 'static,
    {
        self.publish = Arc::new(f);
        self
    }

    /// Field paths only an ancestor may set.
    #[must_use]
    pub fn cannot_override<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cannot_override = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn forbidden_fields(&self) -> &[String] {
        &self.cannot_override
    }

    pub(crate) fn parent_of(&self, entity_id: &str, ctx: &ResolveContext) -> Inherit {
        (self.inherit)(entity_id, ctx)
    }

    pub(crate) fn allows_write(&self, actor_id: &str, entity_id: &str) -> bool {
        (self.write)(actor_id, entity_id)
    }

    pub(crate) fn published_ids(&self, actor_id: &str) -> Vec<String> {
        (self.publish)(actor_id)
    }

    /// First write path that touches a forbidden field, if any.
    ///
    /// A path is forbidden when it equals a forbidden field or lies beneath one.
    pub(crate) fn forbidden_path<'a>(
        &self,
        mut paths: impl Iterator<Item = &'a str>,
    ) -> Option<&'a str> {
        paths.find(|path| {
            self.cannot_override.iter().any(|forbidden| {
                *path == forbidden.as_str()
                    || path
                        .strip_prefix(forbidden.as_str())
                        .is_some_and(|rest| rest.starts_with('.'))
            })
        })
    }
}

impl fmt::Debug for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityType")
            .field("name", &self.name)
            .field("cannot_override", &self.cannot_override)
            .finish_non_exhaustive()
    }
}
