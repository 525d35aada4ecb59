//! Declarative shape of configuration trees.
//!
//! Fields are addressed by dotted paths; `$` stands for "any element" of an
//! array, so `notifications.webhook.$.url` describes the `url` of every
//! webhook entry. Every field is optional: inheritance means any layer may
//! leave any field unset.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use courier_core::tree::set_path;

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    Object,
    Array,
    /// Anything goes; the subtree is not inspected.
    Blackbox,
}

impl FieldKind {
    fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
            Self::Blackbox => true,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Blackbox => "blackbox",
        };
        f.write_str(name)
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<Value>>,
}

impl From<FieldKind> for FieldSpec {
    fn from(kind: FieldKind) -> Self {
        Self {
            kind,
            allowed_values: None,
        }
    }
}

/// A set of field declarations keyed by dotted path.
///
/// An empty schema accepts everything. Parents of declared paths are implied
/// objects and need not be declared themselves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigSchema {
    fields: BTreeMap<String, FieldSpec>,
}

impl ConfigSchema {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field.
    #[must_use]
    pub fn field(mut self, path: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.insert(path.into(), kind.into());
        self
    }

    /// Declare a field restricted to a fixed set of values.
    #[must_use]
    pub fn field_with_values<V: Into<Value>>(
        mut self,
        path: impl Into<String>,
        kind: FieldKind,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.fields.insert(
            path.into(),
            FieldSpec {
                kind,
                allowed_values: Some(values.into_iter().map(Into::into).collect()),
            },
        );
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, spec: FieldSpec) {
        self.fields.insert(path.into(), spec);
    }

    pub fn get(&self, path: &str) -> Option<&FieldSpec> {
        self.fields.get(path)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Replace everything under `prefix` with `sub`, leaving other prefixes
    /// untouched.
    pub fn nest(&mut self, prefix: &str, sub: &ConfigSchema) {
        let nested = format!("{prefix}.");
        self.fields
            .retain(|path, _| path != prefix && !path.starts_with(&nested));
        self.fields
            .insert(prefix.to_owned(), FieldKind::Object.into());
        for (path, spec) in &sub.fields {
            self.fields.insert(format!("{prefix}.{path}"), spec.clone());
        }
    }

    /// Whether a write to `path` could be accepted: the path is declared, is an
    /// implied parent, or sits inside a blackbox.
    pub fn allows_path(&self, path: &str) -> bool {
        if self.is_empty() || self.fields.contains_key(path) || self.has_children(path) {
            return true;
        }
        let mut current = path;
        while let Some((parent, _)) = current.rsplit_once('.') {
            if self
                .fields
                .get(parent)
                .is_some_and(|spec| spec.kind == FieldKind::Blackbox)
            {
                return true;
            }
            current = parent;
        }
        false
    }

    /// Validate a whole configuration tree.
    pub fn validate(&self, tree: &Value) -> Result<(), ConfigError> {
        if self.is_empty() {
            return Ok(());
        }
        self.validate_object("", tree)
    }

    /// Validate a batch of dotted-path writes as if applied to an empty tree.
    pub fn validate_paths(&self, paths: &[(String, Value)]) -> Result<(), ConfigError> {
        if self.is_empty() {
            return Ok(());
        }
        let mut tree = Value::Object(serde_json::Map::new());
        for (path, value) in paths {
            set_path(&mut tree, path, value.clone());
        }
        self.validate_object("", &tree)
    }

    fn has_children(&self, path: &str) -> bool {
        let prefix = format!("{path}.");
        self.fields
            .range(prefix.clone()..)
            .next()
            .is_some_and(|(key, _)| key.starts_with(&prefix))
    }

    fn validate_object(&self, path: &str, value: &Value) -> Result<(), ConfigError> {
        let Value::Object(map) = value else {
            return Err(schema_error(
                path,
                format!("expected object, got {}", json_type(value)),
            ));
        };
        for (key, child) in map {
            let child_path = if path.is_empty() {
                key.clone()
            } else {
                format!("{path}.{key}")
            };
            self.validate_field(&child_path, child)?;
        }
        Ok(())
    }

    fn validate_field(&self, path: &str, value: &Value) -> Result<(), ConfigError> {
        if value.is_null() {
            return Ok(());
        }
        let Some(spec) = self.fields.get(path) else {
            if self.has_children(path) {
                return self.validate_object(path, value);
            }
            return Err(schema_error(path, "not allowed by schema"));
        };
        if !spec.kind.matches(value) {
            return Err(schema_error(
                path,
                format!("expected {}, got {}", spec.kind, json_type(value)),
            ));
        }
        if let Some(allowed) = &spec.allowed_values
            && !allowed.contains(value)
        {
            return Err(schema_error(path, format!("{value} is not an allowed value")));
        }
        match (spec.kind, value) {
            (FieldKind::Object, _) => self.validate_object(path, value),
            (FieldKind::Array, Value::Array(items)) => {
                let item_path = format!("{path}.$");
                if self.fields.contains_key(&item_path) || self.has_children(&item_path) {
                    for item in items {
                        self.validate_field(&item_path, item)?;
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

fn schema_error(path: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Schema {
        path: path.to_owned(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> ConfigSchema {
        ConfigSchema::new()
            .field("subject", FieldKind::String)
            .field("body", FieldKind::String)
            .field("limits.max", FieldKind::Number)
            .field("hooks", FieldKind::Array)
            .field("hooks.$.url", FieldKind::String)
            .field("extra", FieldKind::Blackbox)
            .field_with_values("when", FieldKind::String, ["day", "night"])
    }

    #[test]
    fn empty_schema_accepts_anything() {
        assert!(ConfigSchema::new().validate(&json!({"x": [1, {"y": 2}]})).is_ok());
    }

    #[test]
    fn accepts_partial_trees() {
        let s = schema();
        assert!(s.validate(&json!({})).is_ok());
        assert!(s.validate(&json!({"body": "B"})).is_ok());
        assert!(s.validate(&json!({"limits": {"max": 3}})).is_ok());
        assert!(s.validate(&json!({"hooks": [{"url": "a"}, {}]})).is_ok());
        assert!(s.validate(&json!({"extra": {"anything": [1, 2]}})).is_ok());
        assert!(s.validate(&json!({"subject": null})).is_ok());
    }

    #[test]
    fn rejects_unknown_fields_and_kinds() {
        let s = schema();
        let err = s.validate(&json!({"nope": 1})).unwrap_err();
        assert!(matches!(err, ConfigError::Schema { ref path, .. } if path == "nope"));
        let err = s.validate(&json!({"limits": {"max": "3"}})).unwrap_err();
        assert!(matches!(err, ConfigError::Schema { ref path, .. } if path == "limits.max"));
        let err = s.validate(&json!({"hooks": [{"url": 5}]})).unwrap_err();
        assert!(matches!(err, ConfigError::Schema { ref path, .. } if path == "hooks.$.url"));
        assert!(s.validate(&json!({"limits": 4})).is_err());
    }

    #[test]
    fn allowed_values() {
        let s = schema();
        assert!(s.validate(&json!({"when": "night"})).is_ok());
        assert!(s.validate(&json!({"when": "noon"})).is_err());
    }

    #[test]
    fn validate_paths_builds_a_tree() {
        let s = schema();
        assert!(
            s.validate_paths(&[("limits.max".into(), json!(1)), ("subject".into(), json!("S"))])
                .is_ok()
        );
        assert!(s.validate_paths(&[("limits.min".into(), json!(1))]).is_err());
    }

    #[test]
    fn nest_replaces_only_its_prefix() {
        let mut root = ConfigSchema::new().field("other.a", FieldKind::String);
        root.nest("notifications", &ConfigSchema::new().field("x", FieldKind::String));
        root.nest("notifications", &ConfigSchema::new().field("y", FieldKind::Number));
        assert!(root.get("other.a").is_some());
        assert!(root.get("notifications.x").is_none());
        assert!(root.get("notifications.y").is_some());
        assert!(root.validate(&json!({"notifications": {"y": 2}})).is_ok());
    }

    #[test]
    fn allows_path_inside_blackbox() {
        let s = schema();
        assert!(s.allows_path("extra.deep.key"));
        assert!(s.allows_path("limits"));
        assert!(s.allows_path("limits.max"));
        assert!(!s.allows_path("limits.min"));
    }
}
