//! Helpers for the nested JSON trees configuration documents are made of.

use serde_json::{Map, Value};

/// Merge `overlay` into `base` in place.
///
/// Objects merge key by key, recursively. Arrays and scalars in the overlay
/// replace whatever `base` held at that key. A `null` in the overlay counts as
/// "not set" and leaves the base value alone.
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (_, Value::Null) => {}
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                if value.is_null() {
                    continue;
                }
                match base_map.get_mut(key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        deep_merge(existing, value);
                    }
                    _ => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

/// Merge a sequence of layers, most general first, into a fresh object.
#[must_use]
pub fn merge_layers<'a>(layers: impl IntoIterator<Item = &'a Value>) -> Value {
    let mut merged = Value::Object(Map::new());
    for layer in layers {
        deep_merge(&mut merged, layer);
    }
    merged
}

/// Flatten a tree into `(dotted.path, leaf)` pairs.
///
/// Arrays are leaves: they are emitted whole at their path so a set-path
/// update replaces them instead of merging element by element. Empty objects
/// are kept as leaves so their keys still get created.
#[must_use]
pub fn flatten_paths(value: &Value) -> Vec<(String, Value)> {
    let mut out = Vec::new();
    flatten_into(value, String::new(), &mut out);
    out
}

fn flatten_into(value: &Value, prefix: String, out: &mut Vec<(String, Value)>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_into(child, path, out);
            }
        }
        _ if prefix.is_empty() => {}
        leaf => out.push((prefix, leaf.clone())),
    }
}

/// Look up a dotted path.
#[must_use]
pub fn get_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(root);
    }
    path.split('.')
        .try_fold(root, |node, segment| node.as_object()?.get(segment))
}

/// Write `value` at a dotted path, creating intermediate objects as needed.
///
/// Any non-object found along the way is replaced by an object.
pub fn set_path(root: &mut Value, path: &str, value: Value) {
    let mut node = root;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Value::Object(map) = node else {
            return;
        };
        if segments.peek().is_none() {
            map.insert(segment.to_owned(), value);
            return;
        }
        node = map
            .entry(segment.to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn overlay_wins_per_leaf() {
        let mut base = json!({"subject": "S", "body": "B", "nested": {"a": 1, "b": 2}});
        deep_merge(&mut base, &json!({"body": "B2", "nested": {"b": 3}}));
        assert_eq!(
            base,
            json!({"subject": "S", "body": "B2", "nested": {"a": 1, "b": 3}})
        );
    }

    #[test]
    fn arrays_replace_instead_of_concatenating() {
        let mut base = json!({"webhook": [{"url": "a"}, {"url": "b"}]});
        deep_merge(&mut base, &json!({"webhook": [{"url": "c"}]}));
        assert_eq!(base, json!({"webhook": [{"url": "c"}]}));
    }

    #[test]
    fn null_overlay_is_unset() {
        let mut base = json!({"subject": "S"});
        deep_merge(&mut base, &json!({"subject": null}));
        assert_eq!(base, json!({"subject": "S"}));
        deep_merge(&mut base, &Value::Null);
        assert_eq!(base, json!({"subject": "S"}));
    }

    #[test]
    fn merge_layers_root_to_leaf() {
        let default = json!({"subject": "S", "body": "B"});
        let root = json!({"body": "B2"});
        let child = json!({});
        assert_eq!(
            merge_layers([&default, &root, &child]),
            json!({"subject": "S", "body": "B2"})
        );
    }

    #[test]
    fn flatten_keeps_arrays_whole() {
        let mut paths = flatten_paths(&json!({
            "sms": {"events": {"e1": {"when": "night"}}},
            "webhook": [{"url": "x"}],
            "empty": {}
        }));
        paths.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            paths,
            vec![
                ("empty".to_owned(), json!({})),
                ("sms.events.e1.when".to_owned(), json!("night")),
                ("webhook".to_owned(), json!([{"url": "x"}])),
            ]
        );
    }

    #[test]
    fn set_and_get_path() {
        let mut root = json!({"a": 5});
        set_path(&mut root, "a.b.c", json!(true));
        set_path(&mut root, "x", json!("y"));
        assert_eq!(get_path(&root, "a.b.c"), Some(&json!(true)));
        assert_eq!(get_path(&root, "x"), Some(&json!("y")));
        assert_eq!(get_path(&root, "a.missing"), None);
        assert_eq!(get_path(&root, ""), Some(&root));
    }
}
