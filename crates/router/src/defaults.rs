//! Schema and default configuration the router installs under its prefix.

use serde_json::{Map, Value, json};

use courier_config::{ConfigSchema, FieldKind};

use crate::channel::NotificationChannel;

/// Default configuration prefix.
pub const DEFAULT_PREFIX: &str = "notifications";

/// Shape of the router's subtree, relative to the prefix.
///
/// Per channel (`<channel>.$` for multi channels) and per event:
/// `events.<event>.when` restricted to the tier names, `timing.delay` and
/// `timing.timeout` in milliseconds, `templates.subject` and `templates.body`,
/// plus blackbox `config` and `template_data`. Each channel also carries a
/// blackbox `config` shared by all its events.
pub fn router_schema(
    channels: &[NotificationChannel],
    events: &[String],
    tiers: &[String],
) -> ConfigSchema {
    let mut schema = ConfigSchema::new();
    for channel in channels {
        let base = if channel.multi {
            schema = schema
                .field(channel.name.as_str(), FieldKind::Array)
                .field(format!("{}.$", channel.name), FieldKind::Object);
            format!("{}.$", channel.name)
        } else {
            schema = schema.field(channel.name.as_str(), FieldKind::Object);
            channel.name.to_string()
        };
        schema = schema
            .field(format!("{base}.events"), FieldKind::Object)
            .field(format!("{base}.config"), FieldKind::Blackbox);
        for event in events {
            let evt = format!("{base}.events.{event}");
            schema = schema
                .field(evt.clone(), FieldKind::Object)
                .field_with_values(format!("{evt}.when"), FieldKind::String, tiers.iter().map(String::as_str))
                .field(format!("{evt}.timing"), FieldKind::Object)
                .field(format!("{evt}.timing.delay"), FieldKind::Number)
                .field(format!("{evt}.timing.timeout"), FieldKind::Number)
                .field(format!("{evt}.templates"), FieldKind::Object)
                .field(format!("{evt}.templates.subject"), FieldKind::String)
                .field(format!("{evt}.templates.body"), FieldKind::String)
                .field(format!("{evt}.config"), FieldKind::Blackbox)
                .field(format!("{evt}.template_data"), FieldKind::Blackbox);
        }
    }
    schema
}

/// Default subtree: multi channels start as empty lists; single channels get
/// zero timing and empty templates for every event, with no `when`, so
/// nothing is sent until a tier is chosen.
pub fn router_defaults(channels: &[NotificationChannel], events: &[String]) -> Value {
    let mut out = Map::new();
    for channel in channels {
        let value = if channel.multi {
            json!([])
        } else {
            let events: Map<String, Value> = events
                .iter()
                .map(|event| {
                    (
                        event.clone(),
                        json!({
                            "timing": {"delay": 0, "timeout": 0},
                            "templates": {"subject": "", "body": ""}
                        }),
                    )
                })
                .collect();
            json!({ "events": events })
        };
        out.insert(channel.name.to_string(), value);
    }
    Value::Object(out)
}
