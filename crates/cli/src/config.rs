use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use courier_config::ConfigDocument;
use courier_core::EntityRef;
use courier_queue::{QueueConfig, RetryStrategy};
use courier_router::{AlwaysCheck, DEFAULT_PREFIX, PreferenceCheck, TimeWindowCheck};

/// Top-level CLI configuration, loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct CourierConfig {
    #[serde(default)]
    pub queue: QueueSection,
    #[serde(default)]
    pub router: RouterSection,
    /// Data loaded into the in-memory stores before a command runs.
    #[serde(default)]
    pub seed: SeedSection,
}

impl CourierConfig {
    /// Read `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(toml::from_str("")?);
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config at {}", path.display()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct QueueSection {
    pub retry_limit: u32,
    pub max_concurrent: usize,
    pub poll_interval_ms: u64,
    /// First retry delay; doubles per attempt up to `backoff_max_ms`.
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for QueueSection {
    fn default() -> Self {
        Self {
            retry_limit: 10,
            max_concurrent: 10,
            poll_interval_ms: 500,
            backoff_base_ms: 1_000,
            backoff_max_ms: 300_000,
        }
    }
}

impl QueueSection {
    pub fn to_queue_config(&self) -> anyhow::Result<QueueConfig> {
        if self.max_concurrent == 0 {
            bail!("queue.max_concurrent must be at least 1");
        }
        Ok(QueueConfig {
            retry_limit: self.retry_limit,
            retry_strategy: RetryStrategy::exponential_ms(
                self.backoff_base_ms,
                self.backoff_max_ms.max(self.backoff_base_ms),
            ),
            max_concurrent: self.max_concurrent,
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RouterSection {
    /// Key under which channel settings live in every config document.
    pub prefix: String,
    /// Events the router accepts. Empty accepts any event.
    pub events: Vec<String>,
    pub preferences: Vec<PreferenceSection>,
}

impl Default for RouterSection {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_owned(),
            events: Vec::new(),
            preferences: vec![PreferenceSection {
                name: "always".to_owned(),
                kind: PreferenceKind::Always,
                start_hour: None,
                end_hour: None,
                timezone: None,
                timezone_field: None,
            }],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreferenceKind {
    Always,
    Window,
}

/// One `when` tier and the check that gates it.
#[derive(Debug, Deserialize)]
pub struct PreferenceSection {
    pub name: String,
    pub kind: PreferenceKind,
    /// First local hour of a window, 0-23.
    pub start_hour: Option<u32>,
    /// Hour the window ends before, 0-24. Equal to `start_hour` for all day.
    pub end_hour: Option<u32>,
    /// IANA zone used when the recipient has none. UTC if unset.
    pub timezone: Option<String>,
    /// Recipient or config field holding the recipient's zone.
    pub timezone_field: Option<String>,
}

impl PreferenceSection {
    pub fn build(&self) -> anyhow::Result<Arc<dyn PreferenceCheck>> {
        match self.kind {
            PreferenceKind::Always => Ok(Arc::new(AlwaysCheck)),
            PreferenceKind::Window => {
                let (Some(start), Some(end)) = (self.start_hour, self.end_hour) else {
                    bail!(
                        "preference `{}`: a window needs start_hour and end_hour",
                        self.name
                    );
                };
                if start > 23 || end > 24 {
                    bail!(
                        "preference `{}`: start_hour must be 0-23 and end_hour 0-24",
                        self.name
                    );
                }
                let mut check = TimeWindowCheck::new(start, end);
                if let Some(tz) = &self.timezone {
                    let tz: Tz = tz.parse().map_err(|e| {
                        anyhow::anyhow!("preference `{}`: invalid timezone `{tz}`: {e}", self.name)
                    })?;
                    check = check.default_tz(tz);
                }
                if let Some(field) = &self.timezone_field {
                    check = check.timezone_field(field.clone());
                }
                Ok(Arc::new(check))
            }
        }
    }
}

/// JSON files to load at startup.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SeedSection {
    /// Array of config documents.
    pub documents: Option<PathBuf>,
    /// Object of recipient records keyed by `type:id`.
    pub entities: Option<PathBuf>,
}

impl SeedSection {
    pub fn load_documents(&self) -> anyhow::Result<Vec<ConfigDocument>> {
        let Some(path) = &self.documents else {
            return Ok(Vec::new());
        };
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read documents at {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse documents at {}", path.display()))
    }

    pub fn load_entities(&self) -> anyhow::Result<Vec<(EntityRef, Value)>> {
        let Some(path) = &self.entities else {
            return Ok(Vec::new());
        };
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read entities at {}", path.display()))?;
        parse_entities(&contents)
            .with_context(|| format!("failed to parse entities at {}", path.display()))
    }
}

fn parse_entities(contents: &str) -> anyhow::Result<Vec<(EntityRef, Value)>> {
    let records: HashMap<String, Value> = serde_json::from_str(contents)?;
    records
        .into_iter()
        .map(|(key, record)| Ok((key.parse::<EntityRef>()?, record)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_empty_file() {
        let config: CourierConfig = toml::from_str("").unwrap();
        assert_eq!(config.queue.retry_limit, 10);
        assert_eq!(config.router.prefix, "notifications");
        assert!(config.router.events.is_empty());
        assert_eq!(config.router.preferences.len(), 1);
        assert_eq!(config.router.preferences[0].name, "always");
        assert!(config.seed.documents.is_none());
    }

    #[test]
    fn missing_file_uses_defaults() {
        let config = CourierConfig::load(Path::new("/nonexistent/courier.toml")).unwrap();
        assert_eq!(config.queue.max_concurrent, 10);
    }

    #[test]
    fn custom_config() {
        let toml = r#"
            [queue]
            retry_limit = 3
            max_concurrent = 2
            backoff_base_ms = 500
            backoff_max_ms = 4000

            [router]
            prefix = "notify"
            events = ["e1", "e2"]

            [[router.preferences]]
            name = "always"
            kind = "always"

            [[router.preferences]]
            name = "day"
            kind = "window"
            start_hour = 8
            end_hour = 20
            timezone = "America/New_York"

            [seed]
            documents = "docs.json"
        "#;
        let config: CourierConfig = toml::from_str(toml).unwrap();
        let queue = config.queue.to_queue_config().unwrap();
        assert_eq!(queue.retry_limit, 3);
        assert_eq!(queue.max_concurrent, 2);
        assert_eq!(queue.poll_interval, Duration::from_millis(500));
        assert_eq!(queue.retry_strategy, RetryStrategy::exponential_ms(500, 4000));
        assert_eq!(config.router.prefix, "notify");
        assert_eq!(config.router.events, vec!["e1", "e2"]);
        assert_eq!(config.router.preferences[1].kind, PreferenceKind::Window);
        assert!(config.router.preferences[1].build().is_ok());
        assert_eq!(config.seed.documents, Some(PathBuf::from("docs.json")));
    }

    #[test]
    fn rejects_bad_preferences() {
        let bad_tz = PreferenceSection {
            name: "night".into(),
            kind: PreferenceKind::Window,
            start_hour: Some(20),
            end_hour: Some(8),
            timezone: Some("Mars/Olympus".into()),
            timezone_field: None,
        };
        assert!(bad_tz.build().is_err());

        let bad_hour = PreferenceSection {
            timezone: None,
            end_hour: Some(25),
            ..bad_tz
        };
        assert!(bad_hour.build().is_err());

        let no_hours = PreferenceSection {
            start_hour: None,
            end_hour: None,
            ..bad_hour
        };
        let err = no_hours.build().err().unwrap();
        assert!(err.to_string().contains("needs start_hour and end_hour"));
    }

    #[test]
    fn full_day_window_builds() {
        let section = PreferenceSection {
            name: "anytime".into(),
            kind: PreferenceKind::Window,
            start_hour: Some(0),
            end_hour: Some(24),
            timezone: None,
            timezone_field: None,
        };
        assert!(section.build().is_ok());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let section = QueueSection {
            max_concurrent: 0,
            ..QueueSection::default()
        };
        assert!(section.to_queue_config().is_err());
    }

    #[test]
    fn entities_keyed_by_type_and_id() {
        let entities =
            parse_entities(r#"{"user:42": {"email": "a@example.com"}}"#).unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].0, EntityRef::new("user", "42"));
        assert!(parse_entities(r#"{"nocolon": {}}"#).is_err());
    }
}
