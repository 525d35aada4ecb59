//! Seams where the host application plugs its own knowledge into routing.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Map, Value};

use courier_config::ResolvedConfig;
use courier_core::{ChannelName, EntityRef, Message};

use crate::error::RouterError;

/// Who an event concerns and what the router needs to know about them.
#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    /// Everyone who might be notified of `event`, in the order messages
    /// should be produced.
    async fn recipients(&self, event: &str, data: &Value) -> Result<Vec<EntityRef>, RouterError>;

    /// Records for `entities`, keyed by [`EntityRef::document_id`]. Missing
    /// keys are tolerated.
    async fn entities(
        &self,
        entities: &[EntityRef],
    ) -> Result<HashMap<String, Value>, RouterError>;

    /// Data made available to every message's templates.
    async fn template_data(
        &self,
        event: &str,
        data: &Value,
    ) -> Result<Map<String, Value>, RouterError>;
}

/// Channels to leave out for a recipient, on top of suppressed ones.
pub trait SkipFilter: Send + Sync {
    fn skip(
        &self,
        entity: &EntityRef,
        recipient: Option<&Value>,
        config: &ResolvedConfig,
        event: &str,
    ) -> Vec<ChannelName>;
}

impl<F> SkipFilter for F
where
    F: Fn(&EntityRef, Option<&Value>, &ResolvedConfig, &str) -> Vec<ChannelName> + Send + Sync,
{
    fn skip(
        &self,
        entity: &EntityRef,
        recipient: Option<&Value>,
        config: &ResolvedConfig,
        event: &str,
    ) -> Vec<ChannelName> {
        self(entity, recipient, config, event)
    }
}

/// Last chance to rewrite a message before it is handed to the queue.
pub trait MessageTransform: Send + Sync {
    fn transform(&self, message: Message, event: &str, data: &Value) -> Message;
}

impl<F> MessageTransform for F
where
    F: Fn(Message, &str, &Value) -> Message + Send + Sync,
{
    fn transform(&self, message: Message, event: &str, data: &Value) -> Message {
        self(message, event, data)
    }
}

/// A [`RecipientDirectory`] over fixed data.
///
/// Recipients come from the event data's `recipients` array of `type:id`
/// strings when present, otherwise from the list registered for the event.
/// Template data is the fixed map plus the event data's own
/// `template_data` object, the latter winning.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    entities: HashMap<String, Value>,
    recipients: HashMap<String, Vec<EntityRef>>,
    template_data: Map<String, Value>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn entity(mut self, entity: &EntityRef, record: Value) -> Self {
        self.entities.insert(entity.document_id(), record);
        self
    }

    /// Registers the recipients used for `event` when its data names none.
    #[must_use]
    pub fn event_recipients(
        mut self,
        event: impl Into<String>,
        recipients: Vec<EntityRef>,
    ) -> Self {
        self.recipients.insert(event.into(), recipients);
        self
    }

    #[must_use]
    pub fn template_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.template_data.insert(key.into(), value.into());
        self
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[async_trait]
impl RecipientDirectory for StaticDirectory {
    async fn recipients(&self, event: &str, data: &Value) -> Result<Vec<EntityRef>, RouterError> {
        if let Some(listed) = data.get("recipients").and_then(Value::as_array) {
            return listed
                .iter()
                .map(|item| {
                    item.as_str()
                        .ok_or_else(|| RouterError::hook("recipients", "entries must be strings"))?
                        .parse::<EntityRef>()
                        .map_err(|err| RouterError::hook("recipients", err))
                })
                .collect();
        }
        Ok(self.recipients.get(event).cloned().unwrap_or_default())
    }

    async fn entities(
        &self,
        entities: &[EntityRef],
    ) -> Result<HashMap<String, Value>, RouterError> {
        Ok(entities
            .iter()
            .filter_map(|entity| {
                let id = entity.document_id();
                self.entities.get(&id).map(|record| (id, record.clone()))
            })
            .collect())
    }

    async fn template_data(
        &self,
        _event: &str,
        data: &Value,
    ) -> Result<Map<String, Value>, RouterError> {
        let mut out = self.template_data.clone();
        if let Some(Value::Object(extra)) = data.get("template_data") {
            out.extend(extra.clone());
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn recipients_from_event_data_win() {
        let dir =
            StaticDirectory::new().event_recipients("signup", vec![EntityRef::new("user", "1")]);
        let from_data = dir
            .recipients("signup", &json!({"recipients": ["user:2", "account:7"]}))
            .await
            .unwrap();
        assert_eq!(
            from_data,
            vec![EntityRef::new("user", "2"), EntityRef::new("account", "7")]
        );
        let registered = dir.recipients("signup", &json!({})).await.unwrap();
        assert_eq!(registered, vec![EntityRef::new("user", "1")]);
        assert!(dir.recipients("other", &json!({})).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_recipient_is_a_hook_error() {
        let dir = StaticDirectory::new();
        let err = dir
            .recipients("signup", &json!({"recipients": ["nobody"]}))
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::Hook { hook: "recipients", .. }));
    }

    #[tokio::test]
    async fn entities_keyed_by_document_id() {
        let user = EntityRef::new("user", "42");
        let dir = StaticDirectory::new().entity(&user, json!({"email": "a@example.com"}));
        let found = dir
            .entities(&[user, EntityRef::new("user", "missing")])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found["user_42"]["email"], "a@example.com");
    }

    #[tokio::test]
    async fn template_data_merges_event_values() {
        let dir = StaticDirectory::new()
            .template_value("app", "Courier")
            .template_value("tone", "formal");
        let data = dir
            .template_data("signup", &json!({"template_data": {"tone": "casual"}}))
            .await
            .unwrap();
        assert_eq!(data["app"], "Courier");
        assert_eq!(data["tone"], "casual");
    }
}
