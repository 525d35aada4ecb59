//! Assembles an in-memory Courier stack from the CLI configuration.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use courier_channels::LogWorker;
use courier_config::{ConfigDocument, ConfigStore, MemoryDocumentStore};
use courier_core::EntityRef;
use courier_gateway::Dispatcher;
use courier_ledger::MemoryErrorLedger;
use courier_queue::{DeliveryQueue, MemoryJobStore};
use courier_router::{RoutingEngine, StaticDirectory};

use crate::config::CourierConfig;

/// Load the config file and its seed data, then build a dispatcher.
pub async fn load(path: &Path) -> anyhow::Result<Dispatcher> {
    let config = CourierConfig::load(path)?;
    let documents = config.seed.load_documents()?;
    let entities = config.seed.load_entities()?;
    assemble(&config, documents, entities).await
}

/// Build a dispatcher over in-memory stores. Every router channel gets a
/// queue task of its kind, delivered by [`LogWorker`].
pub async fn assemble(
    config: &CourierConfig,
    documents: Vec<ConfigDocument>,
    entities: Vec<(EntityRef, Value)>,
) -> anyhow::Result<Dispatcher> {
    info!(
        documents = documents.len(),
        entities = entities.len(),
        "seeding in-memory stores"
    );
    let store = ConfigStore::builder()
        .store(Arc::new(MemoryDocumentStore::with_documents(documents)))
        .build()?;

    let directory = entities
        .iter()
        .fold(StaticDirectory::new(), |dir, (entity, record)| {
            dir.entity(entity, record.clone())
        });

    let mut router = RoutingEngine::builder()
        .config_store(Arc::new(store))
        .ledger(Arc::new(MemoryErrorLedger::new()))
        .directory(Arc::new(directory))
        .prefix(config.router.prefix.clone())
        .events(config.router.events.clone());
    for preference in &config.router.preferences {
        router = router.preference(preference.name.clone(), preference.build()?);
    }
    let router = router.build()?;

    let mut queue = DeliveryQueue::builder()
        .store(Arc::new(MemoryJobStore::new()))
        .config(config.queue.to_queue_config()?);
    for channel in router.channels() {
        queue = queue
            .task(channel.name.clone(), channel.kind())
            .worker(channel.name.clone(), Arc::new(LogWorker));
    }

    Ok(Dispatcher::builder()
        .router(router)
        .queue(queue.build()?)
        .build()
        .await?)
}

#[cfg(test)]
pub(crate) mod tests {
    use serde_json::json;

    use super::*;

    /// A stack with one user who gets welcome emails.
    pub(crate) async fn welcome_stack() -> Dispatcher {
        let config: CourierConfig = toml::from_str("").unwrap();
        let documents = vec![ConfigDocument::root(json!({
            "notifications": {
                "email": {"events": {"welcome": {
                    "when": "always",
                    "templates": {"subject": "Hi {{name}}", "body": "welcome"}
                }}},
                "webhook": []
            }
        }))];
        let entities = vec![(
            EntityRef::new("user", "1"),
            json!({"email": "one@example.com"}),
        )];
        assemble(&config, documents, entities).await.unwrap()
    }

    #[tokio::test]
    async fn seeded_stack_routes() {
        let dispatcher = welcome_stack().await;
        let report = dispatcher
            .preview("welcome", &json!({"recipients": ["user:1"]}))
            .await
            .unwrap();
        assert_eq!(report.messages.len(), 1);
        assert_eq!(report.messages[0].channel.as_str(), "email");
        assert_eq!(dispatcher.queue().tasks().len(), 4);
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn defaults_installed_on_empty_store() {
        let config: CourierConfig = toml::from_str("").unwrap();
        let dispatcher = assemble(&config, Vec::new(), Vec::new()).await.unwrap();
        assert!(
            dispatcher
                .config()
                .has_default_for_prefix("notifications")
                .await
                .unwrap()
        );
        dispatcher.shutdown().await;
    }
}
