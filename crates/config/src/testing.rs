use serde_json::json;

use courier_core::EntityRef;

use crate::document::ConfigDocument;
use crate::error::ConfigError;
use crate::store::DocumentStore;

/// Run the document store conformance test suite.
///
/// Call this from your backend's test module with a fresh, empty store.
///
/// # Errors
///
/// Returns an error if the backend fails an operation outright; behavioral
/// mismatches panic.
pub async fn run_document_store_conformance_tests(
    store: &dyn DocumentStore,
) -> Result<(), ConfigError> {
    test_get_missing(store).await?;
    test_insert_and_get(store).await?;
    test_insert_duplicate(store).await?;
    test_get_many(store).await?;
    test_replace_config(store).await?;
    test_set_paths(store).await?;
    test_find_by_type(store).await?;
    Ok(())
}

async fn test_get_missing(store: &dyn DocumentStore) -> Result<(), ConfigError> {
    assert!(store.get("nobody_1").await?.is_none());
    assert!(!store.replace_config("nobody_1", json!({})).await?);
    assert!(!store.set_paths("nobody_1", vec![]).await?);
    Ok(())
}

async fn test_insert_and_get(store: &dyn DocumentStore) -> Result<(), ConfigError> {
    let doc = ConfigDocument::for_entity(&EntityRef::new("user", "ins"), json!({"a": 1}));
    store.insert(doc.clone()).await?;
    assert_eq!(store.get("user_ins").await?, Some(doc));
    Ok(())
}

async fn test_insert_duplicate(store: &dyn DocumentStore) -> Result<(), ConfigError> {
    let doc = ConfigDocument::for_entity(&EntityRef::new("user", "dup"), json!({}));
    store.insert(doc.clone()).await?;
    let err = store.insert(doc).await;
    assert!(
        matches!(err, Err(ConfigError::DocumentExists(ref id)) if id == "user_dup"),
        "second insert of the same id should fail, got {err:?}"
    );
    Ok(())
}

async fn test_get_many(store: &dyn DocumentStore) -> Result<(), ConfigError> {
    store
        .insert(ConfigDocument::for_entity(
            &EntityRef::new("org", "m1"),
            json!({}),
        ))
        .await?;
    store
        .insert(ConfigDocument::for_entity(
            &EntityRef::new("org", "m2"),
            json!({}),
        ))
        .await?;
    let mut ids: Vec<String> = store
        .get_many(&["org_m1".into(), "org_m2".into(), "org_missing".into()])
        .await?
        .into_iter()
        .map(|doc| doc.id)
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["org_m1".to_owned(), "org_m2".to_owned()]);
    Ok(())
}

async fn test_replace_config(store: &dyn DocumentStore) -> Result<(), ConfigError> {
    let entity = EntityRef::new("user", "replace");
    store
        .insert(ConfigDocument::for_entity(&entity, json!({"a": 1, "b": 2})))
        .await?;
    assert!(store.replace_config("user_replace", json!({"c": 3})).await?);
    let doc = store.get("user_replace").await?.expect("document should exist");
    assert_eq!(doc.config, json!({"c": 3}));
    Ok(())
}

async fn test_set_paths(store: &dyn DocumentStore) -> Result<(), ConfigError> {
    let entity = EntityRef::new("user", "paths");
    store
        .insert(ConfigDocument::for_entity(
            &entity,
            json!({"n": {"sms": {"when": "day", "keep": true}}, "list": [1, 2, 3]}),
        ))
        .await?;
    let updated = store
        .set_paths(
            "user_paths",
            vec![
                ("n.sms.when".into(), json!("night")),
                ("list".into(), json!([9])),
                ("fresh.leaf".into(), json!("x")),
            ],
        )
        .await?;
    assert!(updated);
    let doc = store.get("user_paths").await?.expect("document should exist");
    assert_eq!(
        doc.config,
        json!({
            "n": {"sms": {"when": "night", "keep": true}},
            "list": [9],
            "fresh": {"leaf": "x"}
        })
    );
    Ok(())
}

async fn test_find_by_type(store: &dyn DocumentStore) -> Result<(), ConfigError> {
    store
        .insert(ConfigDocument::for_entity(
            &EntityRef::new("team", "t1"),
            json!({}),
        ))
        .await?;
    store
        .insert(ConfigDocument::for_entity(
            &EntityRef::new("team", "t2"),
            json!({}),
        ))
        .await?;
    let found = store.find_by_type("team", &["t2".into()]).await?;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, "team_t2");
    assert!(store.find_by_type("team", &[]).await?.is_empty());
    Ok(())
}
