use courier_core::{EntityRef, SuppressionRecord, SuppressionStatus};

use crate::error::LedgerError;
use crate::ledger::ErrorLedger;

/// Run the error ledger conformance test suite.
///
/// Call this from your backend's test module with a fresh, empty ledger.
///
/// # Errors
///
/// Returns an error if the backend fails an operation outright; behavioral
/// mismatches panic.
pub async fn run_ledger_conformance_tests(ledger: &dyn ErrorLedger) -> Result<(), LedgerError> {
    test_empty(ledger).await?;
    test_record_and_skip(ledger).await?;
    test_duplicate_returns_existing(ledger).await?;
    test_resolve_clears_channel(ledger).await?;
    test_many(ledger).await?;
    Ok(())
}

fn record(entity: &EntityRef, channel: &str, reason: &str) -> SuppressionRecord {
    SuppressionRecord::new(entity.clone(), channel, reason, None)
}

async fn test_empty(ledger: &dyn ErrorLedger) -> Result<(), LedgerError> {
    let nobody = EntityRef::new("user", "empty");
    assert!(ledger.unresolved_channels(&nobody).await?.is_empty());
    assert!(ledger.unresolved_for(&nobody).await?.is_empty());
    assert!(!ledger.resolve("no-such-record").await?);
    Ok(())
}

async fn test_record_and_skip(ledger: &dyn ErrorLedger) -> Result<(), LedgerError> {
    let entity = EntityRef::new("user", "skip");
    let stored = ledger.record(record(&entity, "sms", "Landline")).await?;
    assert_eq!(stored.status, SuppressionStatus::Unresolved);
    let channels = ledger.unresolved_channels(&entity).await?;
    assert_eq!(channels.len(), 1);
    assert!(channels.iter().any(|c| c.as_str() == "sms"));

    let other = EntityRef::new("user", "skip-other");
    assert!(ledger.unresolved_channels(&other).await?.is_empty());
    Ok(())
}

async fn test_duplicate_returns_existing(ledger: &dyn ErrorLedger) -> Result<(), LedgerError> {
    let entity = EntityRef::new("user", "dup");
    let first = ledger.record(record(&entity, "email", "Bounce")).await?;
    let second = ledger.record(record(&entity, "email", "Spam")).await?;
    assert_eq!(first.id, second.id);
    assert_eq!(second.reason, "Bounce");
    assert_eq!(ledger.unresolved_for(&entity).await?.len(), 1);

    let push = ledger.record(record(&entity, "push", "Invalid token")).await?;
    assert_ne!(push.id, first.id);
    assert_eq!(ledger.unresolved_for(&entity).await?.len(), 2);
    Ok(())
}

async fn test_resolve_clears_channel(ledger: &dyn ErrorLedger) -> Result<(), LedgerError> {
    let entity = EntityRef::new("user", "resolve");
    let stored = ledger.record(record(&entity, "sms", "Blacklisted")).await?;
    assert!(ledger.resolve(&stored.id).await?);
    assert!(!ledger.resolve(&stored.id).await?, "resolving twice reports false");
    assert!(ledger.unresolved_channels(&entity).await?.is_empty());

    let listed = ledger.list().await?;
    let kept = listed
        .iter()
        .find(|r| r.id == stored.id)
        .map(|r| r.status);
    assert_eq!(kept, Some(SuppressionStatus::Resolved));

    let again = ledger.record(record(&entity, "sms", "Blacklisted")).await?;
    assert_ne!(again.id, stored.id, "a fresh failure after resolution is a new record");
    Ok(())
}

async fn test_many(ledger: &dyn ErrorLedger) -> Result<(), LedgerError> {
    let a = EntityRef::new("org", "many-a");
    let b = EntityRef::new("org", "many-b");
    ledger.record(record(&a, "webhook", "Gone")).await?;
    let map = ledger.unresolved_channels_many(&[a.clone(), b.clone()]).await?;
    assert!(map.get(&a).is_some_and(|c| c.iter().any(|ch| ch.as_str() == "webhook")));
    assert!(map.get(&b).is_none_or(std::collections::HashSet::is_empty));
    Ok(())
}
