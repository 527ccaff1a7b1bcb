// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::memory::MemoryAdapter;
use hive_core::ServerId;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn manager_with(config: PersistenceConfig) -> PersistenceManager {
    PersistenceManager::new(config, ServerId::from_string("srv-test"), Some("counter".into()))
}

#[tokio::test]
async fn key_prefers_explicit_then_name_then_id() {
    let adapter = Arc::new(MemoryAdapter::new());

    let explicit = PersistenceConfig::new(adapter.clone()).key("custom");
    assert_eq!(manager_with(explicit).key(), "custom");

    let named = manager_with(PersistenceConfig::new(adapter.clone()));
    assert_eq!(named.key(), "counter");

    let anonymous = PersistenceManager::new(
        PersistenceConfig::new(adapter),
        ServerId::from_string("srv-test"),
        None,
    );
    assert_eq!(anonymous.key(), "srv-test");
}

#[tokio::test]
async fn save_then_load_round_trips_with_metadata() {
    let manager = manager_with(PersistenceConfig::new(Arc::new(MemoryAdapter::new())));

    let stored = manager.save(json!({"count": 5}), 1_000).await.unwrap();
    assert_eq!(stored.persisted_at_ms, 1_000);
    assert_eq!(stored.schema_version, 1);

    let (state, metadata) = manager.load(1_500).await.unwrap().unwrap();
    assert_eq!(state, json!({"count": 5}));
    assert_eq!(metadata.server_name.as_deref(), Some("counter"));
}

#[tokio::test]
async fn load_missing_is_none() {
    let manager = manager_with(PersistenceConfig::new(Arc::new(MemoryAdapter::new())));
    assert!(manager.load(0).await.unwrap().is_none());
}

#[tokio::test]
async fn stale_state_is_rejected_without_returning_state() {
    let config = PersistenceConfig::new(Arc::new(MemoryAdapter::new()))
        .max_state_age(Duration::from_millis(500));
    let manager = manager_with(config);

    manager.save(json!(1), 1_000).await.unwrap();
    let err = manager.load(2_000).await.unwrap_err();
    assert!(matches!(err, StoreError::StaleState { age_ms: 1_000, max_age_ms: 500, .. }));

    // Inside the window it loads fine
    assert!(manager.load(1_400).await.unwrap().is_some());
}

#[tokio::test]
async fn migration_runs_when_schema_is_behind() {
    let adapter = Arc::new(MemoryAdapter::new());

    // Persist at schema 1
    let v1 = manager_with(PersistenceConfig::new(adapter.clone()));
    v1.save(json!({"count": 5}), 0).await.unwrap();

    // Reload at schema 2 with a migrate hook
    let migrate: MigrateFn = Arc::new(|state, _from, _to| {
        Ok(json!({ "count": state["count"], "unit": "items" }))
    });
    let config = PersistenceConfig::new(adapter).schema_version(2).migrate(migrate);
    let (state, metadata) = manager_with(config).load(0).await.unwrap().unwrap();

    assert_eq!(state, json!({"count": 5, "unit": "items"}));
    assert_eq!(metadata.schema_version, 2);
}

#[tokio::test]
async fn migration_failure_surfaces_versions() {
    let adapter = Arc::new(MemoryAdapter::new());
    manager_with(PersistenceConfig::new(adapter.clone())).save(json!(1), 0).await.unwrap();

    let migrate: MigrateFn = Arc::new(|_, _, _| Err("schema too old".into()));
    let config = PersistenceConfig::new(adapter).schema_version(3).migrate(migrate);
    let err = manager_with(config).load(0).await.unwrap_err();
    assert_eq!(err, StoreError::Migration { from: 1, to: 3, message: "schema too old".into() });
}

#[tokio::test]
async fn older_schema_passes_through_without_migrate_hook() {
    let adapter = Arc::new(MemoryAdapter::new());
    manager_with(PersistenceConfig::new(adapter.clone())).save(json!(1), 0).await.unwrap();

    let config = PersistenceConfig::new(adapter).schema_version(2);
    let (state, metadata) = manager_with(config).load(0).await.unwrap().unwrap();
    assert_eq!(state, json!(1));
    assert_eq!(metadata.schema_version, 1);
}

#[tokio::test]
async fn report_invokes_on_error_hook() {
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let on_error: OnErrorFn = Arc::new(move |err| sink.lock().push(err.to_string()));

    let config = PersistenceConfig::new(Arc::new(MemoryAdapter::new())).on_error(on_error);
    let manager = manager_with(config);

    manager.report(&StoreError::PersistSkipped);
    assert_eq!(seen.lock().len(), 1);
}

#[tokio::test]
async fn delete_twice_is_noop_second_time() {
    let manager = manager_with(PersistenceConfig::new(Arc::new(MemoryAdapter::new())));
    manager.save(json!(1), 0).await.unwrap();
    assert!(manager.delete().await.unwrap());
    assert!(!manager.delete().await.unwrap());
}
