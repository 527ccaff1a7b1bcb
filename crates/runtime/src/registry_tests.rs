// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::behavior::StartOptions;
use crate::test_support::{start_counter, wait_for, Recorder};
use hive_core::ExitReason;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn unique_mode_rejects_second_registration() {
    let runtime = Runtime::new();
    let registry = Registry::new(runtime.clone(), RegistryMode::Unique);
    let a = start_counter(&runtime).await;
    let b = start_counter(&runtime).await;

    registry.register("db", &a, Value::Null).unwrap();
    let err = registry.register("db", &b, Value::Null).unwrap_err();
    assert_eq!(err, RegistryError::AlreadyRegisteredKey { key: "db".into() });

    let entry = registry.lookup("db").unwrap();
    assert_eq!(entry.server.id, a.id);
}

#[tokio::test]
async fn register_unregister_register_round_trips() {
    let runtime = Runtime::new();
    let registry = Registry::new(runtime.clone(), RegistryMode::Unique);
    let a = start_counter(&runtime).await;

    registry.register("db", &a, Value::Null).unwrap();
    assert!(registry.unregister("db"));
    // Unregistering a missing key is a no-op returning false.
    assert!(!registry.unregister("db"));
    registry.register("db", &a, Value::Null).unwrap();
}

#[tokio::test]
async fn lookup_missing_key_errors() {
    let runtime = Runtime::new();
    let registry = Registry::new(runtime, RegistryMode::Unique);
    assert_eq!(
        registry.lookup("ghost").unwrap_err(),
        RegistryError::KeyNotFound { key: "ghost".into() }
    );
}

#[tokio::test]
async fn duplicate_mode_collects_entries_per_key() {
    let runtime = Runtime::new();
    let registry = Registry::new(runtime.clone(), RegistryMode::Duplicate);
    let a = start_counter(&runtime).await;
    let b = start_counter(&runtime).await;

    registry.register("pool", &a, json!({"shard": 1})).unwrap();
    registry.register("pool", &b, json!({"shard": 2})).unwrap();
    assert_eq!(registry.count("pool"), 2);

    // Same server twice under one key is rejected.
    let err = registry.register("pool", &a, Value::Null).unwrap_err();
    assert!(matches!(err, RegistryError::DuplicateRegistration { .. }));

    // Unique lookup refuses ambiguity.
    assert!(matches!(
        registry.lookup("pool"),
        Err(RegistryError::DuplicateKeyLookup { .. })
    ));
}

#[tokio::test]
async fn dispatch_broadcasts_casts_to_all_entries() {
    let runtime = Runtime::new();
    let registry = Registry::new(runtime.clone(), RegistryMode::Duplicate);
    let a = runtime
        .start(Arc::new(Recorder), Value::Null, StartOptions::default())
        .await
        .unwrap();
    let b = runtime
        .start(Arc::new(Recorder), Value::Null, StartOptions::default())
        .await
        .unwrap();
    registry.register("workers", &a, Value::Null).unwrap();
    registry.register("workers", &b, Value::Null).unwrap();

    let sent = registry.dispatch("workers", json!("job")).unwrap();
    assert_eq!(sent, 2);

    for server in [&a, &b] {
        let log = runtime.call(server, json!("log"), None).await.unwrap();
        assert_eq!(log, json!([["cast", "job"]]));
    }
}

#[tokio::test]
async fn dispatch_with_filter_routes_selectively() {
    let runtime = Runtime::new();
    let registry = Registry::new(runtime.clone(), RegistryMode::Duplicate);
    let a = runtime
        .start(Arc::new(Recorder), Value::Null, StartOptions::default())
        .await
        .unwrap();
    let b = runtime
        .start(Arc::new(Recorder), Value::Null, StartOptions::default())
        .await
        .unwrap();
    registry.register("workers", &a, json!({"shard": 1})).unwrap();
    registry.register("workers", &b, json!({"shard": 2})).unwrap();

    registry
        .dispatch_with("workers", |entry| {
            if entry.metadata["shard"] == json!(2) {
                runtime.cast(&entry.server, json!("job"));
            }
        })
        .unwrap();

    assert_eq!(runtime.call(&a, json!("log"), None).await.unwrap(), json!([]));
    assert_eq!(
        runtime.call(&b, json!("log"), None).await.unwrap(),
        json!([["cast", "job"]])
    );
}

#[tokio::test]
async fn dispatch_on_unique_registry_is_unsupported() {
    let runtime = Runtime::new();
    let registry = Registry::new(runtime, RegistryMode::Unique);
    assert_eq!(
        registry.dispatch("any", Value::Null).unwrap_err(),
        RegistryError::DispatchNotSupported
    );
}

#[tokio::test]
async fn glob_patterns_match_keys() {
    let runtime = Runtime::new();
    let registry = Registry::new(runtime.clone(), RegistryMode::Duplicate);
    let a = start_counter(&runtime).await;
    for key in ["svc/eu/db", "svc/us/db", "svc/eu/cache", "other"] {
        registry.register(key, &a, Value::Null).unwrap();
    }

    assert_eq!(registry.match_keys("svc/*/db"), vec!["svc/eu/db", "svc/us/db"]);
    assert_eq!(registry.match_keys("svc/**").len(), 3);
    assert_eq!(registry.match_keys("?ther"), vec!["other"]);
}

#[tokio::test]
async fn entries_are_removed_when_the_process_stops() {
    let runtime = Runtime::new();
    let registry = Registry::new(runtime.clone(), RegistryMode::Unique);
    let a = start_counter(&runtime).await;
    registry.register("db", &a, Value::Null).unwrap();

    runtime.stop(&a, ExitReason::Normal).await.unwrap();

    let removed = wait_for(Duration::from_millis(500), || {
        registry.lookup("db").is_err().then_some(())
    })
    .await;
    assert!(removed.is_some(), "registration should be auto-removed");
}
