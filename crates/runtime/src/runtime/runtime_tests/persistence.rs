// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence wiring: restore on start, checkpoints, periodic
//! snapshots, shutdown persistence.

use super::*;
use crate::error::GenServerError;
use hive_store::{MemoryAdapter, PersistenceConfig, StorageAdapter, StoreError};

fn persisted(adapter: Arc<MemoryAdapter>) -> StartOptions {
    StartOptions::named("counter").persistence(PersistenceConfig::new(adapter))
}

#[tokio::test]
async fn state_survives_stop_and_restart() {
    let runtime = Runtime::new();
    let adapter = Arc::new(MemoryAdapter::new());

    let server = runtime
        .start(Arc::new(Counter), Value::Null, persisted(adapter.clone()))
        .await
        .unwrap();
    for _ in 0..5 {
        runtime.cast(&server, json!("inc"));
    }
    // Synchronize on the mailbox, then stop (persist_on_shutdown).
    assert_eq!(runtime.call(&server, json!("get"), None).await.unwrap(), json!(5));
    runtime.stop(&server, ExitReason::Normal).await.unwrap();

    let revived = runtime
        .start(Arc::new(Counter), Value::Null, persisted(adapter))
        .await
        .unwrap();
    assert_eq!(runtime.call(&revived, json!("get"), None).await.unwrap(), json!(5));
}

#[tokio::test]
async fn restore_emits_state_restored_event() {
    let runtime = Runtime::new();
    let adapter = Arc::new(MemoryAdapter::new());

    let server = runtime
        .start(Arc::new(Counter), json!(3), persisted(adapter.clone()))
        .await
        .unwrap();
    runtime.checkpoint(&server).await.unwrap();
    runtime.stop(&server, ExitReason::Normal).await.unwrap();

    let mut events = runtime.subscribe();
    let revived = runtime
        .start(Arc::new(Counter), Value::Null, persisted(adapter))
        .await
        .unwrap();

    let mut saw_started = false;
    let mut saw_restored = false;
    while let Ok(event) = events.try_recv() {
        match event {
            LifecycleEvent::Started { server, .. } if server.id == revived.id => {
                saw_started = true;
                assert!(!saw_restored, "started must precede state_restored");
            }
            LifecycleEvent::StateRestored { server, metadata } if server.id == revived.id => {
                saw_restored = true;
                assert_eq!(metadata.schema_version, 1);
            }
            _ => {}
        }
    }
    assert!(saw_started && saw_restored);
}

#[tokio::test]
async fn checkpoint_returns_metadata_and_emits_event() {
    let runtime = Runtime::new();
    let adapter = Arc::new(MemoryAdapter::new());
    let server = runtime
        .start(Arc::new(Counter), json!(9), persisted(adapter.clone()))
        .await
        .unwrap();

    let metadata = runtime.checkpoint(&server).await.unwrap();
    assert_eq!(metadata.schema_version, 1);
    assert_eq!(metadata.server_name.as_deref(), Some("counter"));

    let loaded = adapter.load("counter").await.unwrap().unwrap();
    assert_eq!(loaded.state, json!(9));

    let last = runtime.last_checkpoint_meta(&server).await.unwrap().unwrap();
    assert_eq!(last.persisted_at_ms, metadata.persisted_at_ms);
}

#[tokio::test]
async fn checkpoint_without_persistence_is_an_error() {
    let runtime = Runtime::new();
    let server = start_counter(&runtime).await;
    let err = runtime.checkpoint(&server).await.unwrap_err();
    assert!(matches!(err, GenServerError::PersistenceNotConfigured { .. }));
}

/// Counter whose before_persist vetoes every snapshot.
struct PrivateCounter;

#[async_trait]
impl Behavior for PrivateCounter {
    async fn init(&self, _args: Value) -> Result<Value, String> {
        Ok(json!(0))
    }

    async fn handle_call(&self, _msg: Value, state: Value) -> Result<(Value, Value), String> {
        Ok((state.clone(), state))
    }

    async fn handle_cast(&self, _msg: Value, state: Value) -> Result<Value, String> {
        Ok(state)
    }

    fn before_persist(&self, _state: &Value) -> Option<Value> {
        None
    }
}

#[tokio::test]
async fn vetoed_manual_checkpoint_errors_and_skips_save() {
    let runtime = Runtime::new();
    let adapter = Arc::new(MemoryAdapter::new());
    let server = runtime
        .start(
            Arc::new(PrivateCounter),
            Value::Null,
            StartOptions::named("private").persistence(PersistenceConfig::new(adapter.clone())),
        )
        .await
        .unwrap();

    let err = runtime.checkpoint(&server).await.unwrap_err();
    assert_eq!(err, GenServerError::Persistence(StoreError::PersistSkipped));
    assert!(adapter.is_empty());

    // Shutdown persistence is also vetoed, silently.
    runtime.stop(&server, ExitReason::Normal).await.unwrap();
    assert!(adapter.is_empty());
}

#[tokio::test]
async fn periodic_snapshot_persists_in_background() {
    let runtime = Runtime::new();
    let adapter = Arc::new(MemoryAdapter::new());
    let config = PersistenceConfig::new(adapter.clone())
        .key("ticker")
        .snapshot_interval(Duration::from_millis(20))
        .persist_on_shutdown(false);

    let server = runtime
        .start(
            Arc::new(Counter),
            json!(7),
            StartOptions::default().persistence(config),
        )
        .await
        .unwrap();

    let saved = wait_for(Duration::from_millis(1_000), || {
        (!adapter.is_empty()).then_some(())
    })
    .await;
    assert!(saved.is_some(), "periodic snapshot should have run");
    runtime.stop(&server, ExitReason::Normal).await.unwrap();
}

#[tokio::test]
async fn cleanup_on_terminate_deletes_state() {
    let runtime = Runtime::new();
    let adapter = Arc::new(MemoryAdapter::new());
    let config = PersistenceConfig::new(adapter.clone())
        .key("ephemeral")
        .cleanup_on_terminate(true);

    let server = runtime
        .start(Arc::new(Counter), json!(1), StartOptions::default().persistence(config))
        .await
        .unwrap();
    runtime.checkpoint(&server).await.unwrap();
    assert!(!adapter.is_empty());

    runtime.stop(&server, ExitReason::Normal).await.unwrap();
    assert!(adapter.is_empty());
}

#[tokio::test]
async fn clear_persisted_state_is_idempotent() {
    let runtime = Runtime::new();
    let adapter = Arc::new(MemoryAdapter::new());
    let server = runtime
        .start(Arc::new(Counter), json!(1), persisted(adapter))
        .await
        .unwrap();
    runtime.checkpoint(&server).await.unwrap();

    assert!(runtime.clear_persisted_state(&server).await.unwrap());
    assert!(!runtime.clear_persisted_state(&server).await.unwrap());
}

#[tokio::test]
async fn stale_state_falls_back_to_fresh_init() {
    let clock = hive_core::FakeClock::new();
    clock.set_epoch_ms(1_000_000);
    let runtime = Runtime::with_clock(clock.handle());
    let adapter = Arc::new(MemoryAdapter::new());

    let config = PersistenceConfig::new(adapter.clone()).key("aging");
    let server = runtime
        .start(Arc::new(Counter), json!(5), StartOptions::default().persistence(config))
        .await
        .unwrap();
    runtime.checkpoint(&server).await.unwrap();
    runtime
        .stop_with_timeout(&server, ExitReason::Normal, Duration::from_millis(1_000))
        .await
        .unwrap();

    clock.advance(Duration::from_millis(60_000));
    let config = PersistenceConfig::new(adapter)
        .key("aging")
        .max_state_age(Duration::from_millis(10_000));
    let revived = runtime
        .start(Arc::new(Counter), json!(0), StartOptions::default().persistence(config))
        .await
        .unwrap();

    // Stale snapshot rejected; fresh init state instead.
    assert_eq!(runtime.call(&revived, json!("get"), None).await.unwrap(), json!(0));
}
