// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! S3: state survives a stop/restart cycle through the file adapter.

use crate::prelude::Counter;
use hive_core::ExitReason;
use hive_runtime::{Runtime, StartOptions};
use hive_store::{FileAdapter, PersistenceConfig};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::tempdir;

#[tokio::test]
async fn counter_state_survives_restart() {
    let dir = tempdir().unwrap();
    let runtime = Runtime::new();

    let options = || async {
        let adapter = Arc::new(FileAdapter::open(dir.path()).await.unwrap());
        StartOptions::named("counter").persistence(PersistenceConfig::new(adapter))
    };

    let counter = runtime
        .start(Arc::new(Counter), Value::Null, options().await)
        .await
        .unwrap();
    for _ in 0..5 {
        runtime.cast(&counter, json!("inc"));
    }
    assert_eq!(runtime.call(&counter, json!("get"), None).await.unwrap(), json!(5));
    runtime.stop(&counter, ExitReason::Normal).await.unwrap();

    // Restart with the same configuration: state restores.
    let revived = runtime
        .start(Arc::new(Counter), Value::Null, options().await)
        .await
        .unwrap();
    assert_eq!(runtime.call(&revived, json!("get"), None).await.unwrap(), json!(5));

    let meta = runtime.last_checkpoint_meta(&revived).await.unwrap().unwrap();
    assert_eq!(meta.schema_version, 1);
    assert_eq!(meta.server_name.as_deref(), Some("counter"));
}

#[tokio::test]
async fn clearing_state_twice_is_a_noop_second_time() {
    let dir = tempdir().unwrap();
    let runtime = Runtime::new();
    let adapter = Arc::new(FileAdapter::open(dir.path()).await.unwrap());

    let counter = runtime
        .start(
            Arc::new(Counter),
            json!(1),
            StartOptions::named("counter").persistence(PersistenceConfig::new(adapter)),
        )
        .await
        .unwrap();
    runtime.checkpoint(&counter).await.unwrap();

    assert!(runtime.clear_persisted_state(&counter).await.unwrap());
    assert!(!runtime.clear_persisted_state(&counter).await.unwrap());
}
