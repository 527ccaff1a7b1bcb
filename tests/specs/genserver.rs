// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! GenServer scenarios: increment, mailbox ordering, links.

use crate::prelude::{eventually, Coordinator, Counter};
use hive_core::ExitReason;
use hive_runtime::{Runtime, StartOptions};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// S1: start, cast inc ×3, call get → 3.
#[tokio::test]
async fn counter_increments_through_casts() {
    let runtime = Runtime::new();
    let counter = runtime
        .start(Arc::new(Counter), Value::Null, StartOptions::default())
        .await
        .unwrap();

    for _ in 0..3 {
        runtime.cast(&counter, json!("inc"));
    }
    let reply = runtime.call(&counter, json!("get"), None).await.unwrap();
    assert_eq!(reply, json!(3));
}

/// Per-mailbox FIFO: the call never bypasses earlier
/// casts.
#[tokio::test]
async fn call_never_overtakes_earlier_casts() {
    let runtime = Runtime::new();
    let counter = runtime
        .start(Arc::new(Counter), Value::Null, StartOptions::default())
        .await
        .unwrap();

    for _ in 0..100 {
        runtime.cast(&counter, json!("inc"));
    }
    let reply = runtime.call(&counter, json!("get"), None).await.unwrap();
    assert_eq!(reply, json!(100));
}

/// Invariant 7, trap_exit=false: the linked peer dies with the same
/// reason.
#[tokio::test]
async fn abnormal_exit_propagates_over_links() {
    let runtime = Runtime::new();
    let a = runtime
        .start(Arc::new(Counter), Value::Null, StartOptions::default())
        .await
        .unwrap();
    let b = runtime
        .start(Arc::new(Counter), Value::Null, StartOptions::default())
        .await
        .unwrap();
    runtime.link(&a, &b);

    let _ = runtime.call(&b, json!("boom"), None).await;

    let a_gone =
        eventually(Duration::from_millis(500), || (!runtime.is_alive(&a)).then_some(())).await;
    assert!(a_gone.is_some());
}

/// Invariant 7, trap_exit=true: the peer gets `{EXIT, from, reason}`
/// as an info message and survives.
#[tokio::test]
async fn trapping_peer_survives_with_exit_message() {
    let runtime = Runtime::new();
    let coordinator = runtime
        .start(
            Arc::new(Coordinator),
            Value::Null,
            StartOptions::default().trap_exit(true),
        )
        .await
        .unwrap();
    let worker = runtime
        .start(Arc::new(Counter), Value::Null, StartOptions::default())
        .await
        .unwrap();
    runtime.link(&coordinator, &worker);

    let _ = runtime.call(&worker, json!("boom"), None).await;

    let mut exits = Value::Null;
    for _ in 0..100 {
        exits = runtime.call(&coordinator, json!("peek"), None).await.unwrap();
        if !exits.as_array().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let exits = exits.as_array().unwrap();
    assert_eq!(exits[0]["type"], json!("EXIT"));
    assert_eq!(exits[0]["from"]["id"], json!(worker.id.as_str()));
    assert_eq!(exits[0]["reason"], json!({"kind": "error", "message": "boom"}));
    assert!(runtime.is_alive(&coordinator));
    assert_eq!(runtime.status(&worker), None);

    runtime.stop(&coordinator, ExitReason::Normal).await.unwrap();
}
