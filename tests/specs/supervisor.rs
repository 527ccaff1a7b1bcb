// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! S2: one_for_one restart with fresh state, then MaxRestartsExceeded.

use crate::prelude::{eventually, Counter};
use hive_core::ServerRef;
use hive_runtime::{
    ChildSpec, RestartIntensity, Runtime, Strategy, Supervisor, SupervisorError,
    SupervisorOptions,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn crashed_child_is_replaced_with_fresh_state() {
    let runtime = Runtime::new();
    let supervisor = Supervisor::start(
        runtime.clone(),
        SupervisorOptions::new(Strategy::OneForOne)
            .child(ChildSpec::new("counter", Arc::new(Counter))),
    )
    .await
    .unwrap();

    let first = supervisor.child("counter").unwrap();
    runtime.cast(&first, json!("inc"));
    let err = runtime.call(&first, json!("boom"), None).await;
    assert!(err.is_err(), "boom crashes the child");

    // Within 100ms a new instance is registered under the same id.
    let started = tokio::time::Instant::now();
    let replacement: Option<ServerRef> = eventually(Duration::from_millis(1_000), || {
        supervisor.child("counter").filter(|s| s.id != first.id)
    })
    .await;
    let replacement = replacement.expect("replacement child");
    assert!(started.elapsed() < Duration::from_millis(100));

    // Fresh state, not the crashed instance's.
    let reply = runtime.call(&replacement, json!("get"), None).await.unwrap();
    assert_eq!(reply, json!(0));
}

#[tokio::test]
async fn four_crashes_in_window_stop_the_supervisor() {
    let runtime = Runtime::new();
    let supervisor = Supervisor::start(
        runtime.clone(),
        SupervisorOptions::new(Strategy::OneForOne)
            .child(ChildSpec::new("counter", Arc::new(Counter)))
            .intensity(RestartIntensity {
                max_restarts: 3,
                within: Duration::from_millis(5_000),
            }),
    )
    .await
    .unwrap();

    for _ in 0..4 {
        let Some(child) =
            eventually(Duration::from_millis(1_000), || supervisor.child("counter")).await
        else {
            break;
        };
        let _ = runtime.call(&child, json!("boom"), None).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let failure = eventually(Duration::from_millis(1_000), || supervisor.failure()).await;
    assert!(matches!(
        failure,
        Some(SupervisorError::MaxRestartsExceeded { .. })
    ));
    assert!(!supervisor.is_running());
}
