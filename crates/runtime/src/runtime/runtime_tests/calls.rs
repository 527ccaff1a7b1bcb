// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Call/cast semantics and mailbox ordering.

use super::*;
use crate::error::GenServerError;

#[tokio::test]
async fn casts_then_call_sees_all_casts() {
    let runtime = Runtime::new();
    let server = start_counter(&runtime).await;

    for _ in 0..3 {
        runtime.cast(&server, json!("inc"));
    }
    let reply = runtime.call(&server, json!("get"), None).await.unwrap();
    assert_eq!(reply, json!(3));
}

#[tokio::test]
async fn mailbox_is_fifo_across_message_kinds() {
    let runtime = Runtime::new();
    let server = runtime
        .start(Arc::new(Recorder), Value::Null, StartOptions::default())
        .await
        .unwrap();

    for i in 0..50 {
        runtime.cast(&server, json!(i));
    }
    runtime.deliver_info(&server, json!("tail"));

    let log = runtime.call(&server, json!("log"), None).await.unwrap();
    let log = log.as_array().unwrap();
    assert_eq!(log.len(), 51);
    for (i, entry) in log.iter().take(50).enumerate() {
        assert_eq!(entry, &json!(["cast", i]));
    }
    assert_eq!(log[50], json!(["info", "tail"]));
}

#[tokio::test]
async fn call_times_out_with_typed_error() {
    let runtime = Runtime::new();
    let server = runtime
        .start(Arc::new(Slow), Value::Null, StartOptions::default())
        .await
        .unwrap();

    let err = runtime
        .call(&server, json!({"delay_ms": 500}), Some(Duration::from_millis(40)))
        .await
        .unwrap_err();
    assert!(matches!(err, GenServerError::CallTimeout { timeout_ms: 40, .. }));
}

#[tokio::test]
async fn call_to_dead_handle_fails_not_running() {
    let runtime = Runtime::new();
    let server = start_counter(&runtime).await;
    runtime.stop(&server, ExitReason::Normal).await.unwrap();

    // The handle outlives the process and still fails cleanly.
    let err = runtime.call(&server, json!("get"), None).await.unwrap_err();
    assert!(matches!(err, GenServerError::ServerNotRunning { .. }));
}

#[tokio::test]
async fn crash_in_call_surfaces_and_stops_process() {
    let runtime = Runtime::new();
    let mut events = runtime.subscribe();
    let server = start_counter(&runtime).await;

    let err = runtime.call(&server, json!("boom"), None).await.unwrap_err();
    assert!(matches!(err, GenServerError::ServerNotRunning { .. }));

    let stopped = wait_for(Duration::from_millis(500), || {
        while let Ok(event) = events.try_recv() {
            if let LifecycleEvent::Stopped { server: s, reason } = event {
                if s.id == server.id {
                    return Some(reason);
                }
            }
        }
        None
    })
    .await;
    assert_eq!(stopped, Some(ExitReason::error("boom")));
    assert!(!runtime.is_alive(&server));
}

#[tokio::test]
async fn crash_in_cast_stops_process() {
    let runtime = Runtime::new();
    let server = start_counter(&runtime).await;

    runtime.cast(&server, json!("boom"));
    let gone =
        wait_for(Duration::from_millis(500), || (!runtime.is_alive(&server)).then_some(()))
            .await;
    assert!(gone.is_some());
}

#[tokio::test]
async fn cast_to_stopped_process_is_silently_dropped() {
    let runtime = Runtime::new();
    let server = start_counter(&runtime).await;
    runtime.stop(&server, ExitReason::Normal).await.unwrap();

    // No panic, no error.
    runtime.cast(&server, json!("inc"));
}

#[tokio::test]
async fn duplicate_name_is_rejected() {
    let runtime = Runtime::new();
    let _first = runtime
        .start(Arc::new(Counter), Value::Null, StartOptions::named("counter"))
        .await
        .unwrap();

    let err = runtime
        .start(Arc::new(Counter), Value::Null, StartOptions::named("counter"))
        .await
        .unwrap_err();
    assert_eq!(err, GenServerError::AlreadyRegistered { name: "counter".into() });
}

#[tokio::test]
async fn init_failure_surfaces_and_releases_name() {
    let runtime = Runtime::new();
    let err = runtime
        .start(Arc::new(FailsInit), Value::Null, StartOptions::named("flaky"))
        .await
        .unwrap_err();
    assert_eq!(err, GenServerError::InitializationError { message: "nope".into() });

    // The reserved name is free again.
    assert!(runtime.whereis("flaky").is_none());
    runtime
        .start(Arc::new(Counter), Value::Null, StartOptions::named("flaky"))
        .await
        .unwrap();
}

#[tokio::test]
async fn whereis_resolves_registered_names() {
    let runtime = Runtime::new();
    let server = runtime
        .start(Arc::new(Counter), json!(7), StartOptions::named("counter"))
        .await
        .unwrap();

    let found = runtime.whereis("counter").unwrap();
    assert_eq!(found.id, server.id);

    runtime.stop(&server, ExitReason::Normal).await.unwrap();
    assert!(runtime.whereis("counter").is_none());
}

#[tokio::test]
async fn stop_waits_until_process_is_gone() {
    let runtime = Runtime::new();
    let server = start_counter(&runtime).await;

    runtime.stop(&server, ExitReason::Normal).await.unwrap();
    assert_eq!(runtime.status(&server), None);
    assert_eq!(runtime.process_count(), 0);
}

#[tokio::test]
async fn init_args_become_initial_state() {
    let runtime = Runtime::new();
    let server = runtime
        .start(Arc::new(Counter), json!(41), StartOptions::default())
        .await
        .unwrap();
    runtime.cast(&server, json!("inc"));
    let reply = runtime.call(&server, json!("get"), None).await.unwrap();
    assert_eq!(reply, json!(42));
}
