// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Monitor semantics: one-way, exactly-once, noproc on dead targets.

use super::*;

async fn drain_downs(
    events: &mut tokio::sync::mpsc::UnboundedReceiver<LifecycleEvent>,
) -> Vec<LifecycleEvent> {
    // Give in-flight emits a moment to land.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let mut downs = Vec::new();
    while let Ok(event) = events.try_recv() {
        if matches!(event, LifecycleEvent::ProcessDown { .. }) {
            downs.push(event);
        }
    }
    downs
}

#[tokio::test]
async fn target_termination_fires_exactly_one_down() {
    let runtime = Runtime::new();
    let watcher = start_counter(&runtime).await;
    let target = start_counter(&runtime).await;
    let mut events = runtime.subscribe();

    let monitor_id = runtime.monitor(&watcher, &target);
    runtime.stop(&target, ExitReason::Normal).await.unwrap();

    let downs = drain_downs(&mut events).await;
    assert_eq!(downs.len(), 1);
    let LifecycleEvent::ProcessDown { watcher: w, monitor_id: m, monitored, reason } =
        &downs[0]
    else {
        panic!("expected ProcessDown");
    };
    assert_eq!(w.id, watcher.id);
    assert_eq!(*m, monitor_id);
    assert_eq!(monitored.id, target.id);
    assert_eq!(*reason, ExitReason::Normal);
}

#[tokio::test]
async fn monitoring_a_dead_target_fires_noproc_immediately() {
    let runtime = Runtime::new();
    let watcher = start_counter(&runtime).await;
    let target = start_counter(&runtime).await;
    runtime.stop(&target, ExitReason::Normal).await.unwrap();

    let mut events = runtime.subscribe();
    runtime.monitor(&watcher, &target);

    let downs = drain_downs(&mut events).await;
    assert_eq!(downs.len(), 1);
    let LifecycleEvent::ProcessDown { reason, .. } = &downs[0] else {
        panic!("expected ProcessDown");
    };
    assert_eq!(*reason, ExitReason::Noproc);
}

#[tokio::test]
async fn demonitor_suppresses_the_down_event() {
    let runtime = Runtime::new();
    let watcher = start_counter(&runtime).await;
    let target = start_counter(&runtime).await;
    let mut events = runtime.subscribe();

    let monitor_id = runtime.monitor(&watcher, &target);
    assert!(runtime.demonitor(&monitor_id));
    runtime.stop(&target, ExitReason::Normal).await.unwrap();

    assert!(drain_downs(&mut events).await.is_empty());
    // Second demonitor is a no-op.
    assert!(!runtime.demonitor(&monitor_id));
}

#[tokio::test]
async fn watcher_death_removes_its_monitors() {
    let runtime = Runtime::new();
    let watcher = start_counter(&runtime).await;
    let target = start_counter(&runtime).await;

    runtime.monitor(&watcher, &target);
    runtime.stop(&watcher, ExitReason::Normal).await.unwrap();

    let mut events = runtime.subscribe();
    runtime.stop(&target, ExitReason::Normal).await.unwrap();
    assert!(drain_downs(&mut events).await.is_empty());
}

#[tokio::test]
async fn crash_reason_rides_on_the_down_event() {
    let runtime = Runtime::new();
    let watcher = start_counter(&runtime).await;
    let target = start_counter(&runtime).await;
    let mut events = runtime.subscribe();

    runtime.monitor(&watcher, &target);
    let _ = runtime.call(&target, json!("boom"), None).await;

    let downs = drain_downs(&mut events).await;
    assert_eq!(downs.len(), 1);
    let LifecycleEvent::ProcessDown { reason, .. } = &downs[0] else {
        panic!("expected ProcessDown");
    };
    assert_eq!(*reason, ExitReason::error("boom"));
}
