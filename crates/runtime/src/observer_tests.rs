// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::behavior::StartOptions;
use crate::supervisor::{ChildSpec, Strategy, Supervisor, SupervisorOptions};
use crate::test_support::{start_counter, Counter};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn snapshot_reflects_processes_and_totals() {
    let runtime = Runtime::new();
    let a = start_counter(&runtime).await;
    let _b = runtime
        .start(Arc::new(Counter), json!(0), StartOptions::named("counter"))
        .await
        .unwrap();

    runtime.cast(&a, json!("inc"));
    runtime.call(&a, json!("get"), None).await.unwrap();

    let snapshot = ObserverSnapshot::capture(&runtime);
    assert_eq!(snapshot.total_processes, 2);
    assert_eq!(snapshot.total_messages, 2);

    let named: Vec<_> =
        snapshot.servers.iter().filter(|s| s.name.as_deref() == Some("counter")).collect();
    assert_eq!(named.len(), 1);
    assert_eq!(named[0].status, ProcessStatus::Running);
}

#[tokio::test]
async fn snapshot_includes_supervisor_tree() {
    let runtime = Runtime::new();
    let supervisor = Supervisor::start(
        runtime.clone(),
        SupervisorOptions::new(Strategy::OneForOne)
            .name("root")
            .child(ChildSpec::new("a", Arc::new(Counter)))
            .child(ChildSpec::new("b", Arc::new(Counter))),
    )
    .await
    .unwrap();

    let snapshot = ObserverSnapshot::capture(&runtime);
    assert_eq!(snapshot.supervisors.len(), 1);
    let stat = &snapshot.supervisors[0];
    assert_eq!(stat.name.as_deref(), Some("root"));
    assert_eq!(stat.strategy, "one_for_one");
    assert_eq!(stat.child_count, 2);
    assert_eq!(stat.running_children, 2);

    assert_eq!(snapshot.tree.len(), 1);
    assert_eq!(snapshot.tree[0].label, "root");
    assert_eq!(snapshot.tree[0].children.len(), 2);

    supervisor.stop().await;
}

#[tokio::test]
async fn dropped_supervisors_leave_the_snapshot() {
    let runtime = Runtime::new();
    {
        let supervisor = Supervisor::start(
            runtime.clone(),
            SupervisorOptions::new(Strategy::OneForOne)
                .child(ChildSpec::new("a", Arc::new(Counter))),
        )
        .await
        .unwrap();
        supervisor.stop().await;
    }

    let snapshot = ObserverSnapshot::capture(&runtime);
    assert!(snapshot.supervisors.is_empty());
}

#[tokio::test]
async fn memory_stats_are_populated() {
    let runtime = Runtime::new();
    let snapshot = ObserverSnapshot::capture(&runtime);
    assert!(snapshot.memory.total_bytes > 0);
    assert!(snapshot.memory.used_bytes > 0);
    assert!(snapshot.timestamp_ms > 0);
}
