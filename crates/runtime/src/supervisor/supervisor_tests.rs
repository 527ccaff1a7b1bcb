// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor strategies, restart policies, intensity, auto-shutdown.

use super::*;
use crate::behavior::Behavior;
use crate::test_support::{wait_for, Counter, FailsInit};
use async_trait::async_trait;
use serde_json::json;
use yare::parameterized;

#[parameterized(
    permanent_normal = { RestartPolicy::Permanent, ExitReason::Normal, true },
    permanent_error = { RestartPolicy::Permanent, ExitReason::error("x"), true },
    transient_normal = { RestartPolicy::Transient, ExitReason::Normal, false },
    transient_shutdown = { RestartPolicy::Transient, ExitReason::Shutdown, false },
    transient_error = { RestartPolicy::Transient, ExitReason::error("x"), true },
    transient_noconnection = { RestartPolicy::Transient, ExitReason::Noconnection, true },
    temporary_error = { RestartPolicy::Temporary, ExitReason::error("x"), false },
)]
fn restart_policy_matrix(policy: RestartPolicy, reason: ExitReason, restarts: bool) {
    assert_eq!(policy.should_restart(&reason), restarts);
}

fn counter_child(id: &str) -> ChildSpec {
    ChildSpec::new(id, Arc::new(Counter))
}

async fn crash(runtime: &Runtime, server: &ServerRef) {
    let _ = runtime.call(server, json!("boom"), None).await;
}

/// Wait until the child with `id` has a live instance different from
/// `old`.
async fn wait_replacement(
    supervisor: &Supervisor,
    id: &str,
    old: &ServerRef,
) -> Option<ServerRef> {
    let supervisor = supervisor.clone();
    let old = old.clone();
    let id = id.to_string();
    wait_for(Duration::from_millis(1_000), move || {
        supervisor.child(&id).filter(|s| s.id != old.id)
    })
    .await
}

#[tokio::test]
async fn one_for_one_restarts_only_the_failed_child() {
    let runtime = Runtime::new();
    let supervisor = Supervisor::start(
        runtime.clone(),
        SupervisorOptions::new(Strategy::OneForOne)
            .child(counter_child("a"))
            .child(counter_child("b")),
    )
    .await
    .unwrap();

    let a = supervisor.child("a").unwrap();
    let b = supervisor.child("b").unwrap();
    crash(&runtime, &a).await;

    let new_a = wait_replacement(&supervisor, "a", &a).await.expect("a restarted");
    // Fresh state, same id, new process
    assert_eq!(runtime.call(&new_a, json!("get"), None).await.unwrap(), json!(0));
    // Sibling untouched
    assert_eq!(supervisor.child("b").unwrap().id, b.id);
}

#[tokio::test]
async fn restart_within_100ms_with_fresh_state() {
    let runtime = Runtime::new();
    let supervisor = Supervisor::start(
        runtime.clone(),
        SupervisorOptions::new(Strategy::OneForOne).child(counter_child("counter")),
    )
    .await
    .unwrap();

    let first = supervisor.child("counter").unwrap();
    runtime.cast(&first, json!("inc"));
    crash(&runtime, &first).await;

    let started = tokio::time::Instant::now();
    let replacement = wait_replacement(&supervisor, "counter", &first)
        .await
        .expect("child restarted");
    assert!(started.elapsed() < Duration::from_millis(100));
    assert_eq!(runtime.call(&replacement, json!("get"), None).await.unwrap(), json!(0));
}

#[tokio::test]
async fn max_restarts_exceeded_stops_the_supervisor() {
    let runtime = Runtime::new();
    let supervisor = Supervisor::start(
        runtime.clone(),
        SupervisorOptions::new(Strategy::OneForOne)
            .child(counter_child("crashy"))
            .intensity(RestartIntensity {
                max_restarts: 3,
                within: Duration::from_millis(5_000),
            }),
    )
    .await
    .unwrap();

    // Crash 4 times within the window; the 4th crosses the bound.
    for _ in 0..4 {
        let Some(server) = wait_for(Duration::from_millis(1_000), || {
            supervisor.child("crashy")
        })
        .await
        else {
            break;
        };
        crash(&runtime, &server).await;
        // Give the supervisor a beat to process the stop event.
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let failure = wait_for(Duration::from_millis(1_000), || supervisor.failure()).await;
    assert!(matches!(
        failure,
        Some(SupervisorError::MaxRestartsExceeded { .. })
    ));
    assert!(!supervisor.is_running());
}

#[tokio::test]
async fn transient_children_restart_only_on_abnormal_exit() {
    let runtime = Runtime::new();
    let supervisor = Supervisor::start(
        runtime.clone(),
        SupervisorOptions::new(Strategy::OneForOne)
            .child(counter_child("t").restart(RestartPolicy::Transient)),
    )
    .await
    .unwrap();

    // Normal stop: no restart.
    let first = supervisor.child("t").unwrap();
    runtime.stop(&first, ExitReason::Normal).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(supervisor.child("t").is_none());

    // Revive manually, then crash: restarts.
    let revived = supervisor.restart_child("t").await.unwrap();
    crash(&runtime, &revived).await;
    assert!(wait_replacement(&supervisor, "t", &revived).await.is_some());
}

#[tokio::test]
async fn temporary_children_never_restart() {
    let runtime = Runtime::new();
    let supervisor = Supervisor::start(
        runtime.clone(),
        SupervisorOptions::new(Strategy::OneForOne)
            .child(counter_child("tmp").restart(RestartPolicy::Temporary)),
    )
    .await
    .unwrap();

    let first = supervisor.child("tmp").unwrap();
    crash(&runtime, &first).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(supervisor.child("tmp").is_none());
    assert!(supervisor.is_running());
}

#[tokio::test]
async fn one_for_all_restarts_every_child() {
    let runtime = Runtime::new();
    let supervisor = Supervisor::start(
        runtime.clone(),
        SupervisorOptions::new(Strategy::OneForAll)
            .child(counter_child("a"))
            .child(counter_child("b"))
            .child(counter_child("c")),
    )
    .await
    .unwrap();

    let b = supervisor.child("b").unwrap();
    let olds: Vec<ServerRef> =
        supervisor.children().into_iter().filter_map(|(_, s)| s).collect();
    crash(&runtime, &b).await;

    for (id, old) in [("a", &olds[0]), ("b", &olds[1]), ("c", &olds[2])] {
        assert!(
            wait_replacement(&supervisor, id, old).await.is_some(),
            "{id} should be a fresh instance"
        );
    }
}

#[tokio::test]
async fn rest_for_one_restarts_failed_and_later_children() {
    let runtime = Runtime::new();
    let supervisor = Supervisor::start(
        runtime.clone(),
        SupervisorOptions::new(Strategy::RestForOne)
            .child(counter_child("a"))
            .child(counter_child("b"))
            .child(counter_child("c")),
    )
    .await
    .unwrap();

    let a = supervisor.child("a").unwrap();
    let b = supervisor.child("b").unwrap();
    let c = supervisor.child("c").unwrap();
    crash(&runtime, &b).await;

    assert!(wait_replacement(&supervisor, "b", &b).await.is_some());
    assert!(wait_replacement(&supervisor, "c", &c).await.is_some());
    // "a" keeps its original instance.
    assert_eq!(supervisor.child("a").unwrap().id, a.id);
}

#[tokio::test]
async fn startup_failure_unwinds_started_siblings() {
    let runtime = Runtime::new();
    let err = Supervisor::start(
        runtime.clone(),
        SupervisorOptions::new(Strategy::OneForOne)
            .child(counter_child("ok"))
            .child(ChildSpec::new("bad", Arc::new(FailsInit))),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, SupervisorError::ChildStart { ref id, .. } if id == "bad"));
    // The successfully-started sibling was torn down.
    let drained =
        wait_for(Duration::from_millis(500), || (runtime.process_count() == 0).then_some(()))
            .await;
    assert!(drained.is_some());
}

#[tokio::test]
async fn duplicate_static_ids_are_rejected() {
    let runtime = Runtime::new();
    let err = Supervisor::start(
        runtime,
        SupervisorOptions::new(Strategy::OneForOne)
            .child(counter_child("dup"))
            .child(counter_child("dup")),
    )
    .await
    .unwrap_err();
    assert_eq!(err, SupervisorError::DuplicateChild { id: "dup".into() });
}

#[tokio::test]
async fn dynamic_start_child_rejects_duplicate_id() {
    let runtime = Runtime::new();
    let supervisor = Supervisor::start(
        runtime,
        SupervisorOptions::new(Strategy::OneForOne).child(counter_child("a")),
    )
    .await
    .unwrap();

    let err = supervisor.start_child(counter_child("a")).await.unwrap_err();
    assert_eq!(err, SupervisorError::DuplicateChild { id: "a".into() });

    supervisor.start_child(counter_child("b")).await.unwrap();
    assert_eq!(supervisor.children().len(), 2);
}

#[tokio::test]
async fn terminate_child_keeps_spec_for_restart() {
    let runtime = Runtime::new();
    let supervisor = Supervisor::start(
        runtime.clone(),
        SupervisorOptions::new(Strategy::OneForOne).child(counter_child("a")),
    )
    .await
    .unwrap();

    supervisor.terminate_child("a").await.unwrap();
    assert!(supervisor.child("a").is_none());
    assert!(supervisor.is_running());

    let revived = supervisor.restart_child("a").await.unwrap();
    assert!(runtime.is_alive(&revived));

    assert_eq!(
        supervisor.terminate_child("ghost").await.unwrap_err(),
        SupervisorError::ChildNotFound { id: "ghost".into() }
    );
}

#[tokio::test]
async fn simple_one_for_one_requires_template_and_no_children() {
    let runtime = Runtime::new();

    let err = Supervisor::start(
        runtime.clone(),
        SupervisorOptions::new(Strategy::SimpleOneForOne).child(counter_child("a")),
    )
    .await
    .unwrap_err();
    assert_eq!(err, SupervisorError::InvalidSimpleOneForOne);

    let err = Supervisor::start(
        runtime.clone(),
        SupervisorOptions::new(Strategy::SimpleOneForOne),
    )
    .await
    .unwrap_err();
    assert_eq!(err, SupervisorError::MissingChildTemplate);
}

#[tokio::test]
async fn simple_one_for_one_spawns_instances_from_template() {
    let runtime = Runtime::new();
    let supervisor = Supervisor::start(
        runtime.clone(),
        SupervisorOptions::new(Strategy::SimpleOneForOne)
            .child_template(counter_child("worker")),
    )
    .await
    .unwrap();

    let w1 = supervisor.start_template_child(json!(10)).await.unwrap();
    let w2 = supervisor.start_template_child(json!(20)).await.unwrap();
    assert_eq!(runtime.call(&w1, json!("get"), None).await.unwrap(), json!(10));
    assert_eq!(runtime.call(&w2, json!("get"), None).await.unwrap(), json!(20));

    // Instances restart individually.
    crash(&runtime, &w1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    let children = supervisor.children();
    assert_eq!(children.len(), 2);
    assert!(runtime.call(&w2, json!("get"), None).await.is_ok());

    // start_child with a spec is the static-strategy API.
    assert_eq!(
        supervisor.start_child(counter_child("x")).await.unwrap_err(),
        SupervisorError::InvalidSimpleOneForOne
    );
}

/// Terminates itself when cast "finish".
struct Finishing;

#[async_trait]
impl Behavior for Finishing {
    async fn init(&self, _args: Value) -> Result<Value, String> {
        Ok(Value::Null)
    }

    async fn handle_call(&self, _msg: Value, state: Value) -> Result<(Value, Value), String> {
        Ok((Value::Null, state))
    }

    async fn handle_cast(&self, msg: Value, state: Value) -> Result<Value, String> {
        if msg.as_str() == Some("finish") {
            return Err("done".to_string());
        }
        Ok(state)
    }
}

#[tokio::test]
async fn any_significant_auto_shutdown_stops_supervisor() {
    let runtime = Runtime::new();
    let supervisor = Supervisor::start(
        runtime.clone(),
        SupervisorOptions::new(Strategy::OneForOne)
            .child(counter_child("keeper"))
            .child(
                ChildSpec::new("main", Arc::new(Finishing))
                    .restart(RestartPolicy::Temporary)
                    .significant(true),
            )
            .auto_shutdown(AutoShutdown::AnySignificant),
    )
    .await
    .unwrap();

    let main = supervisor.child("main").unwrap();
    runtime.cast(&main, json!("finish"));

    let stopped = wait_for(Duration::from_millis(1_000), || {
        (!supervisor.is_running()).then_some(())
    })
    .await;
    assert!(stopped.is_some(), "supervisor should auto-shutdown");
    // All children (including the keeper) were stopped.
    let drained =
        wait_for(Duration::from_millis(500), || (runtime.process_count() == 0).then_some(()))
            .await;
    assert!(drained.is_some());
}

#[tokio::test]
async fn all_significant_waits_for_the_last_one() {
    let runtime = Runtime::new();
    let supervisor = Supervisor::start(
        runtime.clone(),
        SupervisorOptions::new(Strategy::OneForOne)
            .child(
                ChildSpec::new("s1", Arc::new(Finishing))
                    .restart(RestartPolicy::Temporary)
                    .significant(true),
            )
            .child(
                ChildSpec::new("s2", Arc::new(Finishing))
                    .restart(RestartPolicy::Temporary)
                    .significant(true),
            )
            .auto_shutdown(AutoShutdown::AllSignificant),
    )
    .await
    .unwrap();

    let s1 = supervisor.child("s1").unwrap();
    runtime.cast(&s1, json!("finish"));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(supervisor.is_running(), "one significant child still up");

    let s2 = supervisor.child("s2").unwrap();
    runtime.cast(&s2, json!("finish"));
    let stopped = wait_for(Duration::from_millis(1_000), || {
        (!supervisor.is_running()).then_some(())
    })
    .await;
    assert!(stopped.is_some());
}

#[tokio::test]
async fn stop_terminates_children_in_reverse_order() {
    let runtime = Runtime::new();
    let supervisor = Supervisor::start(
        runtime.clone(),
        SupervisorOptions::new(Strategy::OneForOne)
            .child(counter_child("a"))
            .child(counter_child("b")),
    )
    .await
    .unwrap();
    let a = supervisor.child("a").unwrap();
    let b = supervisor.child("b").unwrap();

    let mut events = runtime.subscribe();
    supervisor.stop().await;

    let mut order = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let hive_core::LifecycleEvent::Stopped { server, .. } = event {
            order.push(server.id);
        }
    }
    assert_eq!(order, vec![b.id, a.id], "reverse start order");
    assert!(!supervisor.is_running());
}
