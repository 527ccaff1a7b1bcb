// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote call/cast/spawn/stop semantics.

use super::*;

#[tokio::test]
async fn remote_spawn_then_call_and_cast() {
    let a = start_node("a", &[]).await;
    let b = start_node("b", &[&a]).await;
    wait_connected(&b, 1).await;

    let server = b
        .spawn(a.node_id(), "counter", json!(0), RemoteSpawnOptions::default())
        .await
        .unwrap();
    assert_eq!(server.node.as_ref(), Some(a.node_id()));

    for _ in 0..3 {
        b.cast(&server, json!("inc"));
    }
    let reply = b.call(&server, json!("get"), None).await.unwrap();
    assert_eq!(reply, json!(3));

    a.stop().await;
    b.stop().await;
}

#[tokio::test]
async fn casts_from_one_sender_arrive_in_order() {
    let a = start_node("a", &[]).await;
    let b = start_node("b", &[&a]).await;
    wait_connected(&b, 1).await;

    let server = b
        .spawn(a.node_id(), "recorder", Value::Null, RemoteSpawnOptions::default())
        .await
        .unwrap();
    for i in 0..50 {
        b.cast(&server, json!(i));
    }

    let log = b.call(&server, json!("log"), None).await.unwrap();
    let log = log.as_array().unwrap();
    assert_eq!(log.len(), 50);
    for (i, entry) in log.iter().enumerate() {
        assert_eq!(entry, &json!(["cast", i]));
    }

    a.stop().await;
    b.stop().await;
}

#[tokio::test]
async fn spawn_of_unknown_behavior_fails_typed() {
    let a = start_node("a", &[]).await;
    let b = start_node("b", &[&a]).await;
    wait_connected(&b, 1).await;

    let err = b
        .spawn(a.node_id(), "nonexistent", Value::Null, RemoteSpawnOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::BehaviorNotFound { ref name, .. } if name == "nonexistent"));

    a.stop().await;
    b.stop().await;
}

#[tokio::test]
async fn call_to_dead_remote_server_fails_typed() {
    let a = start_node("a", &[]).await;
    let b = start_node("b", &[&a]).await;
    wait_connected(&b, 1).await;

    let server = b
        .spawn(a.node_id(), "counter", json!(0), RemoteSpawnOptions::default())
        .await
        .unwrap();
    assert!(b
        .stop_server(&server, ExitReason::Normal, Duration::from_millis(1_000))
        .await
        .unwrap());

    let err = b.call(&server, json!("get"), None).await.unwrap_err();
    assert!(matches!(err, RemoteError::RemoteServerNotRunning { .. }));

    // Stopping again reports "already gone".
    assert!(!b
        .stop_server(&server, ExitReason::Normal, Duration::from_millis(1_000))
        .await
        .unwrap());

    a.stop().await;
    b.stop().await;
}

#[tokio::test]
async fn slow_remote_call_times_out_typed() {
    let a = start_node("a", &[]).await;
    let b = start_node("b", &[&a]).await;
    wait_connected(&b, 1).await;

    a.catalog().register("slow", Arc::new(hive_runtime::test_support::Slow));
    let server = b
        .spawn(a.node_id(), "slow", Value::Null, RemoteSpawnOptions::default())
        .await
        .unwrap();

    let err = b
        .call(&server, json!({"delay_ms": 2_000}), Some(Duration::from_millis(100)))
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::RemoteCallTimeout { .. }), "got {err:?}");

    a.stop().await;
    b.stop().await;
}

#[tokio::test]
async fn calls_to_unreachable_peers_fail_fast() {
    let a = start_node("a", &[]).await;
    let b = start_node("b", &[&a]).await;
    wait_connected(&b, 1).await;

    let ghost: hive_core::NodeId = "ghost@127.0.0.1:1".parse().unwrap();
    let target = ServerRef::remote(hive_core::ServerId::new(), ghost.clone());
    let err = b.call(&target, Value::Null, None).await.unwrap_err();
    assert_eq!(
        err,
        RemoteError::Cluster(ClusterError::NodeNotReachable { node: ghost })
    );

    a.stop().await;
    b.stop().await;
}

#[tokio::test]
async fn spawn_with_local_registration_names_the_server() {
    let a = start_node("a", &[]).await;
    let b = start_node("b", &[&a]).await;
    wait_connected(&b, 1).await;

    let options = RemoteSpawnOptions {
        name: Some("worker".into()),
        registration: SpawnRegistration::Local,
        ..RemoteSpawnOptions::default()
    };
    let server = b.spawn(a.node_id(), "counter", json!(0), options.clone()).await.unwrap();

    // Registered in a's local name table.
    let found = a.runtime().whereis("worker").unwrap();
    assert_eq!(found.id, server.id);

    // A second spawn under the same name conflicts.
    let err = b.spawn(a.node_id(), "counter", json!(0), options).await.unwrap_err();
    assert!(matches!(err, RemoteError::RemoteSpawnRegistration { .. }));

    a.stop().await;
    b.stop().await;
}

#[tokio::test]
async fn spawn_with_global_registration_is_cluster_visible() {
    let a = start_node("a", &[]).await;
    let b = start_node("b", &[&a]).await;
    wait_connected(&b, 1).await;
    wait_connected(&a, 1).await;

    let options = RemoteSpawnOptions {
        name: Some("svc".into()),
        registration: SpawnRegistration::Global,
        ..RemoteSpawnOptions::default()
    };
    let server = b.spawn(a.node_id(), "counter", json!(1), options).await.unwrap();

    // Both mirrors resolve the name to the same server.
    let seen = wait_for(Duration::from_millis(1_000), || b.global_whereis("svc")).await;
    assert_eq!(seen.unwrap().id, server.id);
    assert_eq!(a.global_whereis("svc").unwrap().id, server.id);

    a.stop().await;
    b.stop().await;
}

#[tokio::test]
async fn pending_calls_fail_when_the_peer_dies() {
    let a = start_node("a", &[]).await;
    let b = start_node("b", &[&a]).await;
    wait_connected(&b, 1).await;

    // A slow call in flight when the peer vanishes.
    let slow = Arc::new(hive_runtime::test_support::Slow);
    a.catalog().register("slow", slow);
    let server = b
        .spawn(a.node_id(), "slow", Value::Null, RemoteSpawnOptions::default())
        .await
        .unwrap();

    let b2 = b.clone();
    let call = tokio::spawn(async move {
        b2.call(&server, json!({"delay_ms": 5_000}), Some(Duration::from_millis(10_000)))
            .await
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    // a dies without a goodbye.
    a.inner.cancel.cancel();
    a.inner.stopped.store(true, std::sync::atomic::Ordering::SeqCst);

    let result = call.await.unwrap();
    assert!(
        matches!(
            result,
            Err(RemoteError::Cluster(ClusterError::NodeNotReachable { .. }))
        ),
        "expected NodeNotReachable, got {result:?}"
    );

    b.stop().await;
}
