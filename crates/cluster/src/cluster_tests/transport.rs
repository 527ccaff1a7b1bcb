// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection lifecycle: handshake, gossip mesh, heartbeat failure
//! detection, graceful departure, secrets.

use super::*;

#[tokio::test]
async fn seeded_nodes_connect_both_ways() {
    let a = start_node("a", &[]).await;
    let b = start_node("b", &[&a]).await;

    wait_connected(&a, 1).await;
    wait_connected(&b, 1).await;
    assert_eq!(a.connected_nodes()[0].id, *b.node_id());
    assert_eq!(b.connected_nodes()[0].id, *a.node_id());

    a.stop().await;
    b.stop().await;
}

#[tokio::test]
async fn gossip_meshes_three_nodes_from_one_seed() {
    let a = start_node("a", &[]).await;
    let b = start_node("b", &[&a]).await;
    wait_connected(&b, 1).await;

    // c only knows a; it must learn about b through gossip.
    let c = start_node("c", &[&a]).await;
    wait_connected(&c, 2).await;
    wait_connected(&a, 2).await;
    wait_connected(&b, 2).await;

    for cluster in [&a, &b, &c] {
        cluster.stop().await;
    }
}

#[tokio::test]
async fn node_up_events_fire_in_transition_order() {
    let a = start_node("a", &[]).await;
    let mut events = a.subscribe();
    let b = start_node("b", &[&a]).await;
    wait_connected(&a, 1).await;

    let mut saw_status = false;
    let mut saw_up = false;
    while let Ok(event) = events.try_recv() {
        match event {
            ClusterEvent::StatusChange { node, status: NodeStatus::Connected }
                if node == *b.node_id() =>
            {
                saw_status = true;
                assert!(!saw_up, "status_change precedes node_up");
            }
            ClusterEvent::NodeUp { node } if node.id == *b.node_id() => saw_up = true,
            _ => {}
        }
    }
    assert!(saw_status && saw_up);

    a.stop().await;
    b.stop().await;
}

#[tokio::test]
async fn graceful_stop_announces_node_down() {
    let a = start_node("a", &[]).await;
    let b = start_node("b", &[&a]).await;
    wait_connected(&a, 1).await;

    let mut events = a.subscribe();
    b.stop().await;
    wait_disconnected(&a, &b).await;

    let down = wait_for(Duration::from_millis(1_000), || {
        while let Ok(event) = events.try_recv() {
            if let ClusterEvent::NodeDown { node, reason } = event {
                return Some((node, reason));
            }
        }
        None
    })
    .await;
    let (node, reason) = down.expect("node_down event");
    assert_eq!(node, *b.node_id());
    assert_eq!(reason, "shutdown");

    a.stop().await;
}

#[tokio::test]
async fn dead_peer_is_marked_down_without_goodbye() {
    let a = start_node("a", &[]).await;
    let b = start_node("b", &[&a]).await;
    wait_connected(&a, 1).await;

    // Kill b's networking without the graceful node_down broadcast;
    // a notices via the closed socket or missed heartbeats.
    b.inner.cancel.cancel();
    b.inner.stopped.store(true, std::sync::atomic::Ordering::SeqCst);

    wait_disconnected(&a, &b).await;
    a.stop().await;
}

#[tokio::test]
async fn mismatched_secrets_never_connect() {
    let runtime = Runtime::new();
    let a = Cluster::start(
        runtime.clone(),
        test_catalog(),
        ClusterConfig::new("a")
            .host("127.0.0.1")
            .port(0)
            .cluster_secret("left"),
    )
    .await
    .unwrap();

    let b = Cluster::start(
        Runtime::new(),
        test_catalog(),
        ClusterConfig::new("b")
            .host("127.0.0.1")
            .port(0)
            .cluster_secret("right")
            .reconnect_delays(Duration::from_millis(50), Duration::from_millis(100))
            .seed(a.node_id().to_string()),
    )
    .await
    .unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(a.connected_nodes().is_empty());
    assert!(b.connected_nodes().is_empty());

    a.stop().await;
    b.stop().await;
}

#[tokio::test]
async fn matching_secrets_authenticate_frames() {
    let a = Cluster::start(
        Runtime::new(),
        test_catalog(),
        ClusterConfig::new("a")
            .host("127.0.0.1")
            .port(0)
            .cluster_secret("shared")
            .heartbeat_interval(Duration::from_millis(100)),
    )
    .await
    .unwrap();
    let b = Cluster::start(
        Runtime::new(),
        test_catalog(),
        ClusterConfig::new("b")
            .host("127.0.0.1")
            .port(0)
            .cluster_secret("shared")
            .heartbeat_interval(Duration::from_millis(100))
            .seed(a.node_id().to_string()),
    )
    .await
    .unwrap();

    wait_connected(&a, 1).await;

    // Authenticated traffic flows: spawn remotely over the secured
    // connection.
    let server = b
        .spawn(a.node_id(), "counter", json!(5), RemoteSpawnOptions::default())
        .await
        .unwrap();
    assert_eq!(b.call(&server, json!("get"), None).await.unwrap(), json!(5));

    a.stop().await;
    b.stop().await;
}

#[tokio::test]
async fn stopped_cluster_refuses_operations() {
    let a = start_node("a", &[]).await;
    let node = a.node_id().clone();
    a.stop().await;

    let target = ServerRef::remote(hive_core::ServerId::new(), node.clone());
    let err = a.call(&target, Value::Null, None).await.unwrap_err();
    assert_eq!(err, RemoteError::Cluster(ClusterError::ClusterNotStarted));
}
