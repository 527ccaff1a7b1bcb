// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! S5 and S6 through the public cluster API: two nodes on loopback.

use crate::prelude::{eventually, Coordinator, Counter};
use hive_cluster::{
    BehaviorCatalog, Cluster, ClusterConfig, ClusterEvent, RemoteSpawnOptions,
};
use hive_core::{ServerId, ServerRef};
use hive_runtime::{Runtime, StartOptions};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

fn catalog() -> BehaviorCatalog {
    let catalog = BehaviorCatalog::new();
    catalog.register("counter", Arc::new(Counter));
    catalog.register("coordinator", Arc::new(Coordinator));
    catalog
}

async fn start_pair() -> (Cluster, Cluster) {
    let a = Cluster::start(
        Runtime::new(),
        catalog(),
        ClusterConfig::new("a")
            .host("127.0.0.1")
            .port(0)
            .heartbeat_interval(Duration::from_millis(100)),
    )
    .await
    .unwrap();
    let b = Cluster::start(
        Runtime::new(),
        catalog(),
        ClusterConfig::new("b")
            .host("127.0.0.1")
            .port(0)
            .heartbeat_interval(Duration::from_millis(100))
            .seed(a.node_id().to_string()),
    )
    .await
    .unwrap();

    eventually(Duration::from_millis(3_000), || {
        (a.connected_nodes().len() == 1 && b.connected_nodes().len() == 1).then_some(())
    })
    .await
    .expect("nodes should connect");
    (a, b)
}

/// S5: simultaneous global registration converges on one owner.
#[tokio::test]
async fn global_name_conflict_resolves_to_one_owner() {
    let (a, b) = start_pair().await;
    let mut a_events = a.subscribe();
    let mut b_events = b.subscribe();

    a.global_register("svc", &ServerRef::local(ServerId::new())).unwrap();
    b.global_register("svc", &ServerRef::local(ServerId::new())).unwrap();

    let owner = eventually(Duration::from_millis(3_000), || {
        let a_owner = a.global_owner("svc")?;
        let b_owner = b.global_owner("svc")?;
        (a_owner == b_owner).then_some(a_owner)
    })
    .await
    .expect("mirrors must agree on the owner");

    // The losing registrant hears conflict_resolved with the pair.
    let conflict = eventually(Duration::from_millis(2_000), || {
        for events in [&mut a_events, &mut b_events] {
            while let Ok(event) = events.try_recv() {
                if let ClusterEvent::ConflictResolved { name, winner, loser } = event {
                    return Some((name, winner, loser));
                }
            }
        }
        None
    })
    .await
    .expect("conflict_resolved event");
    assert_eq!(conflict.0, "svc");
    assert_eq!(conflict.1, owner);
    assert_ne!(conflict.1, conflict.2);

    a.stop().await;
    b.stop().await;
}

/// S6: remote link with trap_exit, then node loss.
#[tokio::test]
async fn remote_link_traps_exit_then_noconnection() {
    let (a, b) = start_pair().await;

    // coordinator on a (trap_exit), worker on b.
    let coordinator = a
        .runtime()
        .start(
            Arc::new(Coordinator),
            Value::Null,
            StartOptions::named("coord").trap_exit(true),
        )
        .await
        .unwrap();
    let worker = a
        .spawn(b.node_id(), "counter", json!(0), RemoteSpawnOptions::default())
        .await
        .unwrap();
    a.link(&coordinator, &worker).await.unwrap();

    // Stop the worker with an error reason.
    let _ = b.runtime().call(&ServerRef::local(worker.id), json!("boom"), None).await;

    let mut exits = Value::Null;
    for _ in 0..200 {
        exits = a.runtime().call(&coordinator, json!("peek"), None).await.unwrap();
        if !exits.as_array().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let log = exits.as_array().unwrap();
    assert_eq!(log[0]["type"], json!("EXIT"));
    assert_eq!(log[0]["from"]["id"], json!(worker.id.as_str()));
    assert_eq!(log[0]["reason"], json!({"kind": "error", "message": "boom"}));
    assert!(a.runtime().is_alive(&coordinator), "coord still running");

    // Set up a second link, then lose the node entirely.
    let worker2 = a
        .spawn(b.node_id(), "counter", json!(0), RemoteSpawnOptions::default())
        .await
        .unwrap();
    a.link(&coordinator, &worker2).await.unwrap();
    b.stop().await;

    let mut exits = Value::Null;
    for _ in 0..200 {
        exits = a.runtime().call(&coordinator, json!("peek"), None).await.unwrap();
        if exits.as_array().unwrap().len() >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let log = exits.as_array().unwrap();
    assert!(log.len() >= 2, "noconnection EXIT should arrive after node loss");
    assert_eq!(log[1]["type"], json!("EXIT"));
    assert_eq!(log[1]["reason"]["kind"], json!("noconnection"));

    a.stop().await;
}
