// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Helpers for multi-node tests: loopback clusters on ephemeral ports.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use crate::catalog::BehaviorCatalog;
use crate::cluster::Cluster;
use crate::config::ClusterConfig;
use crate::node::NodeStatus;
use hive_runtime::test_support::{Counter, Recorder};
use hive_runtime::Runtime;
use std::sync::Arc;
use std::time::Duration;

pub(crate) fn test_catalog() -> BehaviorCatalog {
    let catalog = BehaviorCatalog::new();
    catalog.register("counter", Arc::new(Counter));
    catalog.register("recorder", Arc::new(Recorder));
    catalog
}

/// Opt-in test logging: `RUST_LOG=hive_cluster=debug cargo test ...`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Start a node on an ephemeral loopback port with fast heartbeats.
pub(crate) async fn start_node(name: &str, seeds: &[&Cluster]) -> Cluster {
    init_tracing();
    let mut config = ClusterConfig::new(name)
        .host("127.0.0.1")
        .port(0)
        .heartbeat_interval(Duration::from_millis(100))
        .reconnect_delays(Duration::from_millis(50), Duration::from_millis(500));
    for seed in seeds {
        config = config.seed(seed.node_id().to_string());
    }
    Cluster::start(Runtime::new(), test_catalog(), config).await.expect("start node")
}

/// Wait until `cluster` sees `count` connected peers.
pub(crate) async fn wait_connected(cluster: &Cluster, count: usize) {
    let ok = hive_runtime::test_support::wait_for(Duration::from_millis(3_000), || {
        (cluster.connected_nodes().len() >= count).then_some(())
    })
    .await;
    assert!(
        ok.is_some(),
        "{} never saw {count} connected peers (saw {})",
        cluster.node_id(),
        cluster.connected_nodes().len()
    );
}

/// Wait until `cluster` marks `peer` disconnected.
pub(crate) async fn wait_disconnected(cluster: &Cluster, peer: &Cluster) {
    let target = peer.node_id().clone();
    let ok = hive_runtime::test_support::wait_for(Duration::from_millis(3_000), || {
        cluster
            .nodes()
            .iter()
            .find(|n| n.id == target)
            .is_some_and(|n| n.status == NodeStatus::Disconnected)
            .then_some(())
    })
    .await;
    assert!(ok.is_some(), "{} never saw {} go down", cluster.node_id(), peer.node_id());
}
