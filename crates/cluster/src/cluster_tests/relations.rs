// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote monitors and links, including noconnection propagation.

use super::*;
use hive_core::MonitorId;

async fn spawn_counter(owner: &Cluster, host: &Cluster) -> ServerRef {
    owner
        .spawn(host.node_id(), "counter", json!(0), RemoteSpawnOptions::default())
        .await
        .unwrap()
}

/// A local watcher process on `cluster` to hang monitors off.
async fn local_watcher(cluster: &Cluster) -> ServerRef {
    hive_runtime::test_support::start_counter(cluster.runtime()).await
}

fn downs_for(
    events: &mut tokio::sync::mpsc::UnboundedReceiver<LifecycleEvent>,
    monitor_id: &MonitorId,
) -> Vec<(ServerRef, ExitReason)> {
    let mut downs = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let LifecycleEvent::ProcessDown { monitor_id: m, monitored, reason, .. } = event {
            if m == *monitor_id {
                downs.push((monitored, reason));
            }
        }
    }
    downs
}

#[tokio::test]
async fn remote_monitor_fires_once_on_target_stop() {
    let a = start_node("a", &[]).await;
    let b = start_node("b", &[&a]).await;
    wait_connected(&b, 1).await;

    let watcher = local_watcher(&b).await;
    let target = spawn_counter(&b, &a).await;
    let monitor_id = b.monitor(&watcher, &target).await.unwrap();

    let mut events = b.runtime().subscribe();
    a.runtime()
        .stop(&ServerRef::local(target.id), ExitReason::Normal)
        .await
        .unwrap();

    let down = wait_for(Duration::from_millis(2_000), || {
        let downs = downs_for(&mut events, &monitor_id);
        downs.into_iter().next()
    })
    .await;
    let (monitored, reason) = down.expect("process_down should arrive");
    assert_eq!(monitored.id, target.id);
    assert_eq!(reason, ExitReason::Normal);

    a.stop().await;
    b.stop().await;
}

#[tokio::test]
async fn monitoring_a_dead_remote_target_yields_noproc() {
    let a = start_node("a", &[]).await;
    let b = start_node("b", &[&a]).await;
    wait_connected(&b, 1).await;

    let watcher = local_watcher(&b).await;
    let target = spawn_counter(&b, &a).await;
    a.runtime()
        .stop(&ServerRef::local(target.id), ExitReason::Normal)
        .await
        .unwrap();

    let mut events = b.runtime().subscribe();
    let monitor_id = b.monitor(&watcher, &target).await.unwrap();

    let down = wait_for(Duration::from_millis(1_000), || {
        downs_for(&mut events, &monitor_id).into_iter().next()
    })
    .await;
    assert_eq!(down.expect("immediate down").1, ExitReason::Noproc);

    a.stop().await;
    b.stop().await;
}

#[tokio::test]
async fn demonitor_tears_down_both_sides() {
    let a = start_node("a", &[]).await;
    let b = start_node("b", &[&a]).await;
    wait_connected(&b, 1).await;

    let watcher = local_watcher(&b).await;
    let target = spawn_counter(&b, &a).await;
    let monitor_id = b.monitor(&watcher, &target).await.unwrap();

    assert!(b.demonitor(&monitor_id));
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut events = b.runtime().subscribe();
    a.runtime()
        .stop(&ServerRef::local(target.id), ExitReason::Normal)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(downs_for(&mut events, &monitor_id).is_empty());

    a.stop().await;
    b.stop().await;
}

#[tokio::test]
async fn node_loss_fires_noconnection_exactly_once_per_monitor() {
    let a = start_node("a", &[]).await;
    let b = start_node("b", &[&a]).await;
    wait_connected(&b, 1).await;

    let watcher = local_watcher(&b).await;
    let target = spawn_counter(&b, &a).await;
    let monitor_id = b.monitor(&watcher, &target).await.unwrap();

    let mut events = b.runtime().subscribe();
    // a vanishes without a goodbye.
    a.inner.cancel.cancel();
    a.inner.stopped.store(true, std::sync::atomic::Ordering::SeqCst);
    wait_disconnected(&b, &a).await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    let downs = downs_for(&mut events, &monitor_id);
    assert_eq!(downs.len(), 1, "exactly one down per monitor");
    assert_eq!(downs[0].1, ExitReason::Noconnection);

    b.stop().await;
}

/// S6: remote link with a trapping coordinator.
#[tokio::test]
async fn remote_link_delivers_trapped_exit_and_noconnection() {
    let a = start_node("a", &[]).await;
    let b = start_node("b", &[&a]).await;
    wait_connected(&b, 1).await;

    // Coordinator on b, trapping exits, records info messages.
    let coordinator = b
        .runtime()
        .start(
            Arc::new(hive_runtime::test_support::Recorder),
            Value::Null,
            StartOptions::default().trap_exit(true),
        )
        .await
        .unwrap();
    let worker = spawn_counter(&b, &a).await;
    b.link(&coordinator, &worker).await.unwrap();

    // Crash the worker on its home node.
    let _ = a.runtime().call(&ServerRef::local(worker.id), json!("boom"), None).await;

    let mut log = None;
    for _ in 0..200 {
        let reply = b.runtime().call(&coordinator, json!("log"), None).await.unwrap();
        if !reply.as_array().unwrap().is_empty() {
            log = Some(reply);
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let log = log.expect("coordinator should receive the EXIT info message");
    let entries = log.as_array().unwrap();
    assert_eq!(entries[0][0], json!("info"));
    assert_eq!(entries[0][1]["type"], json!("EXIT"));
    assert_eq!(entries[0][1]["from"]["id"], json!(worker.id.as_str()));
    assert_eq!(entries[0][1]["reason"]["kind"], json!("error"));
    assert_eq!(entries[0][1]["reason"]["message"], json!("boom"));
    assert!(b.runtime().is_alive(&coordinator), "trapping peer survives");

    a.stop().await;
    b.stop().await;
}

#[tokio::test]
async fn remote_link_kills_non_trapping_peer() {
    let a = start_node("a", &[]).await;
    let b = start_node("b", &[&a]).await;
    wait_connected(&b, 1).await;

    let local = local_watcher(&b).await;
    let worker = spawn_counter(&b, &a).await;
    b.link(&local, &worker).await.unwrap();

    let _ = a.runtime().call(&ServerRef::local(worker.id), json!("boom"), None).await;

    let gone = wait_for(Duration::from_millis(2_000), || {
        (!b.runtime().is_alive(&local)).then_some(())
    })
    .await;
    assert!(gone.is_some(), "non-trapping peer should terminate");

    a.stop().await;
    b.stop().await;
}

#[tokio::test]
async fn node_loss_synthesizes_noconnection_exit_for_links() {
    let a = start_node("a", &[]).await;
    let b = start_node("b", &[&a]).await;
    wait_connected(&b, 1).await;

    let coordinator = b
        .runtime()
        .start(
            Arc::new(hive_runtime::test_support::Recorder),
            Value::Null,
            StartOptions::default().trap_exit(true),
        )
        .await
        .unwrap();
    let worker = spawn_counter(&b, &a).await;
    b.link(&coordinator, &worker).await.unwrap();

    a.inner.cancel.cancel();
    a.inner.stopped.store(true, std::sync::atomic::Ordering::SeqCst);
    wait_disconnected(&b, &a).await;

    let mut log = None;
    for _ in 0..200 {
        let reply = b.runtime().call(&coordinator, json!("log"), None).await.unwrap();
        if !reply.as_array().unwrap().is_empty() {
            log = Some(reply);
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let log = log.expect("noconnection EXIT should arrive");
    let entries = log.as_array().unwrap();
    assert_eq!(entries[0][1]["type"], json!("EXIT"));
    assert_eq!(entries[0][1]["reason"]["kind"], json!("noconnection"));

    b.stop().await;
}

#[tokio::test]
async fn normal_remote_exit_removes_link_silently() {
    let a = start_node("a", &[]).await;
    let b = start_node("b", &[&a]).await;
    wait_connected(&b, 1).await;

    let local = local_watcher(&b).await;
    let worker = spawn_counter(&b, &a).await;
    b.link(&local, &worker).await.unwrap();

    a.runtime()
        .stop(&ServerRef::local(worker.id), ExitReason::Normal)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(b.runtime().is_alive(&local), "normal exit does not propagate");
    assert!(b.inner.links.lock().is_empty(), "link removed on both sides");

    a.stop().await;
    b.stop().await;
}
