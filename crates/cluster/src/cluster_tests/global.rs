// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Global registry: replication, conflicts, sync, node-down cleanup.

use super::*;
use hive_core::ServerId;

fn local_ref() -> ServerRef {
    ServerRef::local(ServerId::new())
}

#[tokio::test]
async fn registrations_replicate_to_every_mirror() {
    let a = start_node("a", &[]).await;
    let b = start_node("b", &[&a]).await;
    wait_connected(&a, 1).await;

    a.global_register("svc", &local_ref()).unwrap();

    let replicated =
        wait_for(Duration::from_millis(1_000), || b.global_whereis("svc")).await;
    assert!(replicated.is_some());
    assert_eq!(b.global_owner("svc").as_ref(), Some(a.node_id()));
    assert_eq!(a.global_owner("svc").as_ref(), Some(a.node_id()));

    a.stop().await;
    b.stop().await;
}

#[tokio::test]
async fn register_unregister_register_round_trips() {
    let a = start_node("a", &[]).await;
    a.global_register("svc", &local_ref()).unwrap();
    assert!(a.global_unregister("svc"));
    assert!(!a.global_unregister("svc"));
    a.global_register("svc", &local_ref()).unwrap();
    assert!(a.global_is_registered("svc"));
    a.stop().await;
}

#[tokio::test]
async fn second_registrant_sees_conflict_locally() {
    let a = start_node("a", &[]).await;
    let b = start_node("b", &[&a]).await;
    wait_connected(&a, 1).await;

    a.global_register("svc", &local_ref()).unwrap();
    wait_for(Duration::from_millis(1_000), || b.global_whereis("svc"))
        .await
        .expect("replicated");

    let err = b.global_register("svc", &local_ref()).unwrap_err();
    assert_eq!(
        err,
        GlobalError::GlobalNameConflict {
            name: "svc".into(),
            existing_node: a.node_id().clone()
        }
    );

    a.stop().await;
    b.stop().await;
}

/// S5: simultaneous registration converges on one owner and the loser
/// hears about it.
#[tokio::test]
async fn simultaneous_registration_converges_with_conflict_event() {
    let a = start_node("a", &[]).await;
    let b = start_node("b", &[&a]).await;
    wait_connected(&a, 1).await;
    wait_connected(&b, 1).await;

    let mut a_events = a.subscribe();
    let mut b_events = b.subscribe();

    // Register on both nodes in the same instant, before gossip can
    // replicate either entry.
    a.global_register("svc", &local_ref()).unwrap();
    b.global_register("svc", &local_ref()).unwrap();

    // Both mirrors converge on the same owner.
    let owner = wait_for(Duration::from_millis(2_000), || {
        let a_owner = a.global_owner("svc")?;
        let b_owner = b.global_owner("svc")?;
        (a_owner == b_owner).then_some(a_owner)
    })
    .await
    .expect("mirrors should agree on one owner");
    assert!(owner == *a.node_id() || owner == *b.node_id());

    // Exactly one side lost and got a conflict_resolved event.
    let conflict = wait_for(Duration::from_millis(2_000), || {
        for events in [&mut a_events, &mut b_events] {
            while let Ok(event) = events.try_recv() {
                if let ClusterEvent::ConflictResolved { name, winner, loser } = event {
                    return Some((name, winner, loser));
                }
            }
        }
        None
    })
    .await;
    let (name, winner, loser) = conflict.expect("loser should hear conflict_resolved");
    assert_eq!(name, "svc");
    assert_eq!(winner, owner);
    assert_ne!(winner, loser);

    a.stop().await;
    b.stop().await;
}

#[tokio::test]
async fn late_joiners_sync_the_full_mirror() {
    let a = start_node("a", &[]).await;
    a.global_register("svc-1", &local_ref()).unwrap();
    a.global_register("svc-2", &local_ref()).unwrap();

    let b = start_node("b", &[&a]).await;
    let synced = wait_for(Duration::from_millis(2_000), || {
        (b.global_names().len() == 2).then_some(())
    })
    .await;
    assert!(synced.is_some(), "sync-on-connect should replicate both names");
    assert_eq!(b.global_names(), vec!["svc-1", "svc-2"]);

    a.stop().await;
    b.stop().await;
}

#[tokio::test]
async fn node_down_removes_its_registrations_everywhere() {
    let a = start_node("a", &[]).await;
    let b = start_node("b", &[&a]).await;
    wait_connected(&a, 1).await;

    a.global_register("owned-by-a", &local_ref()).unwrap();
    b.global_register("owned-by-b", &local_ref()).unwrap();
    wait_for(Duration::from_millis(1_000), || {
        (b.global_names().len() == 2 && a.global_names().len() == 2).then_some(())
    })
    .await
    .expect("both replicated");

    a.stop().await;
    wait_disconnected(&b, &a).await;

    let cleaned = wait_for(Duration::from_millis(1_000), || {
        (!b.global_is_registered("owned-by-a")).then_some(())
    })
    .await;
    assert!(cleaned.is_some(), "departed node's names should be removed");
    assert!(b.global_is_registered("owned-by-b"));

    b.stop().await;
}

#[tokio::test]
async fn lookups_never_touch_the_network() {
    let a = start_node("a", &[]).await;
    a.global_register("svc", &local_ref()).unwrap();

    // Same-tick lookups: the mirror answers synchronously.
    assert!(a.global_whereis("svc").is_some());
    assert!(a.global_lookup("missing").is_err());
    assert!(!a.global_is_registered("missing"));

    a.stop().await;
}
