// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use hive_core::{ExitReason, ServerId, ServerRef};

fn stopped(id: &str) -> LifecycleEvent {
    LifecycleEvent::Stopped {
        server: ServerRef::local(ServerId::from_string(id)),
        reason: ExitReason::Normal,
    }
}

#[tokio::test]
async fn all_subscribers_receive_each_event() {
    let hub = EventHub::new();
    let mut a = hub.subscribe();
    let mut b = hub.subscribe();

    hub.emit(stopped("srv-1"));

    assert_eq!(a.recv().await.unwrap(), stopped("srv-1"));
    assert_eq!(b.recv().await.unwrap(), stopped("srv-1"));
}

#[tokio::test]
async fn dropped_subscribers_are_pruned() {
    let hub = EventHub::new();
    let a = hub.subscribe();
    let _b = hub.subscribe();
    assert_eq!(hub.subscriber_count(), 2);

    drop(a);
    hub.emit(stopped("srv-1"));
    assert_eq!(hub.subscriber_count(), 1);
}

#[tokio::test]
async fn events_arrive_in_emit_order() {
    let hub = EventHub::new();
    let mut rx = hub.subscribe();

    hub.emit(stopped("srv-1"));
    hub.emit(stopped("srv-2"));

    assert_eq!(rx.recv().await.unwrap(), stopped("srv-1"));
    assert_eq!(rx.recv().await.unwrap(), stopped("srv-2"));
}
