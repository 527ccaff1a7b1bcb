// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::id::ServerId;

fn server() -> ServerRef {
    ServerRef::local(ServerId::from_string("srv-test"))
}

#[test]
fn events_tag_with_type_field() {
    let event = LifecycleEvent::Stopped { server: server(), reason: ExitReason::Normal };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "process:stopped");
    assert_eq!(json["server"]["id"], "srv-test");
    assert_eq!(json["reason"]["kind"], "normal");
}

#[test]
fn process_down_round_trips() {
    let event = LifecycleEvent::ProcessDown {
        watcher: server(),
        monitor_id: MonitorId::from_string("mon-1"),
        monitored: ServerRef::local(ServerId::from_string("srv-gone")),
        reason: ExitReason::Noconnection,
    };
    let json = serde_json::to_value(&event).unwrap();
    let back: LifecycleEvent = serde_json::from_value(json).unwrap();
    assert_eq!(back, event);
}

#[test]
fn subject_is_watcher_for_down_events() {
    let event = LifecycleEvent::ProcessDown {
        watcher: server(),
        monitor_id: MonitorId::new(),
        monitored: ServerRef::local(ServerId::from_string("srv-gone")),
        reason: ExitReason::Noproc,
    };
    assert_eq!(event.subject().id, "srv-test");
}

#[test]
fn metadata_omits_absent_optionals() {
    let meta = StateMetadata {
        persisted_at_ms: 1,
        server_id: ServerId::from_string("srv-test"),
        server_name: None,
        schema_version: 1,
        checksum: None,
    };
    let json = serde_json::to_value(&meta).unwrap();
    assert!(json.get("server_name").is_none());
    assert!(json.get("checksum").is_none());
    assert_eq!(json["schema_version"], 1);
}
