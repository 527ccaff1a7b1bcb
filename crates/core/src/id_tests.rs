// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::node::NodeId;
use std::collections::HashMap;

#[test]
fn generated_ids_carry_prefix_and_fit_buffer() {
    let id = ServerId::new();
    assert!(id.as_str().starts_with("srv-"));
    assert_eq!(id.as_str().len(), ID_MAX_LEN);
}

#[test]
fn generated_ids_are_unique() {
    let a = MonitorId::new();
    let b = MonitorId::new();
    assert_ne!(a, b);
}

#[test]
fn from_string_round_trips() {
    let id = ServerId::from_string("srv-counter");
    assert_eq!(id.as_str(), "srv-counter");
    assert_eq!(id, "srv-counter");
}

#[test]
fn idbuf_hash_matches_str_for_borrow_lookups() {
    let mut map: HashMap<ServerId, u32> = HashMap::new();
    let id = ServerId::from_string("srv-abc");
    map.insert(id, 7);
    assert_eq!(map.get("srv-abc"), Some(&7));
}

#[test]
fn serde_is_transparent() {
    let id = TimerId::from_string("tmr-tick");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"tmr-tick\"");
    let back: TimerId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}

#[test]
fn server_ref_equality_includes_node() {
    let id = ServerId::from_string("srv-x");
    let node: NodeId = "a@127.0.0.1:4369".parse().unwrap();
    let local = ServerRef::local(id);
    let remote = ServerRef::remote(id, node.clone());
    assert_ne!(local, remote);
    assert_eq!(remote, ServerRef::remote(id, node));
}

#[test]
fn server_ref_serde_omits_missing_node() {
    let local = ServerRef::local(ServerId::from_string("srv-x"));
    let json = serde_json::to_value(&local).unwrap();
    assert!(json.get("node").is_none());

    let remote = ServerRef::remote(
        ServerId::from_string("srv-x"),
        "a@127.0.0.1:4369".parse().unwrap(),
    );
    let json = serde_json::to_value(&remote).unwrap();
    assert_eq!(json["node"], "a@127.0.0.1:4369");
    let back: ServerRef = serde_json::from_value(json).unwrap();
    assert_eq!(back, remote);
}
