// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn parse_round_trips_canonical_form() {
    let id: NodeId = "alpha@192.168.1.5:4369".parse().unwrap();
    assert_eq!(id.name(), "alpha");
    assert_eq!(id.host(), "192.168.1.5");
    assert_eq!(id.port(), 4369);
    assert_eq!(id.to_string(), "alpha@192.168.1.5:4369");
}

#[test]
fn host_may_contain_colons() {
    // rsplit on ':' keeps everything before the final separator as host
    let id: NodeId = "a@::1:4369".parse().unwrap();
    assert_eq!(id.host(), "::1");
    assert_eq!(id.port(), 4369);
}

#[parameterized(
    missing_at = { "alpha4369" },
    empty_name = { "@host:4369" },
    missing_port = { "alpha@host" },
    empty_host = { "alpha@:4369" },
    port_zero = { "alpha@host:0" },
    port_too_big = { "alpha@host:70000" },
    port_not_numeric = { "alpha@host:abc" },
)]
fn rejects_malformed(input: &str) {
    assert!(input.parse::<NodeId>().is_err(), "accepted {input:?}");
}

#[test]
fn serde_uses_string_form() {
    let id: NodeId = "alpha@h:1".parse().unwrap();
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"alpha@h:1\"");
    let back: NodeId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}

#[test]
fn priority_is_deterministic_and_distinguishes_nodes() {
    let a: NodeId = "a@h:1".parse().unwrap();
    let b: NodeId = "b@h:1".parse().unwrap();
    assert_eq!(a.priority(), a.priority());
    assert_ne!(a.priority(), b.priority());
}
