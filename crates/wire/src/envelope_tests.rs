// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::bodies::{HeartbeatBody, HelloBody};
use crate::frame::{decode, encode};
use hive_core::NodeId;

fn node(s: &str) -> NodeId {
    s.parse().unwrap()
}

#[test]
fn kinds_serialize_snake_case() {
    let json = serde_json::to_value(MessageKind::GlobalSyncRequest).unwrap();
    assert_eq!(json, "global_sync_request");
    let json = serde_json::to_value(MessageKind::HelloAck).unwrap();
    assert_eq!(json, "hello_ack");
}

#[test]
fn envelope_round_trips_with_typed_body() {
    let body = HelloBody { node: node("a@h:1"), peers: vec![node("b@h:2")] };
    let envelope = WireEnvelope::new(MessageKind::Hello, node("a@h:1"), &body)
        .unwrap()
        .with_to(node("b@h:2"));

    let json = serde_json::to_value(&envelope).unwrap();
    assert_eq!(json["v"], 1);
    assert_eq!(json["kind"], "hello");
    assert_eq!(json["from"], "a@h:1");
    assert!(json.get("corr_id").is_none());

    let back: WireEnvelope = serde_json::from_value(json).unwrap();
    assert_eq!(back, envelope);
    assert_eq!(back.body_as::<HelloBody>().unwrap(), body);
}

#[test]
fn body_as_rejects_mismatched_shapes() {
    let envelope = WireEnvelope::new(
        MessageKind::Heartbeat,
        node("a@h:1"),
        &HeartbeatBody { process_count: 3, uptime_ms: 12 },
    )
    .unwrap();
    assert!(envelope.body_as::<HelloBody>().is_err());
}

#[test]
fn corr_id_is_preserved() {
    let corr = hive_core::CorrId::new();
    let envelope = WireEnvelope::new(MessageKind::CallRequest, node("a@h:1"), &())
        .unwrap()
        .with_corr(corr);
    let bytes = encode(&envelope).unwrap();
    let back = decode(&bytes).unwrap();
    assert_eq!(back.corr_id, Some(corr));
}
