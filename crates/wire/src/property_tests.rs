// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Property tests: envelope encode/decode is a round trip for every
//! representable value.

use crate::envelope::{MessageKind, WireEnvelope, PROTOCOL_VERSION};
use crate::frame::{decode, encode};
use hive_core::{CorrId, NodeId};
use proptest::prelude::*;
use serde_json::{json, Value};

fn kind_strategy() -> impl Strategy<Value = MessageKind> {
    prop_oneof![
        Just(MessageKind::Hello),
        Just(MessageKind::Heartbeat),
        Just(MessageKind::CallRequest),
        Just(MessageKind::CallReply),
        Just(MessageKind::Cast),
        Just(MessageKind::SpawnRequest),
        Just(MessageKind::ProcessDown),
        Just(MessageKind::ExitSignal),
        Just(MessageKind::GlobalRegister),
        Just(MessageKind::GlobalSyncReply),
    ]
}

fn node_strategy() -> impl Strategy<Value = NodeId> {
    ("[a-z]{1,8}", "[a-z0-9.]{1,12}", 1u16..)
        .prop_map(|(name, host, port)| format!("{name}@{host}:{port}").parse().unwrap())
}

fn value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[ -~]{0,24}".prop_map(Value::from),
    ];
    leaf.prop_recursive(3, 24, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::from),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|m| json!(m)),
        ]
    })
}

proptest! {
    #[test]
    fn encode_decode_round_trips(
        kind in kind_strategy(),
        from in node_strategy(),
        to in proptest::option::of(node_strategy()),
        with_corr in any::<bool>(),
        body in value_strategy(),
    ) {
        let mut envelope = WireEnvelope {
            v: PROTOCOL_VERSION,
            kind,
            corr_id: with_corr.then(CorrId::new),
            from,
            to,
            body,
        };
        let bytes = encode(&envelope).unwrap();
        let back = decode(&bytes).unwrap();
        prop_assert_eq!(&back, &envelope);

        // A second round trip is byte-stable.
        envelope = back;
        let bytes2 = encode(&envelope).unwrap();
        prop_assert_eq!(bytes, bytes2);
    }
}
