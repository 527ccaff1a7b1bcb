// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use hive_core::{FakeClock, ServerId};
use serde_json::json;
use tempfile::tempdir;
use yare::parameterized;

#[parameterized(
    plain = { "counter" },
    path_like = { "svc/emea/counter" },
    punctuation = { "a:b?c*d" },
    percent_itself = { "50%done" },
    unicode = { "céntimo" },
)]
fn key_encoding_round_trips(key: &str) {
    let encoded = encode_key(key);
    assert!(encoded.bytes().all(|b| b.is_ascii_alphanumeric()
        || b == b'.'
        || b == b'_'
        || b == b'-'
        || b == b'%'));
    assert_eq!(decode_key(&encoded).as_deref(), Some(key));
}

fn envelope(state: serde_json::Value, persisted_at_ms: u64) -> StateEnvelope {
    StateEnvelope {
        state,
        metadata: StateMetadata {
            persisted_at_ms,
            server_id: ServerId::from_string("srv-test"),
            server_name: Some("counter".into()),
            schema_version: 1,
            checksum: None,
        },
    }
}

#[tokio::test]
async fn save_then_load_round_trips() {
    let dir = tempdir().unwrap();
    let adapter = FileAdapter::open(dir.path()).await.unwrap();

    adapter.save("counter", envelope(json!({"count": 5}), 10)).await.unwrap();
    let loaded = adapter.load("counter").await.unwrap().unwrap();
    assert_eq!(loaded.state, json!({"count": 5}));
    assert_eq!(loaded.metadata.server_name.as_deref(), Some("counter"));
}

#[tokio::test]
async fn state_survives_adapter_reopen() {
    let dir = tempdir().unwrap();
    {
        let adapter = FileAdapter::open(dir.path()).await.unwrap();
        adapter.save("counter", envelope(json!({"count": 5}), 10)).await.unwrap();
    }
    let adapter = FileAdapter::open(dir.path()).await.unwrap();
    let loaded = adapter.load("counter").await.unwrap().unwrap();
    assert_eq!(loaded.state, json!({"count": 5}));
}

#[tokio::test]
async fn save_overwrites_atomically() {
    let dir = tempdir().unwrap();
    let adapter = FileAdapter::open(dir.path()).await.unwrap();

    adapter.save("counter", envelope(json!({"count": 1}), 10)).await.unwrap();
    adapter.save("counter", envelope(json!({"count": 2}), 20)).await.unwrap();

    let loaded = adapter.load("counter").await.unwrap().unwrap();
    assert_eq!(loaded.state, json!({"count": 2}));
    // No temp file left behind
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn keys_with_separators_encode_reversibly() {
    let dir = tempdir().unwrap();
    let adapter = FileAdapter::open(dir.path()).await.unwrap();

    adapter.save("svc/emea:counter", envelope(json!(1), 0)).await.unwrap();
    assert!(adapter.exists("svc/emea:counter").await.unwrap());
    assert_eq!(
        adapter.list_keys(Some("svc/")).await.unwrap(),
        vec!["svc/emea:counter"]
    );
}

#[tokio::test]
async fn corrupted_file_surfaces_corrupted_state() {
    let dir = tempdir().unwrap();
    let adapter = FileAdapter::open(dir.path()).await.unwrap();
    adapter.save("counter", envelope(json!(1), 0)).await.unwrap();

    std::fs::write(dir.path().join("counter.json"), b"{not json").unwrap();
    assert!(matches!(
        adapter.load("counter").await,
        Err(StoreError::CorruptedState { .. })
    ));
}

#[tokio::test]
async fn checksum_mismatch_detected_on_load() {
    let dir = tempdir().unwrap();
    let adapter = FileAdapter::open(dir.path()).await.unwrap().with_checksums();
    adapter.save("counter", envelope(json!({"count": 1}), 0)).await.unwrap();

    // Flip the state on disk without recomputing the checksum
    let path = dir.path().join("counter.json");
    let text = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, text.replace("\"count\": 1", "\"count\": 9")).unwrap();

    assert!(matches!(
        adapter.load("counter").await,
        Err(StoreError::ChecksumMismatch { .. })
    ));
}

#[tokio::test]
async fn cleanup_removes_only_expired_entries() {
    let dir = tempdir().unwrap();
    let clock = FakeClock::new();
    clock.set_epoch_ms(100_000);
    let adapter = FileAdapter::open(dir.path()).await.unwrap().with_clock(clock.handle());

    adapter.save("old", envelope(json!(1), 10_000)).await.unwrap();
    adapter.save("fresh", envelope(json!(2), 99_000)).await.unwrap();

    assert_eq!(adapter.cleanup(30_000).await.unwrap(), 1);
    assert!(!adapter.exists("old").await.unwrap());
    assert!(adapter.exists("fresh").await.unwrap());
}

#[tokio::test]
async fn delete_missing_is_false() {
    let dir = tempdir().unwrap();
    let adapter = FileAdapter::open(dir.path()).await.unwrap();
    assert!(!adapter.delete("ghost").await.unwrap());
}
