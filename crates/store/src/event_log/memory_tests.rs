// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

fn entry(entry_type: &str) -> AppendEntry {
    AppendEntry::new(entry_type, json!({ "t": entry_type }))
}

#[tokio::test]
async fn sequences_start_at_one_and_increase() {
    let log = MemoryEventLog::new();
    let last = log.append("orders", vec![entry("a"), entry("b")]).await.unwrap();
    assert_eq!(last, 2);

    let read = log.read("orders", ReadOptions::default()).await.unwrap();
    assert_eq!(read.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![1, 2]);
}

#[tokio::test]
async fn streams_are_isolated() {
    let log = MemoryEventLog::new();
    log.append("orders", vec![entry("a")]).await.unwrap();
    log.append("audits", vec![entry("x"), entry("y")]).await.unwrap();

    assert_eq!(log.last_seq("orders").await.unwrap(), 1);
    assert_eq!(log.last_seq("audits").await.unwrap(), 2);
    assert!(log.read("missing", ReadOptions::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn truncation_never_reuses_sequence_numbers() {
    let log = MemoryEventLog::new();
    log.append("orders", vec![entry("a"), entry("b"), entry("c")]).await.unwrap();
    assert_eq!(log.last_seq("orders").await.unwrap(), 3);

    let removed = log.truncate_before("orders", 3).await.unwrap();
    assert_eq!(removed, 2);
    // Counter reflects the highest seq ever assigned
    assert_eq!(log.last_seq("orders").await.unwrap(), 3);

    let last = log.append("orders", vec![entry("d")]).await.unwrap();
    assert_eq!(last, 4);

    let read = log.read("orders", ReadOptions::default()).await.unwrap();
    assert_eq!(read.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![3, 4]);
}

#[tokio::test]
async fn read_filters_apply_in_order() {
    let log = MemoryEventLog::new();
    log.append(
        "orders",
        vec![entry("created"), entry("paid"), entry("created"), entry("shipped")],
    )
    .await
    .unwrap();

    let opts = ReadOptions {
        from_seq: Some(2),
        to_seq: Some(4),
        types: Some(vec!["created".into(), "shipped".into()]),
        limit: Some(1),
    };
    let read = log.read("orders", opts).await.unwrap();
    assert_eq!(read.len(), 1);
    assert_eq!(read[0].seq, 3);
    assert_eq!(read[0].entry_type, "created");
}

#[tokio::test]
async fn read_after_returns_entries_strictly_later() {
    let log = MemoryEventLog::new();
    log.append("orders", vec![entry("a"), entry("b"), entry("c")]).await.unwrap();

    let read = log.read_after("orders", 1).await.unwrap();
    assert_eq!(read.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![2, 3]);
    assert!(log.read_after("orders", 3).await.unwrap().is_empty());
}

#[tokio::test]
async fn returned_entries_are_deep_copies() {
    let log = MemoryEventLog::new();
    log.append("orders", vec![entry("a")]).await.unwrap();

    let mut read = log.read("orders", ReadOptions::default()).await.unwrap();
    read[0].payload = json!("mutated");

    let again = log.read("orders", ReadOptions::default()).await.unwrap();
    assert_eq!(again[0].payload, json!({ "t": "a" }));
}

#[tokio::test]
async fn list_streams_honors_prefix() {
    let log = MemoryEventLog::new();
    log.append("orders/eu", vec![entry("a")]).await.unwrap();
    log.append("orders/us", vec![entry("a")]).await.unwrap();
    log.append("audit", vec![entry("a")]).await.unwrap();

    assert_eq!(
        log.list_streams(Some("orders/")).await.unwrap(),
        vec!["orders/eu", "orders/us"]
    );
    assert_eq!(log.list_streams(None).await.unwrap().len(), 3);
}
