// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! S4: monotonic sequencing with truncation, on both adapters.

use hive_store::{AppendEntry, EventLogAdapter, FileEventLog, MemoryEventLog, ReadOptions};
use serde_json::json;
use tempfile::tempdir;

fn entry(entry_type: &str) -> AppendEntry {
    AppendEntry::new(entry_type, json!({}))
}

async fn monotonic_sequencing(log: &dyn EventLogAdapter) {
    let last = log
        .append("orders", vec![entry("A"), entry("B"), entry("C")])
        .await
        .unwrap();
    assert_eq!(last, 3);
    assert_eq!(log.last_seq("orders").await.unwrap(), 3);

    // Truncating before seq 3 removes A and B.
    let removed = log.truncate_before("orders", 3).await.unwrap();
    assert_eq!(removed, 2);

    // Sequence numbers are never reused after truncation.
    let last = log.append("orders", vec![entry("D")]).await.unwrap();
    assert_eq!(last, 4);

    let read = log.read("orders", ReadOptions::default()).await.unwrap();
    assert_eq!(read.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![3, 4]);
    assert_eq!(read[0].entry_type, "C");
    assert_eq!(read[1].entry_type, "D");
}

#[tokio::test]
async fn memory_log_sequences_monotonically() {
    let log = MemoryEventLog::new();
    monotonic_sequencing(&log).await;
}

#[tokio::test]
async fn file_log_sequences_monotonically() {
    let dir = tempdir().unwrap();
    let log = FileEventLog::open(dir.path()).await.unwrap();
    monotonic_sequencing(&log).await;
}

#[tokio::test]
async fn append_then_read_from_seq_returns_suffix() {
    let log = MemoryEventLog::new();
    log.append("orders", vec![entry("A"), entry("B"), entry("C")]).await.unwrap();

    let read = log
        .read("orders", ReadOptions { from_seq: Some(2), ..ReadOptions::default() })
        .await
        .unwrap();
    assert_eq!(read.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![2, 3]);
}
