// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only event log with per-stream monotonic sequencing.
//!
//! Sequence numbers are assigned by the adapter: strictly monotonic per
//! stream, starting at 1, never reused even after truncation. Streams
//! are isolated: operations on one never affect another. `last_seq`
//! reflects the highest sequence ever assigned, not the highest still
//! present.

mod file;
mod memory;

pub use file::FileEventLog;
pub use memory::MemoryEventLog;

use crate::error::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A stored event. `seq` and `timestamp_ms` are adapter-assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub seq: u64,
    pub timestamp_ms: u64,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Input to `append`. Carries no `seq` field: sequencing is the
/// adapter's job and caller-supplied sequence numbers are ignored by
/// construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppendEntry {
    #[serde(rename = "type")]
    pub entry_type: String,
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl AppendEntry {
    pub fn new(entry_type: impl Into<String>, payload: Value) -> Self {
        Self { entry_type: entry_type.into(), payload, metadata: None }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Filters for `read`, applied in order: `from_seq`, `to_seq` (both
/// inclusive), `types`, then `limit`. Results sort ascending by seq.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    pub from_seq: Option<u64>,
    pub to_seq: Option<u64>,
    pub types: Option<Vec<String>>,
    pub limit: Option<usize>,
}

impl ReadOptions {
    pub(crate) fn apply(&self, entries: &[LogEntry]) -> Vec<LogEntry> {
        let filtered = entries
            .iter()
            .filter(|e| self.from_seq.is_none_or(|from| e.seq >= from))
            .filter(|e| self.to_seq.is_none_or(|to| e.seq <= to))
            .filter(|e| {
                self.types
                    .as_ref()
                    .is_none_or(|types| types.iter().any(|t| *t == e.entry_type))
            });
        match self.limit {
            Some(limit) => filtered.take(limit).cloned().collect(),
            None => filtered.cloned().collect(),
        }
    }
}

/// Append-only event log contract.
#[async_trait]
pub trait EventLogAdapter: Send + Sync {
    /// Append entries to a stream; returns the last assigned seq.
    async fn append(&self, stream: &str, entries: Vec<AppendEntry>) -> Result<u64, StoreError>;

    async fn read(&self, stream: &str, opts: ReadOptions) -> Result<Vec<LogEntry>, StoreError>;

    /// Entries with `seq > after_seq`.
    async fn read_after(&self, stream: &str, after_seq: u64) -> Result<Vec<LogEntry>, StoreError>;

    /// Highest seq ever assigned on the stream; 0 for an empty stream.
    async fn last_seq(&self, stream: &str) -> Result<u64, StoreError>;

    /// Remove entries with `seq < seq`; returns the number removed.
    /// The sequence counter is untouched.
    async fn truncate_before(&self, stream: &str, seq: u64) -> Result<usize, StoreError>;

    async fn list_streams(&self, prefix: Option<&str>) -> Result<Vec<String>, StoreError>;

    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
