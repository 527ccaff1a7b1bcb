// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory event log.

use super::{AppendEntry, EventLogAdapter, LogEntry, ReadOptions};
use crate::error::StoreError;
use async_trait::async_trait;
use hive_core::{ClockHandle, SystemClock};
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Default)]
struct StreamState {
    last_seq: u64,
    entries: Vec<LogEntry>,
}

/// Map-backed event log for tests and ephemeral deployments.
pub struct MemoryEventLog {
    streams: Mutex<HashMap<String, StreamState>>,
    clock: ClockHandle,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self { streams: Mutex::new(HashMap::new()), clock: SystemClock::handle() }
    }

    pub fn with_clock(mut self, clock: ClockHandle) -> Self {
        self.clock = clock;
        self
    }
}

impl Default for MemoryEventLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventLogAdapter for MemoryEventLog {
    async fn append(&self, stream: &str, entries: Vec<AppendEntry>) -> Result<u64, StoreError> {
        let now_ms = self.clock.epoch_ms();
        let mut streams = self.streams.lock();
        let state = streams.entry(stream.to_string()).or_default();
        for entry in entries {
            state.last_seq += 1;
            state.entries.push(LogEntry {
                seq: state.last_seq,
                timestamp_ms: now_ms,
                entry_type: entry.entry_type,
                payload: entry.payload,
                metadata: entry.metadata,
            });
        }
        Ok(state.last_seq)
    }

    async fn read(&self, stream: &str, opts: ReadOptions) -> Result<Vec<LogEntry>, StoreError> {
        let streams = self.streams.lock();
        Ok(streams.get(stream).map(|s| opts.apply(&s.entries)).unwrap_or_default())
    }

    async fn read_after(&self, stream: &str, after_seq: u64) -> Result<Vec<LogEntry>, StoreError> {
        self.read(
            stream,
            ReadOptions { from_seq: Some(after_seq + 1), ..ReadOptions::default() },
        )
        .await
    }

    async fn last_seq(&self, stream: &str) -> Result<u64, StoreError> {
        Ok(self.streams.lock().get(stream).map(|s| s.last_seq).unwrap_or(0))
    }

    async fn truncate_before(&self, stream: &str, seq: u64) -> Result<usize, StoreError> {
        let mut streams = self.streams.lock();
        let Some(state) = streams.get_mut(stream) else { return Ok(0) };
        let before = state.entries.len();
        state.entries.retain(|e| e.seq >= seq);
        Ok(before - state.entries.len())
    }

    async fn list_streams(&self, prefix: Option<&str>) -> Result<Vec<String>, StoreError> {
        let streams = self.streams.lock();
        let mut names: Vec<String> = streams
            .keys()
            .filter(|name| prefix.is_none_or(|p| name.starts_with(p)))
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
