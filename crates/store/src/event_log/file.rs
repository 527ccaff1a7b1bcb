// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-backed event log: one JSON-lines file per stream.
//!
//! Each stream keeps `<name>.log` (one entry per line) and
//! `<name>.meta` carrying the durable sequence counter, so sequence
//! numbers survive restarts and are never reused after truncation.

use super::{AppendEntry, EventLogAdapter, LogEntry, ReadOptions};
use crate::error::StoreError;
use crate::file::{decode_key, encode_key};
use async_trait::async_trait;
use hive_core::{ClockHandle, SystemClock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

const LOG_EXT: &str = "log";
const META_EXT: &str = "meta";

#[derive(Debug, Default, Serialize, Deserialize)]
struct StreamMeta {
    last_seq: u64,
}

#[derive(Default)]
struct StreamState {
    last_seq: u64,
    entries: Vec<LogEntry>,
}

/// Durable event log adapter.
pub struct FileEventLog {
    dir: PathBuf,
    clock: ClockHandle,
    // Streams loaded from disk on first touch; the cache is the source
    // of truth between flushes.
    streams: Mutex<HashMap<String, StreamState>>,
}

impl FileEventLog {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::storage("open", e))?;
        Ok(Self { dir, clock: SystemClock::handle(), streams: Mutex::new(HashMap::new()) })
    }

    pub fn with_clock(mut self, clock: ClockHandle) -> Self {
        self.clock = clock;
        self
    }

    fn log_path(&self, stream: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", encode_key(stream), LOG_EXT))
    }

    fn meta_path(&self, stream: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", encode_key(stream), META_EXT))
    }

    async fn load_stream(&self, stream: &str) -> Result<StreamState, StoreError> {
        let mut state = StreamState::default();

        match tokio::fs::read(self.meta_path(stream)).await {
            Ok(bytes) => {
                let meta: StreamMeta = serde_json::from_slice(&bytes).map_err(|e| {
                    StoreError::CorruptedState { key: stream.to_string(), message: e.to_string() }
                })?;
                state.last_seq = meta.last_seq;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::storage("load", e)),
        }

        match tokio::fs::read_to_string(self.log_path(stream)).await {
            Ok(text) => {
                for line in text.lines().filter(|l| !l.trim().is_empty()) {
                    let entry: LogEntry = serde_json::from_str(line).map_err(|e| {
                        StoreError::CorruptedState {
                            key: stream.to_string(),
                            message: e.to_string(),
                        }
                    })?;
                    state.last_seq = state.last_seq.max(entry.seq);
                    state.entries.push(entry);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::storage("load", e)),
        }

        Ok(state)
    }

    async fn with_stream<'a>(
        &self,
        streams: &'a mut HashMap<String, StreamState>,
        stream: &str,
    ) -> Result<&'a mut StreamState, StoreError> {
        if !streams.contains_key(stream) {
            let state = self.load_stream(stream).await?;
            streams.insert(stream.to_string(), state);
        }
        match streams.get_mut(stream) {
            Some(state) => Ok(state),
            None => unreachable!("stream inserted above"),
        }
    }

    async fn append_lines(&self, stream: &str, entries: &[LogEntry]) -> Result<(), StoreError> {
        let mut buf = Vec::new();
        for entry in entries {
            let line = serde_json::to_vec(entry)
                .map_err(|e| StoreError::Serialization { message: e.to_string() })?;
            buf.extend_from_slice(&line);
            buf.push(b'\n');
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path(stream))
            .await
            .map_err(|e| StoreError::storage("append", e))?;
        file.write_all(&buf).await.map_err(|e| StoreError::storage("append", e))?;
        file.sync_all().await.map_err(|e| StoreError::storage("append", e))
    }

    async fn write_meta(&self, stream: &str, last_seq: u64) -> Result<(), StoreError> {
        let path = self.meta_path(stream);
        let tmp = path.with_extension("meta-tmp");
        let bytes = serde_json::to_vec(&StreamMeta { last_seq })
            .map_err(|e| StoreError::Serialization { message: e.to_string() })?;
        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(|e| StoreError::storage("append", e))?;
        file.write_all(&bytes).await.map_err(|e| StoreError::storage("append", e))?;
        file.sync_all().await.map_err(|e| StoreError::storage("append", e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StoreError::storage("append", e))
    }

    async fn rewrite_log(&self, stream: &str, entries: &[LogEntry]) -> Result<(), StoreError> {
        let path = self.log_path(stream);
        let tmp = path.with_extension("log-tmp");
        let mut buf = Vec::new();
        for entry in entries {
            let line = serde_json::to_vec(entry)
                .map_err(|e| StoreError::Serialization { message: e.to_string() })?;
            buf.extend_from_slice(&line);
            buf.push(b'\n');
        }
        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(|e| StoreError::storage("truncate", e))?;
        file.write_all(&buf).await.map_err(|e| StoreError::storage("truncate", e))?;
        file.sync_all().await.map_err(|e| StoreError::storage("truncate", e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StoreError::storage("truncate", e))
    }
}

#[async_trait]
impl EventLogAdapter for FileEventLog {
    async fn append(&self, stream: &str, entries: Vec<AppendEntry>) -> Result<u64, StoreError> {
        let now_ms = self.clock.epoch_ms();
        let mut streams = self.streams.lock().await;
        let state = self.with_stream(&mut streams, stream).await?;

        let mut appended = Vec::with_capacity(entries.len());
        for entry in entries {
            state.last_seq += 1;
            appended.push(LogEntry {
                seq: state.last_seq,
                timestamp_ms: now_ms,
                entry_type: entry.entry_type,
                payload: entry.payload,
                metadata: entry.metadata,
            });
        }
        let last_seq = state.last_seq;
        state.entries.extend(appended.iter().cloned());

        self.append_lines(stream, &appended).await?;
        self.write_meta(stream, last_seq).await?;
        Ok(last_seq)
    }

    async fn read(&self, stream: &str, opts: ReadOptions) -> Result<Vec<LogEntry>, StoreError> {
        let mut streams = self.streams.lock().await;
        let state = self.with_stream(&mut streams, stream).await?;
        Ok(opts.apply(&state.entries))
    }

    async fn read_after(&self, stream: &str, after_seq: u64) -> Result<Vec<LogEntry>, StoreError> {
        self.read(
            stream,
            ReadOptions { from_seq: Some(after_seq + 1), ..ReadOptions::default() },
        )
        .await
    }

    async fn last_seq(&self, stream: &str) -> Result<u64, StoreError> {
        let mut streams = self.streams.lock().await;
        let state = self.with_stream(&mut streams, stream).await?;
        Ok(state.last_seq)
    }

    async fn truncate_before(&self, stream: &str, seq: u64) -> Result<usize, StoreError> {
        let mut streams = self.streams.lock().await;
        let state = self.with_stream(&mut streams, stream).await?;

        let before = state.entries.len();
        state.entries.retain(|e| e.seq >= seq);
        let removed = before - state.entries.len();
        if removed > 0 {
            let entries = state.entries.clone();
            self.rewrite_log(stream, &entries).await?;
        }
        Ok(removed)
    }

    async fn list_streams(&self, prefix: Option<&str>) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| StoreError::storage("list_keys", e))?;
        let suffix = format!(".{LOG_EXT}");
        while let Some(entry) =
            dir.next_entry().await.map_err(|e| StoreError::storage("list_keys", e))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(encoded) = name.strip_suffix(&suffix) else { continue };
            let Some(stream) = decode_key(encoded) else { continue };
            if prefix.is_none_or(|p| stream.starts_with(p)) {
                names.push(stream);
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
