// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-backed storage adapter: one file per key, atomic writes.

use crate::adapter::StorageAdapter;
use crate::envelope::{state_checksum, StateEnvelope};
use crate::error::StoreError;
use async_trait::async_trait;
use hive_core::{ClockHandle, StateMetadata, SystemClock};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

const DEFAULT_EXTENSION: &str = "json";

/// Reference durable adapter.
///
/// Each key maps to `<dir>/<encoded-key>.<ext>`; writes go to a temp
/// file in the same directory, are fsynced, then renamed over the
/// target so a crashed write never leaves a partial envelope behind.
pub struct FileAdapter {
    dir: PathBuf,
    extension: String,
    checksums: bool,
    clock: ClockHandle,
}

impl FileAdapter {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::storage("open", e))?;
        Ok(Self {
            dir,
            extension: DEFAULT_EXTENSION.to_string(),
            checksums: false,
            clock: SystemClock::handle(),
        })
    }

    pub fn with_clock(mut self, clock: ClockHandle) -> Self {
        self.clock = clock;
        self
    }

    /// Enable SHA-256 checksums over the serialized state.
    pub fn with_checksums(mut self) -> Self {
        self.checksums = true;
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", encode_key(key), self.extension))
    }

    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(|e| StoreError::storage("save", e))?;
        file.write_all(bytes).await.map_err(|e| StoreError::storage("save", e))?;
        file.sync_all().await.map_err(|e| StoreError::storage("save", e))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| StoreError::storage("save", e))
    }
}

#[async_trait]
impl StorageAdapter for FileAdapter {
    async fn save(
        &self,
        key: &str,
        mut envelope: StateEnvelope,
    ) -> Result<StateMetadata, StoreError> {
        if self.checksums {
            envelope.metadata.checksum = Some(state_checksum(&envelope.state)?);
        }
        let bytes = serde_json::to_vec_pretty(&envelope)
            .map_err(|e| StoreError::Serialization { message: e.to_string() })?;
        self.write_atomic(&self.path_for(key), &bytes).await?;
        Ok(envelope.metadata)
    }

    async fn load(&self, key: &str) -> Result<Option<StateEnvelope>, StoreError> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::storage("load", e)),
        };
        let envelope: StateEnvelope = serde_json::from_slice(&bytes).map_err(|e| {
            StoreError::CorruptedState { key: key.to_string(), message: e.to_string() }
        })?;
        envelope.verify_checksum(key)?;
        Ok(Some(envelope))
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::storage("delete", e)),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        match tokio::fs::metadata(self.path_for(key)).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::storage("exists", e)),
        }
    }

    async fn list_keys(&self, prefix: Option<&str>) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| StoreError::storage("list_keys", e))?;
        let suffix = format!(".{}", self.extension);
        while let Some(entry) =
            entries.next_entry().await.map_err(|e| StoreError::storage("list_keys", e))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(encoded) = name.strip_suffix(&suffix) else { continue };
            let Some(key) = decode_key(encoded) else { continue };
            if prefix.is_none_or(|p| key.starts_with(p)) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn cleanup(&self, max_age_ms: u64) -> Result<usize, StoreError> {
        let mut removed = 0;
        let cutoff = self.clock.epoch_ms().saturating_sub(max_age_ms);
        for key in self.list_keys(None).await? {
            if let Some(envelope) = self.load(&key).await? {
                if envelope.metadata.persisted_at_ms < cutoff && self.delete(&key).await? {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}

/// Encode a key into a filesystem-safe name, reversibly.
///
/// Alphanumerics plus `.`, `_`, `-` pass through; everything else
/// (including `%` itself) becomes `%XX`.
pub(crate) fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'.' | b'_' | b'-' => {
                out.push(byte as char);
            }
            _ => {
                out.push('%');
                out.push_str(&format!("{byte:02X}"));
            }
        }
    }
    out
}

/// Decode a name produced by [`encode_key`]. Returns `None` for names
/// this adapter did not write (stray files in the directory).
pub(crate) fn decode_key(encoded: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(encoded.len());
    let mut chars = encoded.bytes();
    while let Some(b) = chars.next() {
        if b == b'%' {
            let hi = chars.next()?;
            let lo = chars.next()?;
            let hex = [hi, lo];
            let hex = std::str::from_utf8(&hex).ok()?;
            bytes.push(u8::from_str_radix(hex, 16).ok()?);
        } else {
            bytes.push(b);
        }
    }
    String::from_utf8(bytes).ok()
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
