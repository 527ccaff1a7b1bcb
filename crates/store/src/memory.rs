// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory storage adapter.

use crate::adapter::StorageAdapter;
use crate::envelope::{state_checksum, StateEnvelope};
use crate::error::StoreError;
use async_trait::async_trait;
use hive_core::{ClockHandle, StateMetadata, SystemClock};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Map-backed adapter for tests and ephemeral processes.
pub struct MemoryAdapter {
    entries: Mutex<HashMap<String, StateEnvelope>>,
    checksums: bool,
    clock: ClockHandle,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            checksums: false,
            clock: SystemClock::handle(),
        }
    }

    /// Enable SHA-256 checksums over the serialized state.
    pub fn with_checksums(mut self) -> Self {
        self.checksums = true;
        self
    }

    pub fn with_clock(mut self, clock: ClockHandle) -> Self {
        self.clock = clock;
        self
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageAdapter for MemoryAdapter {
    async fn save(
        &self,
        key: &str,
        mut envelope: StateEnvelope,
    ) -> Result<StateMetadata, StoreError> {
        if self.checksums {
            envelope.metadata.checksum = Some(state_checksum(&envelope.state)?);
        }
        let metadata = envelope.metadata.clone();
        self.entries.lock().insert(key.to_string(), envelope);
        Ok(metadata)
    }

    async fn load(&self, key: &str) -> Result<Option<StateEnvelope>, StoreError> {
        let envelope = match self.entries.lock().get(key) {
            Some(envelope) => envelope.clone(),
            None => return Ok(None),
        };
        envelope.verify_checksum(key)?;
        Ok(Some(envelope))
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries.lock().remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries.lock().contains_key(key))
    }

    async fn list_keys(&self, prefix: Option<&str>) -> Result<Vec<String>, StoreError> {
        let entries = self.entries.lock();
        let mut keys: Vec<String> = entries
            .keys()
            .filter(|k| prefix.is_none_or(|p| k.starts_with(p)))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn cleanup(&self, max_age_ms: u64) -> Result<usize, StoreError> {
        let cutoff = self.clock.epoch_ms().saturating_sub(max_age_ms);
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| e.metadata.persisted_at_ms >= cutoff);
        Ok(before - entries.len())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
