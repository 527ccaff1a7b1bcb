// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Key/value storage adapter contract.

use crate::envelope::StateEnvelope;
use crate::error::StoreError;
use async_trait::async_trait;
use hive_core::StateMetadata;

/// Pluggable key/value state store.
///
/// Implementations must make `save` atomic (a concurrent `load` sees
/// either the previous envelope or the new one, never a partial write)
/// and must return deep copies from `load` so callers can mutate
/// freely. `list_keys` matches the literal prefix, with no wildcard
/// interpretation. Adapters wrapping shared external resources provide
/// their own serialization.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Persist an envelope. Returns the metadata as stored (adapters
    /// with checksums enabled fill `metadata.checksum`).
    async fn save(&self, key: &str, envelope: StateEnvelope) -> Result<StateMetadata, StoreError>;

    async fn load(&self, key: &str) -> Result<Option<StateEnvelope>, StoreError>;

    /// Returns true when an entry existed and was removed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    async fn list_keys(&self, prefix: Option<&str>) -> Result<Vec<String>, StoreError>;

    /// Remove entries persisted before `now - max_age_ms`. Returns the
    /// number removed.
    async fn cleanup(&self, max_age_ms: u64) -> Result<usize, StoreError>;

    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
