// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence manager: staleness, schema migration, error reporting.
//!
//! The manager owns the policy layer above a [`StorageAdapter`]: which
//! key to use, when a loaded envelope is too old, how to migrate an
//! older schema forward, and who hears about failures. Snapshot and
//! cleanup *scheduling* belongs to the process runtime; the manager
//! only executes the operations.

use crate::adapter::StorageAdapter;
use crate::envelope::StateEnvelope;
use crate::error::StoreError;
use hive_core::{ServerId, StateMetadata};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Schema migration hook: `(state, from_version, to_version)`.
pub type MigrateFn = Arc<dyn Fn(Value, u32, u32) -> Result<Value, String> + Send + Sync>;

/// Invoked for every surfaced persistence error, including background
/// (periodic snapshot/cleanup) failures.
pub type OnErrorFn = Arc<dyn Fn(&StoreError) + Send + Sync>;

/// Per-process persistence policy.
#[derive(Clone)]
pub struct PersistenceConfig {
    pub adapter: Arc<dyn StorageAdapter>,
    /// Storage key; defaults to the server name, falling back to id.
    pub key: Option<String>,
    pub snapshot_interval: Option<Duration>,
    pub persist_on_shutdown: bool,
    pub restore_on_start: bool,
    pub max_state_age: Option<Duration>,
    pub cleanup_on_terminate: bool,
    pub cleanup_interval: Option<Duration>,
    pub schema_version: u32,
    pub migrate: Option<MigrateFn>,
    pub on_error: Option<OnErrorFn>,
}

impl PersistenceConfig {
    pub fn new(adapter: Arc<dyn StorageAdapter>) -> Self {
        Self {
            adapter,
            key: None,
            snapshot_interval: None,
            persist_on_shutdown: true,
            restore_on_start: true,
            max_state_age: None,
            cleanup_on_terminate: false,
            cleanup_interval: None,
            schema_version: 1,
            migrate: None,
            on_error: None,
        }
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn snapshot_interval(mut self, interval: Duration) -> Self {
        self.snapshot_interval = Some(interval);
        self
    }

    pub fn persist_on_shutdown(mut self, on: bool) -> Self {
        self.persist_on_shutdown = on;
        self
    }

    pub fn restore_on_start(mut self, on: bool) -> Self {
        self.restore_on_start = on;
        self
    }

    pub fn max_state_age(mut self, age: Duration) -> Self {
        self.max_state_age = Some(age);
        self
    }

    pub fn cleanup_on_terminate(mut self, on: bool) -> Self {
        self.cleanup_on_terminate = on;
        self
    }

    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = Some(interval);
        self
    }

    pub fn schema_version(mut self, version: u32) -> Self {
        self.schema_version = version;
        self
    }

    pub fn migrate(mut self, f: MigrateFn) -> Self {
        self.migrate = Some(f);
        self
    }

    pub fn on_error(mut self, f: OnErrorFn) -> Self {
        self.on_error = Some(f);
        self
    }
}

/// Executes persistence operations for one process.
pub struct PersistenceManager {
    config: PersistenceConfig,
    key: String,
    server_id: ServerId,
    server_name: Option<String>,
}

impl PersistenceManager {
    pub fn new(config: PersistenceConfig, server_id: ServerId, server_name: Option<String>) -> Self {
        let key = config
            .key
            .clone()
            .or_else(|| server_name.clone())
            .unwrap_or_else(|| server_id.to_string());
        Self { config, key, server_id, server_name }
    }

    pub fn config(&self) -> &PersistenceConfig {
        &self.config
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Persist a snapshot of `state` taken at `now_ms`.
    pub async fn save(&self, state: Value, now_ms: u64) -> Result<StateMetadata, StoreError> {
        let envelope = StateEnvelope {
            state,
            metadata: StateMetadata {
                persisted_at_ms: now_ms,
                server_id: self.server_id,
                server_name: self.server_name.clone(),
                schema_version: self.config.schema_version,
                checksum: None,
            },
        };
        self.config.adapter.save(&self.key, envelope).await
    }

    /// Load, age-check, and migrate persisted state.
    ///
    /// `Ok(None)` means nothing was persisted; the caller proceeds with
    /// a fresh `init`.
    pub async fn load(&self, now_ms: u64) -> Result<Option<(Value, StateMetadata)>, StoreError> {
        let Some(envelope) = self.config.adapter.load(&self.key).await? else {
            return Ok(None);
        };
        let mut metadata = envelope.metadata;

        if let Some(max_age) = self.config.max_state_age {
            let max_age_ms = max_age.as_millis() as u64;
            let age_ms = now_ms.saturating_sub(metadata.persisted_at_ms);
            if age_ms > max_age_ms {
                return Err(StoreError::StaleState { key: self.key.clone(), age_ms, max_age_ms });
            }
        }

        let mut state = envelope.state;
        if metadata.schema_version < self.config.schema_version {
            if let Some(migrate) = &self.config.migrate {
                let from = metadata.schema_version;
                let to = self.config.schema_version;
                tracing::debug!(key = %self.key, from, to, "migrating persisted state");
                state = migrate(state, from, to)
                    .map_err(|message| StoreError::Migration { from, to, message })?;
                metadata.schema_version = to;
            }
            // Without a migrate hook the older state passes through as-is.
        }

        Ok(Some((state, metadata)))
    }

    pub async fn delete(&self) -> Result<bool, StoreError> {
        self.config.adapter.delete(&self.key).await
    }

    /// Metadata of the last persisted envelope, without loading state
    /// through the staleness/migration pipeline.
    pub async fn last_metadata(&self) -> Result<Option<StateMetadata>, StoreError> {
        Ok(self.config.adapter.load(&self.key).await?.map(|e| e.metadata))
    }

    pub async fn cleanup(&self) -> Result<usize, StoreError> {
        match self.config.max_state_age {
            Some(age) => self.config.adapter.cleanup(age.as_millis() as u64).await,
            None => Ok(0),
        }
    }

    pub async fn close(&self) -> Result<(), StoreError> {
        self.config.adapter.close().await
    }

    /// Route an error to the configured `on_error` hook.
    pub fn report(&self, err: &StoreError) {
        if let Some(on_error) = &self.config.on_error {
            on_error(err);
        }
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
