// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for persistence operations.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("no persisted state found for key {key:?}")]
    StateNotFound { key: String },

    #[error("failed to serialize state: {message}")]
    Serialization { message: String },

    #[error("failed to deserialize state for key {key:?}: {message}")]
    Deserialization { key: String, message: String },

    #[error("persisted state for key {key:?} is corrupted: {message}")]
    CorruptedState { key: String, message: String },

    #[error("persisted state for key {key:?} is {age_ms}ms old (max {max_age_ms}ms)")]
    StaleState { key: String, age_ms: u64, max_age_ms: u64 },

    #[error("storage operation {op} failed: {message}")]
    Storage { op: &'static str, message: String },

    #[error("migration from schema {from} to {to} failed: {message}")]
    Migration { from: u32, to: u32, message: String },

    #[error("checksum mismatch for key {key:?}")]
    ChecksumMismatch { key: String },

    /// `before_persist` vetoed the snapshot during a manual checkpoint.
    #[error("persistence skipped: before_persist returned no state")]
    PersistSkipped,
}

impl StoreError {
    pub(crate) fn storage(op: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Storage { op, message: err.to_string() }
    }
}
