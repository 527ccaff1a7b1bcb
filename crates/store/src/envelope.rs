// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted state envelope.

use crate::error::StoreError;
use hive_core::StateMetadata;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// State plus the metadata recorded at persist time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEnvelope {
    pub state: Value,
    pub metadata: StateMetadata,
}

impl StateEnvelope {
    /// Verify the stored checksum (when present) against the state.
    pub fn verify_checksum(&self, key: &str) -> Result<(), StoreError> {
        if let Some(expected) = &self.metadata.checksum {
            let actual = state_checksum(&self.state)?;
            if actual != *expected {
                return Err(StoreError::ChecksumMismatch { key: key.to_string() });
            }
        }
        Ok(())
    }
}

/// SHA-256 (hex) over the canonical serialization of a state value.
pub fn state_checksum(state: &Value) -> Result<String, StoreError> {
    let canonical = serde_json::to_string(state)
        .map_err(|e| StoreError::Serialization { message: e.to_string() })?;
    Ok(format!("{:x}", Sha256::digest(canonical.as_bytes())))
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
