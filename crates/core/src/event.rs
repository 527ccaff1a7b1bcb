// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process lifecycle events.
//!
//! Broadcast to subscribers with at-least-once semantics: the observer,
//! supervisors, registries, and remote monitor relays all consume this
//! stream. Events for a single process are emitted in causal order
//! (`started` before its `stopped`).

use crate::exit::ExitReason;
use crate::id::{MonitorId, ServerId, ServerRef};
use serde::{Deserialize, Serialize};

/// Metadata stored alongside persisted state.
///
/// `schema_version` is always present; `checksum` only when the adapter
/// has checksums enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateMetadata {
    pub persisted_at_ms: u64,
    pub server_id: ServerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// Events that fan out from the process runtime.
///
/// Serializes with `{"type": "event:name", ...fields}` format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LifecycleEvent {
    #[serde(rename = "process:started")]
    Started {
        server: ServerRef,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },

    #[serde(rename = "process:stopped")]
    Stopped { server: ServerRef, reason: ExitReason },

    #[serde(rename = "process:state_restored")]
    StateRestored { server: ServerRef, metadata: StateMetadata },

    #[serde(rename = "process:state_persisted")]
    StatePersisted { server: ServerRef, metadata: StateMetadata },

    #[serde(rename = "process:persistence_error")]
    PersistenceError { server: ServerRef, error: String },

    /// Exactly one per monitor when the monitored process terminates.
    #[serde(rename = "process:down")]
    ProcessDown {
        watcher: ServerRef,
        monitor_id: MonitorId,
        monitored: ServerRef,
        reason: ExitReason,
    },
}

impl LifecycleEvent {
    /// The process this event is about (for ProcessDown, the watcher it
    /// is delivered to).
    pub fn subject(&self) -> &ServerRef {
        match self {
            Self::Started { server, .. }
            | Self::Stopped { server, .. }
            | Self::StateRestored { server, .. }
            | Self::StatePersisted { server, .. }
            | Self::PersistenceError { server, .. } => server,
            Self::ProcessDown { watcher, .. } => watcher,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
