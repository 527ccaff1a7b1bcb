// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only observer snapshot.
//!
//! Produced synchronously from the runtime tables; consumers
//! (dashboards, health endpoints) never reach into the runtime
//! directly.

use crate::runtime::{ProcessStatus, Runtime};
use hive_core::ServerRef;
use serde::Serialize;
use sysinfo::{MemoryRefreshKind, RefreshKind, System};

/// Per-process stats.
#[derive(Debug, Clone, Serialize)]
pub struct ServerStat {
    pub server: ServerRef,
    pub name: Option<String>,
    pub status: ProcessStatus,
    pub message_count: u64,
    pub mailbox_len: usize,
    pub started_at_ms: u64,
    pub last_message_at_ms: Option<u64>,
    pub uptime_ms: u64,
}

/// Per-supervisor stats.
#[derive(Debug, Clone, Serialize)]
pub struct SupervisorStat {
    pub name: Option<String>,
    pub strategy: String,
    pub child_count: usize,
    pub running_children: usize,
    pub restarts_in_window: usize,
}

/// One node of the supervision tree.
#[derive(Debug, Clone, Serialize)]
pub struct TreeNode {
    pub label: String,
    pub children: Vec<TreeNode>,
}

/// Host memory stats.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MemoryStats {
    pub total_bytes: u64,
    pub used_bytes: u64,
}

/// Point-in-time projection of the runtime.
#[derive(Debug, Clone, Serialize)]
pub struct ObserverSnapshot {
    pub timestamp_ms: u64,
    pub servers: Vec<ServerStat>,
    pub supervisors: Vec<SupervisorStat>,
    pub tree: Vec<TreeNode>,
    pub total_processes: usize,
    pub total_messages: u64,
    pub memory: MemoryStats,
}

/// Supervisors surface their stats to the observer through this seam;
/// the runtime keeps weak handles so a dropped supervisor vanishes
/// from snapshots.
pub(crate) trait SupervisorStatSource: Send + Sync {
    fn stat(&self) -> SupervisorStat;
    fn tree(&self) -> TreeNode;
}

impl ObserverSnapshot {
    /// Capture a snapshot. Table reads are synchronous; only the host
    /// memory probe touches the OS.
    pub fn capture(runtime: &Runtime) -> Self {
        let mut servers = runtime.entry_snapshot();
        servers.sort_by(|a, b| a.started_at_ms.cmp(&b.started_at_ms));

        let sources = runtime.supervisor_sources();
        let supervisors: Vec<SupervisorStat> = sources.iter().map(|s| s.stat()).collect();
        let tree: Vec<TreeNode> = sources.iter().map(|s| s.tree()).collect();

        let total_messages = servers.iter().map(|s| s.message_count).sum();
        let total_processes = servers.len();

        Self {
            timestamp_ms: runtime.clock().epoch_ms(),
            servers,
            supervisors,
            tree,
            total_processes,
            total_messages,
            memory: host_memory(),
        }
    }
}

fn host_memory() -> MemoryStats {
    let system = System::new_with_specifics(
        RefreshKind::nothing().with_memory(MemoryRefreshKind::nothing().with_ram()),
    );
    MemoryStats { total_bytes: system.total_memory(), used_bytes: system.used_memory() }
}

#[cfg(test)]
#[path = "observer_tests.rs"]
mod tests;
