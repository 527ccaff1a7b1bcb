// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed bodies for each message kind.
//!
//! These structs are the cluster contract: both ends of a connection
//! must agree on their serde shape, so changes here are protocol
//! changes.

use hive_core::{ExitReason, LinkId, MonitorId, NodeId, ServerId, ServerRef};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `hello` / `hello_ack`: identity plus the sender's current peer
/// list, so a single seed is enough to mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelloBody {
    pub node: NodeId,
    pub peers: Vec<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatBody {
    pub process_count: usize,
    pub uptime_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerListBody {
    pub peers: Vec<NodeId>,
}

/// Graceful departure notice; suppresses reconnection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDownBody {
    pub node: NodeId,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRequestBody {
    pub target: ServerId,
    pub msg: Value,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallReplyBody {
    pub value: Value,
}

/// Typed failure for `call_error` and `spawn_reply` errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteErrorKind {
    ServerNotRunning,
    CallTimeout,
    BehaviorNotFound,
    InitFailed,
    RegistrationConflict,
    Serialization,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallErrorBody {
    pub kind: RemoteErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastBody {
    pub target: ServerId,
    pub msg: Value,
}

/// How a remotely spawned server should be registered on its node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnRegistration {
    #[default]
    None,
    Local,
    Global,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnRequestBody {
    pub behavior: String,
    pub args: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub registration: SpawnRegistration,
    #[serde(default)]
    pub trap_exit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnReplyBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CallErrorBody>,
}

/// Orderly remote stop (supervision shutdown and child migration).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopRequestBody {
    pub target: ServerId,
    pub reason: ExitReason,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopReplyBody {
    /// False when the target was already gone.
    pub stopped: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorRequestBody {
    pub monitor_id: MonitorId,
    pub watcher: ServerRef,
    pub target: ServerId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorAckBody {
    pub monitor_id: MonitorId,
    /// Set when the target was already dead at registration time; the
    /// watcher's node raises the down event locally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub immediate_down: Option<ExitReason>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemonitorBody {
    pub monitor_id: MonitorId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessDownBody {
    pub monitor_id: MonitorId,
    pub monitored: ServerRef,
    pub reason: ExitReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRequestBody {
    pub link_id: LinkId,
    /// The requesting process (on the sender's node).
    pub from_process: ServerRef,
    /// The target process on the receiving node.
    pub to_process: ServerId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkAckBody {
    pub link_id: LinkId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub immediate_exit: Option<ExitReason>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnlinkBody {
    pub link_id: LinkId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitSignalBody {
    pub link_id: LinkId,
    pub from_process: ServerRef,
    pub to_process: ServerId,
    pub reason: ExitReason,
}

/// One global-registry entry as replicated between nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalEntryBody {
    pub name: String,
    pub server: ServerRef,
    pub owner: NodeId,
    pub registered_at_ms: u64,
    pub priority: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalRegisterBody {
    pub entry: GlobalEntryBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalRegisterAckBody {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalUnregisterBody {
    pub name: String,
    pub owner: NodeId,
}

/// Sent to the losing registrant after deterministic resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalConflictBody {
    pub name: String,
    pub winner: GlobalEntryBody,
    pub loser: NodeId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalSyncReplyBody {
    pub entries: Vec<GlobalEntryBody>,
}
