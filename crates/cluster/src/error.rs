// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the distribution layer.

use hive_core::{NodeId, NodeIdError, ServerId};
use hive_wire::WireError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClusterError {
    #[error("cluster is not started")]
    ClusterNotStarted,

    #[error("invalid cluster config: {message}")]
    InvalidClusterConfig { message: String },

    #[error(transparent)]
    InvalidNodeId(#[from] NodeIdError),

    #[error("node {node} is not reachable")]
    NodeNotReachable { node: NodeId },

    #[error("failed to bind {addr}: {message}")]
    Bind { addr: String, message: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error("remote call to {id} on {node} timed out after {timeout_ms}ms")]
    RemoteCallTimeout { id: ServerId, node: NodeId, timeout_ms: u64 },

    #[error("remote server {id} on {node} is not running")]
    RemoteServerNotRunning { id: ServerId, node: NodeId },

    #[error("behavior {name:?} is not in the catalog on {node}")]
    BehaviorNotFound { name: String, node: NodeId },

    #[error("remote spawn of {behavior:?} on {node} timed out")]
    RemoteSpawnTimeout { behavior: String, node: NodeId },

    #[error("remote spawn of {behavior:?} failed to init: {message}")]
    RemoteSpawnInit { behavior: String, message: String },

    #[error("remote spawn registration failed: {message}")]
    RemoteSpawnRegistration { message: String },

    #[error("remote monitor setup on {node} timed out")]
    RemoteMonitorTimeout { node: NodeId },

    #[error("remote link setup on {node} timed out")]
    RemoteLinkTimeout { node: NodeId },

    #[error("remote stop on {node} timed out")]
    RemoteStopTimeout { node: NodeId },

    #[error("message serialization failed during {op}: {message}")]
    MessageSerialization { op: &'static str, message: String },

    #[error("remote node reported: {message}")]
    Remote { message: String },
}

impl RemoteError {
    pub(crate) fn serialization(op: &'static str, err: WireError) -> Self {
        Self::MessageSerialization { op, message: err.to_string() }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GlobalError {
    #[error("name {name:?} is already registered by {existing_node}")]
    GlobalNameConflict { name: String, existing_node: NodeId },

    #[error("name {name:?} is not globally registered")]
    GlobalNameNotFound { name: String },

    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DistSupervisorError {
    #[error("no connected node satisfies the selector for child {child_id:?}")]
    NoAvailableNode { child_id: String },

    #[error("behavior {name:?} is not in the catalog on {node}")]
    DistributedBehaviorNotFound { name: String, node: NodeId },

    #[error("child {child_id:?} is claimed by another supervisor")]
    DistributedChildClaim { child_id: String },

    #[error("simple_one_for_one requires a child template")]
    MissingChildTemplate,

    #[error("simple_one_for_one forbids static children")]
    InvalidSimpleOneForOne,

    #[error("child {child_id:?} already exists")]
    DuplicateChild { child_id: String },

    #[error("child {child_id:?} not found")]
    ChildNotFound { child_id: String },

    #[error("restart intensity exceeded: {restarts} restarts in {within_ms}ms")]
    MaxRestartsExceeded { restarts: u32, within_ms: u64 },

    #[error("distributed supervisor is not running")]
    NotRunning,

    #[error(transparent)]
    Remote(#[from] RemoteError),
}
