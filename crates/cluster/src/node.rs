// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node records and cluster events.

use hive_core::NodeId;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;

/// Connection state of a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Connecting,
    Connected,
    Disconnected,
}

hive_core::simple_display! {
    NodeStatus {
        Connecting => "connecting",
        Connected => "connected",
        Disconnected => "disconnected",
    }
}

/// What this node knows about a peer (or itself).
#[derive(Debug, Clone, Serialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub status: NodeStatus,
    pub last_heartbeat_ms: u64,
    pub process_count: usize,
    pub uptime_ms: u64,
}

/// Cluster-level events, delivered in the order the transitions
/// happen.
#[derive(Debug, Clone)]
pub enum ClusterEvent {
    NodeUp { node: NodeRecord },
    NodeDown { node: NodeId, reason: String },
    StatusChange { node: NodeId, status: NodeStatus },
    /// A global-name conflict was resolved against a local
    /// registration.
    ConflictResolved { name: String, winner: NodeId, loser: NodeId },
    /// A distributed supervisor re-placed a child after node loss.
    ChildMigrated { child_id: String, from: NodeId, to: NodeId },
}

/// Fan-out for cluster events, mirroring the runtime's lifecycle hub.
#[derive(Default)]
pub(crate) struct ClusterEventHub {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<ClusterEvent>>>,
}

impl ClusterEventHub {
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ClusterEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn emit(&self, event: ClusterEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
