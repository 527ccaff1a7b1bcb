// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-flight remote request table.
//!
//! Every remote call, spawn, monitor, link, and stop parks a waiter
//! here keyed by a fresh correlation id. Replies complete the entry;
//! peer loss fails every entry for that peer with `NodeNotReachable`.

use crate::error::{ClusterError, RemoteError};
use hive_core::{CorrId, NodeId};
use hive_wire::WireEnvelope;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::oneshot;

struct Pending {
    node: NodeId,
    tx: oneshot::Sender<Result<WireEnvelope, RemoteError>>,
}

#[derive(Default)]
pub(crate) struct PendingTable {
    entries: Mutex<HashMap<CorrId, Pending>>,
}

impl PendingTable {
    /// Park a waiter for `corr_id` addressed to `node`.
    pub fn insert(
        &self,
        corr_id: CorrId,
        node: NodeId,
    ) -> oneshot::Receiver<Result<WireEnvelope, RemoteError>> {
        let (tx, rx) = oneshot::channel();
        self.entries.lock().insert(corr_id, Pending { node, tx });
        rx
    }

    /// Complete a waiter with a reply envelope. Unknown ids are
    /// ignored (late replies after timeout).
    pub fn complete(&self, corr_id: &CorrId, envelope: WireEnvelope) {
        if let Some(pending) = self.entries.lock().remove(corr_id) {
            let _ = pending.tx.send(Ok(envelope));
        }
    }

    /// Drop a waiter (timeout path); any late reply is discarded.
    pub fn remove(&self, corr_id: &CorrId) {
        self.entries.lock().remove(corr_id);
    }

    /// Fail every entry addressed to `node`.
    pub fn fail_node(&self, node: &NodeId) {
        let mut entries = self.entries.lock();
        let ids: Vec<CorrId> = entries
            .iter()
            .filter(|(_, p)| p.node == *node)
            .map(|(id, _)| *id)
            .collect();
        for id in ids {
            if let Some(pending) = entries.remove(&id) {
                let _ = pending.tx.send(Err(RemoteError::Cluster(
                    ClusterError::NodeNotReachable { node: node.clone() },
                )));
            }
        }
    }

    /// Fail everything (node shutdown).
    pub fn fail_all(&self, node: &NodeId) {
        let mut entries = self.entries.lock();
        for (_, pending) in entries.drain() {
            let _ = pending.tx.send(Err(RemoteError::Cluster(
                ClusterError::NodeNotReachable { node: node.clone() },
            )));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

#[cfg(test)]
#[path = "correlation_tests.rs"]
mod tests;
