// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Replicated global name registry.
//!
//! Every node holds a full mirror; lookups never touch the network.
//! Conflicts resolve deterministically on `(registered_at, priority)`:
//! the earliest registration wins, with the node-id hash breaking
//! ties, so all mirrors converge without coordination.

use crate::cluster::{Cluster, ClusterInner};
use crate::error::GlobalError;
use crate::node::ClusterEvent;
use hive_core::{NodeId, ServerRef};
use hive_wire::{
    GlobalConflictBody, GlobalEntryBody, GlobalRegisterAckBody, GlobalRegisterBody,
    GlobalSyncReplyBody, GlobalUnregisterBody, MessageKind, WireEnvelope,
};
use std::sync::Arc;

impl Cluster {
    /// Register `server` under a cluster-wide unique name.
    pub fn global_register(
        &self,
        name: impl Into<String>,
        server: &ServerRef,
    ) -> Result<(), GlobalError> {
        self.inner.ensure_started()?;
        register(&self.inner, &name.into(), server)
    }

    /// Remove a name owned by this node. A missing or foreign-owned
    /// name is a no-op returning false.
    pub fn global_unregister(&self, name: &str) -> bool {
        if self.inner.ensure_started().is_err() {
            return false;
        }
        let removed = {
            let mut global = self.inner.global.lock();
            match global.get(name) {
                Some(entry) if entry.owner == self.inner.node_id => {
                    global.remove(name);
                    true
                }
                _ => false,
            }
        };
        if removed {
            let body = GlobalUnregisterBody {
                name: name.to_string(),
                owner: self.inner.node_id.clone(),
            };
            if let Ok(envelope) = WireEnvelope::new(
                MessageKind::GlobalUnregister,
                self.inner.node_id.clone(),
                &body,
            ) {
                self.inner.broadcast(&envelope);
            }
        }
        removed
    }

    /// Mirror-only lookup.
    pub fn global_whereis(&self, name: &str) -> Option<ServerRef> {
        self.inner.global.lock().get(name).map(|e| e.server.clone())
    }

    pub fn global_lookup(&self, name: &str) -> Result<ServerRef, GlobalError> {
        self.global_whereis(name)
            .ok_or_else(|| GlobalError::GlobalNameNotFound { name: name.to_string() })
    }

    pub fn global_is_registered(&self, name: &str) -> bool {
        self.inner.global.lock().contains_key(name)
    }

    pub fn global_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.global.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// The node currently owning `name`, if any.
    pub fn global_owner(&self, name: &str) -> Option<NodeId> {
        self.inner.global.lock().get(name).map(|e| e.owner.clone())
    }
}

/// Insert locally and broadcast. Fails fast when the mirror already
/// names a different owner.
pub(crate) fn register(
    inner: &Arc<ClusterInner>,
    name: &str,
    server: &ServerRef,
) -> Result<(), GlobalError> {
    let entry = GlobalEntryBody {
        name: name.to_string(),
        server: ServerRef::remote(server.id, inner.node_id.clone()),
        owner: inner.node_id.clone(),
        registered_at_ms: inner.runtime.clock().epoch_ms(),
        priority: inner.node_id.priority(),
    };
    {
        let mut global = inner.global.lock();
        if let Some(existing) = global.get(name) {
            if existing.owner != inner.node_id {
                return Err(GlobalError::GlobalNameConflict {
                    name: name.to_string(),
                    existing_node: existing.owner.clone(),
                });
            }
        }
        global.insert(name.to_string(), entry.clone());
    }
    let body = GlobalRegisterBody { entry };
    if let Ok(envelope) =
        WireEnvelope::new(MessageKind::GlobalRegister, inner.node_id.clone(), &body)
    {
        inner.broadcast(&envelope);
    }
    Ok(())
}

/// `(registered_at, priority)`: lower wins on both fields.
fn beats(a: &GlobalEntryBody, b: &GlobalEntryBody) -> bool {
    (a.registered_at_ms, a.priority) < (b.registered_at_ms, b.priority)
}

/// Merge a replicated entry into the mirror. Returns the loser to
/// notify when the incoming entry lost against the resident one.
fn merge_entry(inner: &Arc<ClusterInner>, incoming: GlobalEntryBody) -> Option<GlobalEntryBody> {
    let name = incoming.name.clone();
    let (replaced_own, reject) = {
        let mut global = inner.global.lock();
        match global.get(&name) {
            None => {
                global.insert(name.clone(), incoming.clone());
                (false, None)
            }
            Some(existing) if existing.owner == incoming.owner => {
                global.insert(name.clone(), incoming.clone());
                (false, None)
            }
            Some(existing) => {
                if beats(&incoming, existing) {
                    let was_ours = existing.owner == inner.node_id;
                    global.insert(name.clone(), incoming.clone());
                    (was_ours, None)
                } else {
                    (false, Some(existing.clone()))
                }
            }
        }
    };
    if replaced_own {
        tracing::info!(name = %name, winner = %incoming.owner, "lost global name");
        inner.events.emit(ClusterEvent::ConflictResolved {
            name,
            winner: incoming.owner.clone(),
            loser: inner.node_id.clone(),
        });
    }
    reject
}

pub(crate) fn request_sync(inner: &Arc<ClusterInner>, node: &NodeId) {
    if let Ok(envelope) =
        WireEnvelope::new(MessageKind::GlobalSyncRequest, inner.node_id.clone(), &())
    {
        let _ = inner.send_to(node, envelope);
    }
}

/// Drop every registration owned by a departed node.
pub(crate) fn handle_node_down(inner: &ClusterInner, node: &NodeId) {
    let mut global = inner.global.lock();
    global.retain(|_, entry| entry.owner != *node);
}

/// A locally hosted process died: its global names go with it,
/// locally and on every mirror.
pub(crate) fn handle_local_stop(inner: &Arc<ClusterInner>, server: &ServerRef) {
    let names: Vec<String> = {
        let global = inner.global.lock();
        global
            .values()
            .filter(|e| e.owner == inner.node_id && e.server.id == server.id)
            .map(|e| e.name.clone())
            .collect()
    };
    for name in names {
        inner.global.lock().remove(&name);
        let body = GlobalUnregisterBody { name, owner: inner.node_id.clone() };
        if let Ok(envelope) =
            WireEnvelope::new(MessageKind::GlobalUnregister, inner.node_id.clone(), &body)
        {
            inner.broadcast(&envelope);
        }
    }
}

pub(crate) fn handle_frame(inner: &Arc<ClusterInner>, envelope: WireEnvelope) {
    let from = envelope.from.clone();
    match envelope.kind {
        MessageKind::GlobalRegister => {
            let Ok(body) = envelope.body_as::<GlobalRegisterBody>() else { return };
            let incoming = body.entry;
            let name = incoming.name.clone();
            let loser_owner = incoming.owner.clone();
            match merge_entry(inner, incoming) {
                None => {
                    let ack = GlobalRegisterAckBody { name };
                    if let Ok(reply) = WireEnvelope::new(
                        MessageKind::GlobalRegisterAck,
                        inner.node_id.clone(),
                        &ack,
                    ) {
                        let _ = inner.send_to(&from, reply);
                    }
                }
                Some(winner) => {
                    // The sender lost against our resident entry; tell
                    // them who won.
                    let conflict =
                        GlobalConflictBody { name, winner, loser: loser_owner };
                    if let Ok(reply) = WireEnvelope::new(
                        MessageKind::GlobalConflict,
                        inner.node_id.clone(),
                        &conflict,
                    ) {
                        let _ = inner.send_to(&from, reply);
                    }
                }
            }
        }
        MessageKind::GlobalRegisterAck => {
            // Registration is broadcast-and-converge; acks are only
            // useful for tracing.
            if let Ok(body) = envelope.body_as::<GlobalRegisterAckBody>() {
                tracing::trace!(name = %body.name, peer = %from, "global register acked");
            }
        }
        MessageKind::GlobalUnregister => {
            let Ok(body) = envelope.body_as::<GlobalUnregisterBody>() else { return };
            let mut global = inner.global.lock();
            if let Some(entry) = global.get(&body.name) {
                if entry.owner == body.owner {
                    global.remove(&body.name);
                }
            }
        }
        MessageKind::GlobalConflict => {
            let Ok(body) = envelope.body_as::<GlobalConflictBody>() else { return };
            let lost_ours = body.loser == inner.node_id;
            {
                let mut global = inner.global.lock();
                global.insert(body.name.clone(), body.winner.clone());
            }
            if lost_ours {
                tracing::info!(name = %body.name, winner = %body.winner.owner, "lost global name");
                inner.events.emit(ClusterEvent::ConflictResolved {
                    name: body.name,
                    winner: body.winner.owner,
                    loser: body.loser,
                });
            }
        }
        MessageKind::GlobalSyncRequest => {
            let entries: Vec<GlobalEntryBody> =
                inner.global.lock().values().cloned().collect();
            let reply_body = GlobalSyncReplyBody { entries };
            if let Ok(reply) = WireEnvelope::new(
                MessageKind::GlobalSyncReply,
                inner.node_id.clone(),
                &reply_body,
            ) {
                let _ = inner.send_to(&from, reply);
            }
        }
        MessageKind::GlobalSyncReply => {
            let Ok(body) = envelope.body_as::<GlobalSyncReplyBody>() else { return };
            for entry in body.entries {
                merge_entry(inner, entry);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
#[path = "global_tests.rs"]
mod tests;
