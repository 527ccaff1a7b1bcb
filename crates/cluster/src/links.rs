// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote monitors and links.
//!
//! Both are relay-based: the node hosting a watched/linked process
//! observes its local `stopped` events and forwards `process_down` or
//! `exit_signal` frames to the peer, which raises the local effect.
//! Node loss synthesizes `noconnection` for every relationship whose
//! peer lived on the lost node.

use crate::cluster::{Cluster, ClusterInner};
use crate::error::RemoteError;
use crate::remote::RequestError;
use hive_core::{
    ExitReason, LifecycleEvent, LinkId, MonitorId, NodeId, ServerId, ServerRef,
};
use hive_wire::{
    DemonitorBody, ExitSignalBody, LinkAckBody, LinkRequestBody, MessageKind, MonitorAckBody,
    MonitorRequestBody, ProcessDownBody, UnlinkBody, WireEnvelope,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const SETUP_TIMEOUT: Duration = Duration::from_millis(5_000);

/// A monitor this node requested on a remote target.
pub(crate) struct OutgoingMonitor {
    pub watcher: ServerRef,
    pub target: ServerRef,
    pub node: NodeId,
}

/// A relay for a remote watcher monitoring a local target.
pub(crate) struct IncomingMonitor {
    pub watcher: ServerRef,
    pub watcher_node: NodeId,
    pub target: ServerId,
}

#[derive(Default)]
pub(crate) struct RemoteMonitorTables {
    pub outgoing: HashMap<MonitorId, OutgoingMonitor>,
    pub incoming: HashMap<MonitorId, IncomingMonitor>,
}

/// One endpoint's view of a cross-node link.
pub(crate) struct RemoteLink {
    pub local: ServerRef,
    pub remote: ServerRef,
    pub node: NodeId,
}

impl Cluster {
    /// Monitor a process on another node.
    ///
    /// Local targets delegate to the runtime. Setup is request/ack;
    /// a dead target produces an immediate `process_down { noproc }`.
    pub async fn monitor(
        &self,
        watcher: &ServerRef,
        target: &ServerRef,
    ) -> Result<MonitorId, RemoteError> {
        self.inner.ensure_started()?;
        let node = match &target.node {
            Some(node) if *node != self.inner.node_id => node.clone(),
            _ => {
                return Ok(self
                    .inner
                    .runtime
                    .monitor(watcher, &ServerRef::local(target.id)));
            }
        };

        let monitor_id = MonitorId::new();
        self.inner.monitors.lock().outgoing.insert(
            monitor_id,
            OutgoingMonitor {
                watcher: watcher.clone(),
                target: target.clone(),
                node: node.clone(),
            },
        );

        let body = MonitorRequestBody {
            monitor_id,
            watcher: watcher.clone(),
            target: target.id,
        };
        let envelope =
            WireEnvelope::new(MessageKind::MonitorRequest, self.inner.node_id.clone(), &body)
                .map_err(|e| RemoteError::serialization("monitor", e))?;

        let reply = match self.inner.request(&node, envelope, SETUP_TIMEOUT).await {
            Ok(reply) => reply,
            Err(err) => {
                self.inner.monitors.lock().outgoing.remove(&monitor_id);
                return Err(match err {
                    RequestError::Timeout => {
                        RemoteError::RemoteMonitorTimeout { node: node.clone() }
                    }
                    RequestError::Remote(err) => err,
                });
            }
        };

        let ack: MonitorAckBody =
            reply.body_as().map_err(|e| RemoteError::serialization("monitor", e))?;
        if let Some(reason) = ack.immediate_down {
            self.inner.monitors.lock().outgoing.remove(&monitor_id);
            self.inner.runtime.events().emit(LifecycleEvent::ProcessDown {
                watcher: watcher.clone(),
                monitor_id,
                monitored: target.clone(),
                reason,
            });
        }
        Ok(monitor_id)
    }

    /// Tear down a monitor on both sides (best effort remotely).
    pub fn demonitor(&self, monitor_id: &MonitorId) -> bool {
        let removed = self.inner.monitors.lock().outgoing.remove(monitor_id);
        match removed {
            Some(outgoing) => {
                let body = DemonitorBody { monitor_id: *monitor_id };
                if let Ok(envelope) = WireEnvelope::new(
                    MessageKind::Demonitor,
                    self.inner.node_id.clone(),
                    &body,
                ) {
                    let _ = self.inner.send_to(&outgoing.node, envelope);
                }
                true
            }
            None => self.inner.runtime.demonitor(monitor_id),
        }
    }

    /// Link a local process to one on another node.
    ///
    /// The handshake registers the link on both nodes; a dead remote
    /// endpoint delivers an immediate `noproc` exit signal locally.
    pub async fn link(
        &self,
        local: &ServerRef,
        remote: &ServerRef,
    ) -> Result<LinkId, RemoteError> {
        self.inner.ensure_started()?;
        let node = match &remote.node {
            Some(node) if *node != self.inner.node_id => node.clone(),
            _ => {
                return Ok(self
                    .inner
                    .runtime
                    .link(local, &ServerRef::local(remote.id)));
            }
        };

        let link_id = LinkId::new();
        self.inner.links.lock().insert(
            link_id,
            RemoteLink { local: local.clone(), remote: remote.clone(), node: node.clone() },
        );

        let body = LinkRequestBody {
            link_id,
            from_process: local_as_seen_by_peer(&self.inner, local),
            to_process: remote.id,
        };
        let envelope =
            WireEnvelope::new(MessageKind::LinkRequest, self.inner.node_id.clone(), &body)
                .map_err(|e| RemoteError::serialization("link", e))?;

        let reply = match self.inner.request(&node, envelope, SETUP_TIMEOUT).await {
            Ok(reply) => reply,
            Err(err) => {
                self.inner.links.lock().remove(&link_id);
                return Err(match err {
                    RequestError::Timeout => {
                        RemoteError::RemoteLinkTimeout { node: node.clone() }
                    }
                    RequestError::Remote(err) => err,
                });
            }
        };

        let ack: LinkAckBody =
            reply.body_as().map_err(|e| RemoteError::serialization("link", e))?;
        if let Some(reason) = ack.immediate_exit {
            self.inner.links.lock().remove(&link_id);
            self.inner.runtime.exit_signal(local, remote, reason);
        }
        Ok(link_id)
    }

    /// Remove a link from both nodes.
    pub fn unlink(&self, link_id: &LinkId) -> bool {
        let removed = self.inner.links.lock().remove(link_id);
        match removed {
            Some(link) => {
                let body = UnlinkBody { link_id: *link_id };
                if let Ok(envelope) =
                    WireEnvelope::new(MessageKind::Unlink, self.inner.node_id.clone(), &body)
                {
                    let _ = self.inner.send_to(&link.node, envelope);
                }
                true
            }
            None => self.inner.runtime.unlink(link_id),
        }
    }
}

/// A local ref rewritten with this node's identity, so the peer can
/// route signals back.
fn local_as_seen_by_peer(inner: &ClusterInner, server: &ServerRef) -> ServerRef {
    ServerRef::remote(server.id, inner.node_id.clone())
}

/// Watch local `stopped` events and forward the remote consequences.
pub(crate) fn spawn_lifecycle_relay(inner: Arc<ClusterInner>) {
    let mut events = inner.runtime.subscribe();
    let cancel = inner.cancel.clone();
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            let LifecycleEvent::Stopped { server, reason } = event else { continue };
            relay_local_stop(&inner, &server, &reason);
            crate::global::handle_local_stop(&inner, &server);
        }
    });
}

fn relay_local_stop(inner: &Arc<ClusterInner>, server: &ServerRef, reason: &ExitReason) {
    // Monitors relayed for remote watchers: exactly one process_down
    // frame each.
    let fired: Vec<(MonitorId, IncomingMonitor)> = {
        let mut monitors = inner.monitors.lock();
        let ids: Vec<MonitorId> = monitors
            .incoming
            .iter()
            .filter(|(_, m)| m.target == server.id)
            .map(|(id, _)| *id)
            .collect();
        ids.into_iter()
            .filter_map(|id| monitors.incoming.remove(&id).map(|m| (id, m)))
            .collect()
    };
    for (monitor_id, monitor) in fired {
        let body = ProcessDownBody {
            monitor_id,
            monitored: local_as_seen_by_peer(inner, server),
            reason: reason.clone(),
        };
        if let Ok(envelope) =
            WireEnvelope::new(MessageKind::ProcessDown, inner.node_id.clone(), &body)
        {
            let _ = inner.send_to(&monitor.watcher_node, envelope);
        }
    }

    // Monitors this process held over remote targets: best-effort
    // demonitor.
    let held: Vec<(MonitorId, NodeId)> = {
        let mut monitors = inner.monitors.lock();
        let ids: Vec<MonitorId> = monitors
            .outgoing
            .iter()
            .filter(|(_, m)| m.watcher.id == server.id)
            .map(|(id, _)| *id)
            .collect();
        ids.into_iter()
            .filter_map(|id| monitors.outgoing.remove(&id).map(|m| (id, m.node)))
            .collect()
    };
    for (monitor_id, node) in held {
        let body = DemonitorBody { monitor_id };
        if let Ok(envelope) =
            WireEnvelope::new(MessageKind::Demonitor, inner.node_id.clone(), &body)
        {
            let _ = inner.send_to(&node, envelope);
        }
    }

    // Links whose local endpoint just died: exit signal on abnormal
    // exits, silent removal otherwise.
    let links: Vec<(LinkId, RemoteLink)> = {
        let mut table = inner.links.lock();
        let ids: Vec<LinkId> = table
            .iter()
            .filter(|(_, l)| l.local.id == server.id)
            .map(|(id, _)| *id)
            .collect();
        ids.into_iter().filter_map(|id| table.remove(&id).map(|l| (id, l))).collect()
    };
    for (link_id, link) in links {
        let kind = if reason.is_abnormal() {
            MessageKind::ExitSignal
        } else {
            MessageKind::Unlink
        };
        let envelope = match kind {
            MessageKind::ExitSignal => WireEnvelope::new(
                MessageKind::ExitSignal,
                inner.node_id.clone(),
                &ExitSignalBody {
                    link_id,
                    from_process: local_as_seen_by_peer(inner, server),
                    to_process: link.remote.id,
                    reason: reason.clone(),
                },
            ),
            _ => WireEnvelope::new(
                MessageKind::Unlink,
                inner.node_id.clone(),
                &UnlinkBody { link_id },
            ),
        };
        if let Ok(envelope) = envelope {
            let _ = inner.send_to(&link.node, envelope);
        }
    }
}

/// Synthesize `noconnection` for every relationship whose peer lived
/// on the lost node.
pub(crate) fn handle_node_down(inner: &ClusterInner, node: &NodeId) {
    let downs: Vec<(MonitorId, OutgoingMonitor)> = {
        let mut monitors = inner.monitors.lock();
        let ids: Vec<MonitorId> = monitors
            .outgoing
            .iter()
            .filter(|(_, m)| m.node == *node)
            .map(|(id, _)| *id)
            .collect();
        let downs = ids
            .into_iter()
            .filter_map(|id| monitors.outgoing.remove(&id).map(|m| (id, m)))
            .collect();
        monitors.incoming.retain(|_, m| m.watcher_node != *node);
        downs
    };
    for (monitor_id, monitor) in downs {
        inner.runtime.events().emit(LifecycleEvent::ProcessDown {
            watcher: monitor.watcher,
            monitor_id,
            monitored: monitor.target,
            reason: ExitReason::Noconnection,
        });
    }

    let links: Vec<RemoteLink> = {
        let mut table = inner.links.lock();
        let ids: Vec<LinkId> =
            table.iter().filter(|(_, l)| l.node == *node).map(|(id, _)| *id).collect();
        ids.into_iter().filter_map(|id| table.remove(&id)).collect()
    };
    for link in links {
        inner
            .runtime
            .exit_signal(&link.local, &link.remote, ExitReason::Noconnection);
    }
}

/// Incoming monitor/link traffic.
pub(crate) fn handle_frame(inner: &Arc<ClusterInner>, envelope: WireEnvelope) {
    let from = envelope.from.clone();
    let corr_id = envelope.corr_id;
    match envelope.kind {
        MessageKind::MonitorRequest => {
            let Ok(body) = envelope.body_as::<MonitorRequestBody>() else { return };
            let target = ServerRef::local(body.target);
            let immediate_down = if inner.runtime.is_alive(&target) {
                inner.monitors.lock().incoming.insert(
                    body.monitor_id,
                    IncomingMonitor {
                        watcher: body.watcher,
                        watcher_node: from.clone(),
                        target: body.target,
                    },
                );
                None
            } else {
                Some(ExitReason::Noproc)
            };
            let ack = MonitorAckBody { monitor_id: body.monitor_id, immediate_down };
            if let Ok(mut reply) =
                WireEnvelope::new(MessageKind::MonitorAck, inner.node_id.clone(), &ack)
            {
                if let Some(corr_id) = corr_id {
                    reply = reply.with_corr(corr_id);
                }
                let _ = inner.send_to(&from, reply);
            }
        }
        MessageKind::Demonitor => {
            if let Ok(body) = envelope.body_as::<DemonitorBody>() {
                inner.monitors.lock().incoming.remove(&body.monitor_id);
            }
        }
        MessageKind::ProcessDown => {
            let Ok(body) = envelope.body_as::<ProcessDownBody>() else { return };
            let removed = inner.monitors.lock().outgoing.remove(&body.monitor_id);
            if let Some(outgoing) = removed {
                inner.runtime.events().emit(LifecycleEvent::ProcessDown {
                    watcher: outgoing.watcher,
                    monitor_id: body.monitor_id,
                    monitored: body.monitored,
                    reason: body.reason,
                });
            }
        }
        MessageKind::LinkRequest => {
            let Ok(body) = envelope.body_as::<LinkRequestBody>() else { return };
            let target = ServerRef::local(body.to_process);
            let immediate_exit = if inner.runtime.is_alive(&target) {
                inner.links.lock().insert(
                    body.link_id,
                    RemoteLink {
                        local: target,
                        remote: body.from_process,
                        node: from.clone(),
                    },
                );
                None
            } else {
                Some(ExitReason::Noproc)
            };
            let ack = LinkAckBody { link_id: body.link_id, immediate_exit };
            if let Ok(mut reply) =
                WireEnvelope::new(MessageKind::LinkAck, inner.node_id.clone(), &ack)
            {
                if let Some(corr_id) = corr_id {
                    reply = reply.with_corr(corr_id);
                }
                let _ = inner.send_to(&from, reply);
            }
        }
        MessageKind::Unlink => {
            if let Ok(body) = envelope.body_as::<UnlinkBody>() {
                inner.links.lock().remove(&body.link_id);
            }
        }
        MessageKind::ExitSignal => {
            let Ok(body) = envelope.body_as::<ExitSignalBody>() else { return };
            inner.links.lock().remove(&body.link_id);
            let target = ServerRef::local(body.to_process);
            inner.runtime.exit_signal(&target, &body.from_process, body.reason);
        }
        _ => {}
    }
}
