// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cluster runtime: listener, handshake, gossip, heartbeats, dispatch.

use crate::catalog::BehaviorCatalog;
use crate::config::ClusterConfig;
use crate::correlation::PendingTable;
use crate::error::ClusterError;
use crate::node::{ClusterEvent, ClusterEventHub, NodeRecord, NodeStatus};
use crate::peer::{spawn_reader, spawn_writer, PeerHandle};
use crate::{global, links, remote};
use hive_core::NodeId;
use hive_runtime::Runtime;
use hive_wire::{
    decode, encode, read_frame, write_frame, GlobalEntryBody, HeartbeatBody, HelloBody,
    MessageKind, NodeDownBody, PeerListBody, WireEnvelope,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(5_000);

pub(crate) struct ClusterInner {
    pub config: ClusterConfig,
    pub node_id: NodeId,
    pub runtime: Runtime,
    pub catalog: BehaviorCatalog,
    pub peers: Mutex<HashMap<NodeId, PeerHandle>>,
    pub dialing: Mutex<HashSet<NodeId>>,
    pub pending: PendingTable,
    pub global: Mutex<HashMap<String, GlobalEntryBody>>,
    pub monitors: Mutex<links::RemoteMonitorTables>,
    pub links: Mutex<HashMap<hive_core::LinkId, links::RemoteLink>>,
    pub events: ClusterEventHub,
    pub cancel: CancellationToken,
    pub stopped: AtomicBool,
    pub started_at_ms: u64,
    conn_seq: AtomicU64,
}

/// One node's membership in the cluster.
///
/// Cheap to clone. Stopping the cluster leaves the local [`Runtime`]
/// running; only distribution is torn down.
#[derive(Clone)]
pub struct Cluster {
    pub(crate) inner: Arc<ClusterInner>,
}

impl Cluster {
    /// Validate the config, bind the listener, dial the seeds.
    ///
    /// Binding port 0 resolves the advertised identity from the bound
    /// address, which is how tests run many nodes on one host.
    pub async fn start(
        runtime: Runtime,
        catalog: BehaviorCatalog,
        config: ClusterConfig,
    ) -> Result<Self, ClusterError> {
        config.validate()?;

        let mut seeds = Vec::with_capacity(config.seeds.len());
        for seed in &config.seeds {
            seeds.push(seed.parse::<NodeId>()?);
        }

        let bind_addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| ClusterError::Bind {
            addr: bind_addr.clone(),
            message: e.to_string(),
        })?;
        let port = listener
            .local_addr()
            .map_err(|e| ClusterError::Bind { addr: bind_addr, message: e.to_string() })?
            .port();
        let node_id = NodeId::new(&config.node_name, config.advertised_host(), port)?;

        let started_at_ms = runtime.clock().epoch_ms();
        let inner = Arc::new(ClusterInner {
            config,
            node_id: node_id.clone(),
            runtime,
            catalog,
            peers: Mutex::new(HashMap::new()),
            dialing: Mutex::new(HashSet::new()),
            pending: PendingTable::default(),
            global: Mutex::new(HashMap::new()),
            monitors: Mutex::new(links::RemoteMonitorTables::default()),
            links: Mutex::new(HashMap::new()),
            events: ClusterEventHub::default(),
            cancel: CancellationToken::new(),
            stopped: AtomicBool::new(false),
            started_at_ms,
            conn_seq: AtomicU64::new(0),
        });

        spawn_accept_loop(inner.clone(), listener);
        spawn_heartbeat_loop(inner.clone());
        links::spawn_lifecycle_relay(inner.clone());

        for seed in seeds {
            spawn_connect_with_retry(inner.clone(), seed);
        }

        tracing::info!(node = %node_id, "cluster node started");
        Ok(Self { inner })
    }

    pub fn node_id(&self) -> &NodeId {
        &self.inner.node_id
    }

    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    pub fn catalog(&self) -> &BehaviorCatalog {
        &self.inner.catalog
    }

    /// Subscribe to node and registry events.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ClusterEvent> {
        self.inner.events.subscribe()
    }

    /// Currently connected peers (excluding this node).
    pub fn connected_nodes(&self) -> Vec<NodeRecord> {
        let peers = self.inner.peers.lock();
        let mut nodes: Vec<NodeRecord> = peers
            .values()
            .filter(|p| p.status == NodeStatus::Connected)
            .map(peer_record)
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }

    /// Every peer this node has ever known, any status.
    pub fn nodes(&self) -> Vec<NodeRecord> {
        let peers = self.inner.peers.lock();
        let mut nodes: Vec<NodeRecord> = peers.values().map(peer_record).collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }

    /// This node, as a record (used by placement selectors).
    pub fn self_record(&self) -> NodeRecord {
        let now_ms = self.inner.runtime.clock().epoch_ms();
        NodeRecord {
            id: self.inner.node_id.clone(),
            status: NodeStatus::Connected,
            last_heartbeat_ms: now_ms,
            process_count: self.inner.runtime.process_count(),
            uptime_ms: now_ms.saturating_sub(self.inner.started_at_ms),
        }
    }

    /// Graceful shutdown: tell peers, then cancel everything.
    /// In-flight remote requests fail with `NodeNotReachable`.
    pub async fn stop(&self) {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        let body = NodeDownBody { node: self.inner.node_id.clone(), reason: "shutdown".into() };
        if let Ok(envelope) =
            WireEnvelope::new(MessageKind::NodeDown, self.inner.node_id.clone(), &body)
        {
            let peers = self.inner.peers.lock();
            for peer in peers.values().filter(|p| p.status == NodeStatus::Connected) {
                let _ = peer.outbound.send(envelope.clone());
            }
        }
        // Let writer tasks flush the departure notice.
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.inner.cancel.cancel();
        self.inner.pending.fail_all(&self.inner.node_id);
        let mut peers = self.inner.peers.lock();
        for peer in peers.values_mut() {
            peer.cancel.cancel();
            peer.status = NodeStatus::Disconnected;
        }
        tracing::info!(node = %self.inner.node_id, "cluster node stopped");
    }
}

fn peer_record(peer: &PeerHandle) -> NodeRecord {
    NodeRecord {
        id: peer.node.clone(),
        status: peer.status,
        last_heartbeat_ms: peer.last_heartbeat_ms,
        process_count: peer.process_count,
        uptime_ms: peer.uptime_ms,
    }
}

impl ClusterInner {
    pub(crate) fn ensure_started(&self) -> Result<(), ClusterError> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(ClusterError::ClusterNotStarted);
        }
        Ok(())
    }

    /// Queue an envelope to a connected peer.
    pub(crate) fn send_to(
        &self,
        node: &NodeId,
        envelope: WireEnvelope,
    ) -> Result<(), ClusterError> {
        let peers = self.peers.lock();
        let peer = peers
            .get(node)
            .filter(|p| p.status == NodeStatus::Connected)
            .ok_or_else(|| ClusterError::NodeNotReachable { node: node.clone() })?;
        peer.outbound
            .send(envelope)
            .map_err(|_| ClusterError::NodeNotReachable { node: node.clone() })
    }

    /// Queue an envelope to every connected peer.
    pub(crate) fn broadcast(&self, envelope: &WireEnvelope) {
        let peers = self.peers.lock();
        for peer in peers.values().filter(|p| p.status == NodeStatus::Connected) {
            let _ = peer.outbound.send(envelope.clone());
        }
    }

    /// Socket-level failure observed by a reader or writer task. The
    /// generation guard keeps a replaced connection's death from
    /// touching its successor.
    pub(crate) fn connection_lost(self: &Arc<Self>, node: &NodeId, generation: u64, reason: &str) {
        if self.stopped.load(Ordering::SeqCst) {
            return;
        }
        {
            let peers = self.peers.lock();
            if !peers.get(node).is_some_and(|p| p.generation == generation) {
                return;
            }
        }
        self.mark_down(node, reason, true);
    }

    /// Transition a peer to disconnected and run every consequence:
    /// pending requests fail, monitors fire `noconnection`, links get
    /// exit signals, global names owned by the peer vanish.
    pub(crate) fn mark_down(self: &Arc<Self>, node: &NodeId, reason: &str, reconnect: bool) {
        let graceful = {
            let mut peers = self.peers.lock();
            let Some(peer) = peers.get_mut(node) else { return };
            if peer.status == NodeStatus::Disconnected {
                return;
            }
            peer.status = NodeStatus::Disconnected;
            peer.cancel.cancel();
            peer.graceful_down
        };

        tracing::info!(peer = %node, reason, "node down");
        self.events.emit(ClusterEvent::StatusChange {
            node: node.clone(),
            status: NodeStatus::Disconnected,
        });
        self.events
            .emit(ClusterEvent::NodeDown { node: node.clone(), reason: reason.to_string() });

        self.pending.fail_node(node);
        links::handle_node_down(self, node);
        global::handle_node_down(self, node);

        if reconnect && !graceful && !self.stopped.load(Ordering::SeqCst) {
            spawn_connect_with_retry(self.clone(), node.clone());
        }
    }

    /// Route one decoded envelope.
    pub(crate) async fn dispatch(self: &Arc<Self>, envelope: WireEnvelope) {
        match envelope.kind {
            MessageKind::Hello | MessageKind::HelloAck => {
                // Handshake frames are consumed before the reader task
                // starts; mid-stream repeats are protocol noise.
                tracing::debug!(peer = %envelope.from, "unexpected handshake frame");
            }
            MessageKind::Heartbeat => self.handle_heartbeat(&envelope),
            MessageKind::PeerList => {
                if let Ok(body) = envelope.body_as::<PeerListBody>() {
                    self.gossip_connect(body.peers);
                }
            }
            MessageKind::NodeDown => {
                if let Ok(body) = envelope.body_as::<NodeDownBody>() {
                    {
                        let mut peers = self.peers.lock();
                        if let Some(peer) = peers.get_mut(&body.node) {
                            peer.graceful_down = true;
                        }
                    }
                    self.mark_down(&body.node, &body.reason, false);
                }
            }
            MessageKind::CallRequest
            | MessageKind::Cast
            | MessageKind::SpawnRequest
            | MessageKind::StopRequest => remote::handle_request(self, envelope),
            MessageKind::CallReply
            | MessageKind::CallError
            | MessageKind::SpawnReply
            | MessageKind::StopReply
            | MessageKind::MonitorAck
            | MessageKind::LinkAck => {
                if let Some(corr_id) = envelope.corr_id {
                    self.pending.complete(&corr_id, envelope);
                }
            }
            MessageKind::MonitorRequest
            | MessageKind::Demonitor
            | MessageKind::ProcessDown
            | MessageKind::LinkRequest
            | MessageKind::Unlink
            | MessageKind::ExitSignal => links::handle_frame(self, envelope),
            MessageKind::GlobalRegister
            | MessageKind::GlobalRegisterAck
            | MessageKind::GlobalUnregister
            | MessageKind::GlobalConflict
            | MessageKind::GlobalSyncRequest
            | MessageKind::GlobalSyncReply => global::handle_frame(self, envelope),
        }
    }

    fn handle_heartbeat(&self, envelope: &WireEnvelope) {
        let Ok(body) = envelope.body_as::<HeartbeatBody>() else { return };
        let mut peers = self.peers.lock();
        if let Some(peer) = peers.get_mut(&envelope.from) {
            peer.last_heartbeat_ms = self.runtime.clock().epoch_ms();
            peer.process_count = body.process_count;
            peer.uptime_ms = body.uptime_ms;
        }
    }

    /// Opportunistically dial peers we have not seen yet.
    fn gossip_connect(self: &Arc<Self>, nodes: Vec<NodeId>) {
        for node in nodes {
            if node == self.node_id {
                continue;
            }
            let known = {
                let peers = self.peers.lock();
                peers.get(&node).is_some_and(|p| p.status != NodeStatus::Disconnected)
            };
            if !known {
                spawn_connect_with_retry(self.clone(), node);
            }
        }
    }

    fn connected_peer_ids(&self) -> Vec<NodeId> {
        let peers = self.peers.lock();
        peers
            .values()
            .filter(|p| p.status == NodeStatus::Connected)
            .map(|p| p.node.clone())
            .collect()
    }

    /// Install a fresh connection for `node`, replacing any previous
    /// one, and start its socket tasks.
    fn install_connection(
        self: &Arc<Self>,
        node: NodeId,
        stream: TcpStream,
        their_peers: Vec<NodeId>,
    ) {
        let now_ms = self.runtime.clock().epoch_ms();
        let (read_half, write_half) = stream.into_split();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let conn_cancel = self.cancel.child_token();
        let generation = self.conn_seq.fetch_add(1, Ordering::SeqCst);

        {
            let mut peers = self.peers.lock();
            if let Some(previous) = peers.insert(
                node.clone(),
                PeerHandle {
                    node: node.clone(),
                    status: NodeStatus::Connected,
                    outbound: outbound_tx,
                    last_heartbeat_ms: now_ms,
                    process_count: 0,
                    uptime_ms: 0,
                    graceful_down: false,
                    cancel: conn_cancel.clone(),
                    generation,
                },
            ) {
                previous.cancel.cancel();
            }
        }

        spawn_writer(
            self.clone(),
            node.clone(),
            generation,
            write_half,
            outbound_rx,
            conn_cancel.clone(),
        );
        spawn_reader(self.clone(), node.clone(), generation, read_half, conn_cancel);

        tracing::info!(peer = %node, "peer connected");
        self.events.emit(ClusterEvent::StatusChange {
            node: node.clone(),
            status: NodeStatus::Connected,
        });
        let record = {
            let peers = self.peers.lock();
            peers.get(&node).map(peer_record)
        };
        if let Some(record) = record {
            self.events.emit(ClusterEvent::NodeUp { node: record });
        }

        // Pull the peer's view of the registry.
        global::request_sync(self, &node);
        // Mesh out to anyone they know that we don't.
        self.gossip_connect(their_peers);
    }
}

fn spawn_accept_loop(inner: Arc<ClusterInner>, listener: TcpListener) {
    tokio::spawn(async move {
        loop {
            let accepted = tokio::select! {
                _ = inner.cancel.cancelled() => break,
                accepted = listener.accept() => accepted,
            };
            match accepted {
                Ok((stream, _addr)) => {
                    let inner = inner.clone();
                    tokio::spawn(async move {
                        if let Err(err) = handle_inbound(&inner, stream).await {
                            tracing::debug!(error = %err, "inbound handshake failed");
                        }
                    });
                }
                Err(err) => {
                    tracing::warn!(error = %err, "accept failed");
                }
            }
        }
    });
}

/// Inbound handshake: expect `hello`, answer `hello_ack`.
async fn handle_inbound(inner: &Arc<ClusterInner>, mut stream: TcpStream) -> Result<(), String> {
    let secret = inner.config.cluster_secret.clone();
    let payload = tokio::time::timeout(HANDSHAKE_TIMEOUT, read_frame(&mut stream, secret.as_deref()))
        .await
        .map_err(|_| "handshake timeout".to_string())?
        .map_err(|e| e.to_string())?;
    let envelope = decode(&payload).map_err(|e| e.to_string())?;
    if envelope.kind != MessageKind::Hello {
        return Err(format!("expected hello, got {:?}", envelope.kind));
    }
    let hello: HelloBody = envelope.body_as().map_err(|e| e.to_string())?;

    let ack_body =
        HelloBody { node: inner.node_id.clone(), peers: inner.connected_peer_ids() };
    let ack = WireEnvelope::new(MessageKind::HelloAck, inner.node_id.clone(), &ack_body)
        .map_err(|e| e.to_string())?;
    let payload = encode(&ack).map_err(|e| e.to_string())?;
    write_frame(&mut stream, &payload, secret.as_deref())
        .await
        .map_err(|e| e.to_string())?;

    inner.install_connection(hello.node.clone(), stream, hello.peers);
    Ok(())
}

/// Outbound handshake: send `hello`, expect `hello_ack`.
async fn dial(inner: &Arc<ClusterInner>, node: &NodeId) -> Result<(), String> {
    let secret = inner.config.cluster_secret.clone();
    let mut stream = TcpStream::connect((node.host(), node.port()))
        .await
        .map_err(|e| e.to_string())?;

    let hello_body =
        HelloBody { node: inner.node_id.clone(), peers: inner.connected_peer_ids() };
    let hello = WireEnvelope::new(MessageKind::Hello, inner.node_id.clone(), &hello_body)
        .map_err(|e| e.to_string())?;
    let payload = encode(&hello).map_err(|e| e.to_string())?;
    write_frame(&mut stream, &payload, secret.as_deref())
        .await
        .map_err(|e| e.to_string())?;

    let payload = tokio::time::timeout(HANDSHAKE_TIMEOUT, read_frame(&mut stream, secret.as_deref()))
        .await
        .map_err(|_| "handshake timeout".to_string())?
        .map_err(|e| e.to_string())?;
    let envelope = decode(&payload).map_err(|e| e.to_string())?;
    if envelope.kind != MessageKind::HelloAck {
        return Err(format!("expected hello_ack, got {:?}", envelope.kind));
    }
    let ack: HelloBody = envelope.body_as().map_err(|e| e.to_string())?;

    inner.install_connection(ack.node.clone(), stream, ack.peers);
    Ok(())
}

/// Dial until connected, with exponential backoff between attempts.
fn spawn_connect_with_retry(inner: Arc<ClusterInner>, node: NodeId) {
    if node == inner.node_id {
        return;
    }
    {
        let mut dialing = inner.dialing.lock();
        if !dialing.insert(node.clone()) {
            return;
        }
    }
    tokio::spawn(async move {
        let mut attempt: u32 = 0;
        loop {
            if inner.cancel.is_cancelled() {
                break;
            }
            let already_connected = {
                let peers = inner.peers.lock();
                peers.get(&node).is_some_and(|p| p.status == NodeStatus::Connected)
            };
            if already_connected {
                break;
            }
            match dial(&inner, &node).await {
                Ok(()) => break,
                Err(err) => {
                    let base = inner.config.reconnect_base_delay.as_millis() as u64;
                    let max = inner.config.reconnect_max_delay.as_millis() as u64;
                    let delay = base.saturating_mul(1u64 << attempt.min(16)).min(max);
                    tracing::debug!(
                        peer = %node,
                        attempt,
                        delay_ms = delay,
                        error = %err,
                        "dial failed, backing off"
                    );
                    attempt = attempt.saturating_add(1);
                    tokio::select! {
                        _ = inner.cancel.cancelled() => break,
                        _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
                    }
                }
            }
        }
        inner.dialing.lock().remove(&node);
    });
}

#[cfg(test)]
#[path = "cluster_tests/mod.rs"]
mod tests;

fn spawn_heartbeat_loop(inner: Arc<ClusterInner>) {
    tokio::spawn(async move {
        let interval = inner.config.heartbeat_interval;
        loop {
            tokio::select! {
                _ = inner.cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
            let now_ms = inner.runtime.clock().epoch_ms();
            let body = HeartbeatBody {
                process_count: inner.runtime.process_count(),
                uptime_ms: now_ms.saturating_sub(inner.started_at_ms),
            };
            if let Ok(envelope) =
                WireEnvelope::new(MessageKind::Heartbeat, inner.node_id.clone(), &body)
            {
                inner.broadcast(&envelope);
            }

            // Failure detection: a peer silent for `threshold`
            // intervals is gone.
            let limit =
                interval.as_millis() as u64 * inner.config.heartbeat_miss_threshold as u64;
            let stale: Vec<NodeId> = {
                let peers = inner.peers.lock();
                peers
                    .values()
                    .filter(|p| p.status == NodeStatus::Connected)
                    .filter(|p| now_ms.saturating_sub(p.last_heartbeat_ms) > limit)
                    .map(|p| p.node.clone())
                    .collect()
            };
            for node in stale {
                inner.mark_down(&node, "heartbeat_timeout", true);
            }
        }
    });
}
