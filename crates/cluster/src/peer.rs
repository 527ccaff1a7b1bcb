// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-peer connection state and socket tasks.
//!
//! Each live connection has one writer task draining an outbound
//! queue (which preserves per-connection ordering) and one reader task
//! decoding frames into the cluster dispatcher.

use crate::cluster::ClusterInner;
use crate::node::NodeStatus;
use hive_core::NodeId;
use hive_wire::{decode, encode, read_frame, write_frame, WireEnvelope};
use std::sync::Arc;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// What the cluster tracks per peer.
pub(crate) struct PeerHandle {
    pub node: NodeId,
    pub status: NodeStatus,
    pub outbound: mpsc::UnboundedSender<WireEnvelope>,
    pub last_heartbeat_ms: u64,
    pub process_count: usize,
    pub uptime_ms: u64,
    /// Peer announced a graceful departure; do not reconnect.
    pub graceful_down: bool,
    pub cancel: CancellationToken,
    /// Which connection this handle belongs to. A replaced
    /// connection's dying tasks must not take the new one down.
    pub generation: u64,
}

pub(crate) fn spawn_writer(
    inner: Arc<ClusterInner>,
    node: NodeId,
    generation: u64,
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<WireEnvelope>,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        let secret = inner.config.cluster_secret.clone();
        loop {
            let envelope = tokio::select! {
                _ = cancel.cancelled() => break,
                envelope = outbound.recv() => match envelope {
                    Some(envelope) => envelope,
                    None => break,
                },
            };
            let payload = match encode(&envelope) {
                Ok(payload) => payload,
                Err(err) => {
                    // Unserializable outbound frames are dropped, not fatal.
                    tracing::warn!(peer = %node, error = %err, "dropping outbound frame");
                    continue;
                }
            };
            if let Err(err) = write_frame(&mut writer, &payload, secret.as_deref()).await {
                tracing::debug!(peer = %node, error = %err, "write failed");
                inner.connection_lost(&node, generation, "write_failed");
                break;
            }
        }
    });
}

pub(crate) fn spawn_reader(
    inner: Arc<ClusterInner>,
    node: NodeId,
    generation: u64,
    mut reader: OwnedReadHalf,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        let secret = inner.config.cluster_secret.clone();
        loop {
            let payload = tokio::select! {
                _ = cancel.cancelled() => break,
                payload = read_frame(&mut reader, secret.as_deref()) => payload,
            };
            let envelope = match payload.and_then(|bytes| decode(&bytes)) {
                Ok(envelope) => envelope,
                Err(err) => {
                    // MAC mismatches and protocol garbage close the
                    // connection before anything is dispatched.
                    tracing::debug!(peer = %node, error = %err, "read failed, closing");
                    inner.connection_lost(&node, generation, "read_failed");
                    break;
                }
            };
            inner.dispatch(envelope).await;
        }
    });
}
