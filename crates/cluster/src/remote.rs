// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote call, cast, spawn, and stop.

use crate::cluster::{Cluster, ClusterInner};
use crate::error::{ClusterError, RemoteError};
use crate::global;
use hive_core::{CorrId, ExitReason, NodeId, ServerRef};
use hive_runtime::{GenServerError, StartOptions};
use hive_wire::{
    CallErrorBody, CallReplyBody, CallRequestBody, CastBody, MessageKind, RemoteErrorKind,
    SpawnRegistration, SpawnReplyBody, SpawnRequestBody, StopReplyBody, StopRequestBody,
    WireEnvelope,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_millis(5_000);
const DEFAULT_SPAWN_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Options for a remote spawn.
#[derive(Debug, Clone, Default)]
pub struct RemoteSpawnOptions {
    pub name: Option<String>,
    pub registration: SpawnRegistration,
    pub trap_exit: bool,
    pub timeout: Option<Duration>,
}

impl Cluster {
    /// Call a server anywhere in the cluster.
    ///
    /// Local refs go straight to the runtime; remote refs are
    /// serialized, correlated, and awaited with `timeout` (default
    /// 5 000 ms).
    pub async fn call(
        &self,
        target: &ServerRef,
        msg: Value,
        timeout: Option<Duration>,
    ) -> Result<Value, RemoteError> {
        self.inner.ensure_started()?;
        let Some(node) = remote_node(&self.inner, target) else {
            return self
                .inner
                .runtime
                .call(&ServerRef::local(target.id), msg, timeout)
                .await
                .map_err(|err| map_local_call_error(err, &self.inner.node_id));
        };

        let timeout = timeout.unwrap_or(DEFAULT_CALL_TIMEOUT);
        let body = CallRequestBody {
            target: target.id,
            msg,
            timeout_ms: timeout.as_millis() as u64,
        };
        let envelope = WireEnvelope::new(MessageKind::CallRequest, self.inner.node_id.clone(), &body)
            .map_err(|e| RemoteError::serialization("call", e))?;
        let reply = self.inner.request(&node, envelope, timeout).await.map_err(|err| {
            match err {
                RequestError::Timeout => RemoteError::RemoteCallTimeout {
                    id: target.id,
                    node: node.clone(),
                    timeout_ms: timeout.as_millis() as u64,
                },
                RequestError::Remote(err) => err,
            }
        })?;

        match reply.kind {
            MessageKind::CallReply => {
                let body: CallReplyBody =
                    reply.body_as().map_err(|e| RemoteError::serialization("call", e))?;
                Ok(body.value)
            }
            MessageKind::CallError => {
                let body: CallErrorBody =
                    reply.body_as().map_err(|e| RemoteError::serialization("call", e))?;
                Err(map_call_error(body, target, &node))
            }
            other => Err(RemoteError::Remote {
                message: format!("unexpected reply kind {other:?}"),
            }),
        }
    }

    /// Fire-and-forget send to any node. Silently dropped when the
    /// cluster is stopped or the peer is unreachable.
    pub fn cast(&self, target: &ServerRef, msg: Value) {
        if self.inner.ensure_started().is_err() {
            return;
        }
        let Some(node) = remote_node(&self.inner, target) else {
            self.inner.runtime.cast(&ServerRef::local(target.id), msg);
            return;
        };
        let body = CastBody { target: target.id, msg };
        let Ok(envelope) =
            WireEnvelope::new(MessageKind::Cast, self.inner.node_id.clone(), &body)
        else {
            return;
        };
        let _ = self.inner.send_to(&node, envelope);
    }

    /// Spawn a behavior from the target node's catalog.
    pub async fn spawn(
        &self,
        node: &NodeId,
        behavior: &str,
        args: Value,
        options: RemoteSpawnOptions,
    ) -> Result<ServerRef, RemoteError> {
        self.inner.ensure_started()?;
        if *node == self.inner.node_id {
            return spawn_local(&self.inner, behavior, args, &options)
                .await
                .map_err(|body| map_spawn_error(body, behavior, node));
        }

        let timeout = options.timeout.unwrap_or(DEFAULT_SPAWN_TIMEOUT);
        let body = SpawnRequestBody {
            behavior: behavior.to_string(),
            args,
            name: options.name.clone(),
            registration: options.registration.clone(),
            trap_exit: options.trap_exit,
        };
        let envelope =
            WireEnvelope::new(MessageKind::SpawnRequest, self.inner.node_id.clone(), &body)
                .map_err(|e| RemoteError::serialization("spawn", e))?;
        let reply = self.inner.request(node, envelope, timeout).await.map_err(|err| match err {
            RequestError::Timeout => RemoteError::RemoteSpawnTimeout {
                behavior: behavior.to_string(),
                node: node.clone(),
            },
            RequestError::Remote(err) => err,
        })?;

        let body: SpawnReplyBody =
            reply.body_as().map_err(|e| RemoteError::serialization("spawn", e))?;
        match (body.server, body.error) {
            (Some(server), None) => Ok(server),
            (_, Some(error)) => Err(map_spawn_error(error, behavior, node)),
            (None, None) => {
                Err(RemoteError::Remote { message: "empty spawn reply".to_string() })
            }
        }
    }

    /// Orderly stop of a server on any node.
    pub async fn stop_server(
        &self,
        target: &ServerRef,
        reason: ExitReason,
        timeout: Duration,
    ) -> Result<bool, RemoteError> {
        self.inner.ensure_started()?;
        let Some(node) = remote_node(&self.inner, target) else {
            return match self
                .inner
                .runtime
                .stop_with_timeout(&ServerRef::local(target.id), reason, timeout)
                .await
            {
                Ok(()) => Ok(true),
                Err(GenServerError::ServerNotRunning { .. }) => Ok(false),
                Err(err) => Err(RemoteError::Remote { message: err.to_string() }),
            };
        };

        let body = StopRequestBody {
            target: target.id,
            reason,
            timeout_ms: timeout.as_millis() as u64,
        };
        let envelope =
            WireEnvelope::new(MessageKind::StopRequest, self.inner.node_id.clone(), &body)
                .map_err(|e| RemoteError::serialization("stop", e))?;
        // The remote terminate sequence gets the caller's timeout plus
        // headroom for the round trip.
        let wait = timeout + Duration::from_millis(2_000);
        let reply = self.inner.request(&node, envelope, wait).await.map_err(|err| match err {
            RequestError::Timeout => RemoteError::RemoteStopTimeout { node: node.clone() },
            RequestError::Remote(err) => err,
        })?;
        let body: StopReplyBody =
            reply.body_as().map_err(|e| RemoteError::serialization("stop", e))?;
        Ok(body.stopped)
    }
}

pub(crate) enum RequestError {
    Timeout,
    Remote(RemoteError),
}

impl ClusterInner {
    /// Send a correlated request and await its reply.
    pub(crate) async fn request(
        &self,
        node: &NodeId,
        envelope: WireEnvelope,
        timeout: Duration,
    ) -> Result<WireEnvelope, RequestError> {
        let corr_id = CorrId::new();
        let rx = self.pending.insert(corr_id, node.clone());
        if let Err(err) = self.send_to(node, envelope.with_corr(corr_id)) {
            self.pending.remove(&corr_id);
            return Err(RequestError::Remote(err.into()));
        }
        match tokio::time::timeout(timeout, rx).await {
            Err(_) => {
                // Cancelling after timeout discards any late reply.
                self.pending.remove(&corr_id);
                Err(RequestError::Timeout)
            }
            Ok(Err(_)) => Err(RequestError::Remote(RemoteError::Cluster(
                ClusterError::NodeNotReachable { node: node.clone() },
            ))),
            Ok(Ok(Err(err))) => Err(RequestError::Remote(err)),
            Ok(Ok(Ok(reply))) => Ok(reply),
        }
    }
}

/// None when the target lives on this node.
fn remote_node(inner: &ClusterInner, target: &ServerRef) -> Option<NodeId> {
    match &target.node {
        Some(node) if *node != inner.node_id => Some(node.clone()),
        _ => None,
    }
}

fn map_local_call_error(err: GenServerError, node: &NodeId) -> RemoteError {
    match err {
        GenServerError::CallTimeout { id, timeout_ms } => {
            RemoteError::RemoteCallTimeout { id, node: node.clone(), timeout_ms }
        }
        GenServerError::ServerNotRunning { id } => {
            RemoteError::RemoteServerNotRunning { id, node: node.clone() }
        }
        other => RemoteError::Remote { message: other.to_string() },
    }
}

fn map_call_error(body: CallErrorBody, target: &ServerRef, node: &NodeId) -> RemoteError {
    match body.kind {
        RemoteErrorKind::ServerNotRunning => {
            RemoteError::RemoteServerNotRunning { id: target.id, node: node.clone() }
        }
        RemoteErrorKind::CallTimeout => RemoteError::RemoteCallTimeout {
            id: target.id,
            node: node.clone(),
            timeout_ms: 0,
        },
        RemoteErrorKind::Serialization => {
            RemoteError::MessageSerialization { op: "call", message: body.message }
        }
        _ => RemoteError::Remote { message: body.message },
    }
}

fn map_spawn_error(body: CallErrorBody, behavior: &str, node: &NodeId) -> RemoteError {
    match body.kind {
        RemoteErrorKind::BehaviorNotFound => RemoteError::BehaviorNotFound {
            name: behavior.to_string(),
            node: node.clone(),
        },
        RemoteErrorKind::InitFailed => RemoteError::RemoteSpawnInit {
            behavior: behavior.to_string(),
            message: body.message,
        },
        RemoteErrorKind::RegistrationConflict => {
            RemoteError::RemoteSpawnRegistration { message: body.message }
        }
        RemoteErrorKind::Serialization => {
            RemoteError::MessageSerialization { op: "spawn", message: body.message }
        }
        _ => RemoteError::Remote { message: body.message },
    }
}

/// Start a catalog behavior on this node, applying the requested
/// registration. Used for both incoming spawn requests and local
/// placements.
pub(crate) async fn spawn_local(
    inner: &Arc<ClusterInner>,
    behavior_name: &str,
    args: Value,
    options: &RemoteSpawnOptions,
) -> Result<ServerRef, CallErrorBody> {
    let Some(behavior) = inner.catalog.get(behavior_name) else {
        return Err(CallErrorBody {
            kind: RemoteErrorKind::BehaviorNotFound,
            message: format!("behavior {behavior_name:?} not registered"),
        });
    };

    let mut start_options = StartOptions::default().trap_exit(options.trap_exit);
    if options.registration == SpawnRegistration::Local {
        if let Some(name) = &options.name {
            start_options = start_options.name(name.clone());
        }
    }

    let server = inner.runtime.start(behavior, args, start_options).await.map_err(|err| {
        match err {
            GenServerError::InitializationError { message } => {
                CallErrorBody { kind: RemoteErrorKind::InitFailed, message }
            }
            GenServerError::AlreadyRegistered { name } => CallErrorBody {
                kind: RemoteErrorKind::RegistrationConflict,
                message: format!("name {name:?} already registered"),
            },
            other => CallErrorBody {
                kind: RemoteErrorKind::InitFailed,
                message: other.to_string(),
            },
        }
    })?;

    let server = ServerRef::remote(server.id, inner.node_id.clone());

    if options.registration == SpawnRegistration::Global {
        if let Some(name) = &options.name {
            if let Err(err) = global::register(inner, name, &server) {
                let _ = inner
                    .runtime
                    .stop(&ServerRef::local(server.id), ExitReason::Shutdown)
                    .await;
                return Err(CallErrorBody {
                    kind: RemoteErrorKind::RegistrationConflict,
                    message: err.to_string(),
                });
            }
        }
    }

    Ok(server)
}

/// Incoming call/cast/spawn/stop frames. Each handler runs on its own
/// task so a slow target cannot stall the peer's reader.
pub(crate) fn handle_request(inner: &Arc<ClusterInner>, envelope: WireEnvelope) {
    let inner = inner.clone();
    tokio::spawn(async move {
        let from = envelope.from.clone();
        let corr_id = envelope.corr_id;
        match envelope.kind {
            MessageKind::Cast => {
                if let Ok(body) = envelope.body_as::<CastBody>() {
                    inner.runtime.cast(&ServerRef::local(body.target), body.msg);
                }
            }
            MessageKind::CallRequest => {
                let Ok(body) = envelope.body_as::<CallRequestBody>() else { return };
                let target = ServerRef::local(body.target);
                let timeout = Duration::from_millis(body.timeout_ms);
                let reply = match inner.runtime.call(&target, body.msg, Some(timeout)).await {
                    Ok(value) => WireEnvelope::new(
                        MessageKind::CallReply,
                        inner.node_id.clone(),
                        &CallReplyBody { value },
                    ),
                    Err(err) => WireEnvelope::new(
                        MessageKind::CallError,
                        inner.node_id.clone(),
                        &call_error_body(err),
                    ),
                };
                respond(&inner, &from, corr_id, reply);
            }
            MessageKind::SpawnRequest => {
                let Ok(body) = envelope.body_as::<SpawnRequestBody>() else { return };
                let options = RemoteSpawnOptions {
                    name: body.name.clone(),
                    registration: body.registration.clone(),
                    trap_exit: body.trap_exit,
                    timeout: None,
                };
                let reply_body = match spawn_local(&inner, &body.behavior, body.args, &options)
                    .await
                {
                    Ok(server) => SpawnReplyBody { server: Some(server), error: None },
                    Err(error) => SpawnReplyBody { server: None, error: Some(error) },
                };
                let reply = WireEnvelope::new(
                    MessageKind::SpawnReply,
                    inner.node_id.clone(),
                    &reply_body,
                );
                respond(&inner, &from, corr_id, reply);
            }
            MessageKind::StopRequest => {
                let Ok(body) = envelope.body_as::<StopRequestBody>() else { return };
                let target = ServerRef::local(body.target);
                let timeout = Duration::from_millis(body.timeout_ms);
                let stopped = inner
                    .runtime
                    .stop_with_timeout(&target, body.reason, timeout)
                    .await
                    .is_ok();
                let reply = WireEnvelope::new(
                    MessageKind::StopReply,
                    inner.node_id.clone(),
                    &StopReplyBody { stopped },
                );
                respond(&inner, &from, corr_id, reply);
            }
            _ => {}
        }
    });
}

fn call_error_body(err: GenServerError) -> CallErrorBody {
    match err {
        GenServerError::ServerNotRunning { .. } => CallErrorBody {
            kind: RemoteErrorKind::ServerNotRunning,
            message: err.to_string(),
        },
        GenServerError::CallTimeout { .. } => CallErrorBody {
            kind: RemoteErrorKind::CallTimeout,
            message: err.to_string(),
        },
        other => CallErrorBody {
            kind: RemoteErrorKind::ServerNotRunning,
            message: other.to_string(),
        },
    }
}

fn respond(
    inner: &Arc<ClusterInner>,
    to: &NodeId,
    corr_id: Option<CorrId>,
    reply: Result<WireEnvelope, hive_wire::WireError>,
) {
    let Ok(mut reply) = reply else { return };
    if let Some(corr_id) = corr_id {
        reply = reply.with_corr(corr_id);
    }
    let _ = inner.send_to(to, reply);
}
