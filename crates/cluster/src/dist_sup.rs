// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Distributed supervisor: supervised children placed across nodes.
//!
//! Children are spawned through the behavior catalog on a node chosen
//! by a selector, watched via remote monitors, and restarted per the
//! usual policies. Node loss surfaces as `noconnection` downs, which
//! re-place the child on a surviving node (`child_migrated`). A
//! global claim per child id keeps two supervisors from racing on the
//! same restart.

use crate::cluster::Cluster;
use crate::error::{DistSupervisorError, GlobalError, RemoteError};
use crate::node::{ClusterEvent, NodeRecord};
use crate::remote::RemoteSpawnOptions;
use hive_core::{ExitReason, LifecycleEvent, MonitorId, NodeId, ServerId, ServerRef};
use hive_runtime::{RestartIntensity, RestartPolicy, RestartWindow, Strategy};
use hive_wire::SpawnRegistration;
use parking_lot::Mutex;
use rand::Rng;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const DEFAULT_CHILD_SHUTDOWN: Duration = Duration::from_millis(5_000);

/// Placement policy for a child.
#[derive(Clone)]
pub enum NodeSelector {
    /// Prefer this node; fall back to any peer.
    LocalFirst,
    RoundRobin,
    /// Lowest process count.
    LeastLoaded,
    Random,
    /// Pin to a specific node.
    Node(NodeId),
    Custom(Arc<dyn Fn(&[NodeRecord]) -> Option<NodeId> + Send + Sync>),
}

impl std::fmt::Debug for NodeSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::LocalFirst => "local_first",
            Self::RoundRobin => "round_robin",
            Self::LeastLoaded => "least_loaded",
            Self::Random => "random",
            Self::Node(_) => "node",
            Self::Custom(_) => "custom",
        };
        f.write_str(name)
    }
}

impl NodeSelector {
    fn pick(
        &self,
        candidates: &[NodeRecord],
        rr: &AtomicUsize,
        local: &NodeId,
    ) -> Option<NodeId> {
        if candidates.is_empty() {
            return None;
        }
        match self {
            Self::LocalFirst => candidates
                .iter()
                .find(|c| c.id == *local)
                .or_else(|| candidates.first())
                .map(|c| c.id.clone()),
            Self::RoundRobin => {
                let index = rr.fetch_add(1, Ordering::Relaxed) % candidates.len();
                Some(candidates[index].id.clone())
            }
            Self::LeastLoaded => candidates
                .iter()
                .min_by_key(|c| c.process_count)
                .map(|c| c.id.clone()),
            Self::Random => {
                let index = rand::thread_rng().gen_range(0..candidates.len());
                Some(candidates[index].id.clone())
            }
            Self::Node(node) => candidates.iter().find(|c| c.id == *node).map(|c| c.id.clone()),
            Self::Custom(f) => {
                let chosen = f(candidates)?;
                candidates.iter().find(|c| c.id == chosen).map(|c| c.id.clone())
            }
        }
    }
}

/// Specification of one distributed child.
#[derive(Debug, Clone)]
pub struct DistChildSpec {
    pub id: String,
    /// Catalog name resolved on the chosen node.
    pub behavior: String,
    pub args: Value,
    /// Registered globally when given.
    pub name: Option<String>,
    pub restart: RestartPolicy,
    pub shutdown_timeout: Duration,
    /// Overrides the supervisor's default selector.
    pub selector: Option<NodeSelector>,
}

impl DistChildSpec {
    pub fn new(id: impl Into<String>, behavior: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            behavior: behavior.into(),
            args: Value::Null,
            name: None,
            restart: RestartPolicy::Permanent,
            shutdown_timeout: DEFAULT_CHILD_SHUTDOWN,
            selector: None,
        }
    }

    pub fn args(mut self, args: Value) -> Self {
        self.args = args;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn restart(mut self, policy: RestartPolicy) -> Self {
        self.restart = policy;
        self
    }

    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn selector(mut self, selector: NodeSelector) -> Self {
        self.selector = Some(selector);
        self
    }
}

/// Options for `DistributedSupervisor::start`.
pub struct DistSupervisorOptions {
    pub strategy: Strategy,
    pub children: Vec<DistChildSpec>,
    pub child_template: Option<DistChildSpec>,
    pub intensity: RestartIntensity,
    /// Default selector for children without their own.
    pub selector: NodeSelector,
}

impl DistSupervisorOptions {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            children: Vec::new(),
            child_template: None,
            intensity: RestartIntensity::default(),
            selector: NodeSelector::LocalFirst,
        }
    }

    pub fn child(mut self, spec: DistChildSpec) -> Self {
        self.children.push(spec);
        self
    }

    pub fn child_template(mut self, spec: DistChildSpec) -> Self {
        self.child_template = Some(spec);
        self
    }

    pub fn intensity(mut self, intensity: RestartIntensity) -> Self {
        self.intensity = intensity;
        self
    }

    pub fn selector(mut self, selector: NodeSelector) -> Self {
        self.selector = selector;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Running,
    Stopping,
    Failed,
    Stopped,
}

#[derive(Clone)]
struct Placement {
    server: ServerRef,
    node: NodeId,
    monitor_id: MonitorId,
}

struct DistRecord {
    spec: DistChildSpec,
    placement: Option<Placement>,
    restart_count: u32,
    dynamic: bool,
}

struct DistState {
    children: Vec<DistRecord>,
    window: RestartWindow,
    phase: Phase,
    failure: Option<DistSupervisorError>,
    dynamic_seq: u64,
}

struct DistInner {
    cluster: Cluster,
    /// Synthetic watcher identity for this supervisor's monitors.
    sup_ref: ServerRef,
    strategy: Strategy,
    template: Option<DistChildSpec>,
    intensity: RestartIntensity,
    default_selector: NodeSelector,
    state: Mutex<DistState>,
    rr: AtomicUsize,
    cancel: CancellationToken,
}

impl Drop for DistInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Handle to a running distributed supervisor.
#[derive(Clone)]
pub struct DistributedSupervisor {
    inner: Arc<DistInner>,
}

impl std::fmt::Debug for DistributedSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributedSupervisor").finish_non_exhaustive()
    }
}

impl DistributedSupervisor {
    pub async fn start(
        cluster: Cluster,
        options: DistSupervisorOptions,
    ) -> Result<Self, DistSupervisorError> {
        if options.strategy == Strategy::SimpleOneForOne {
            if !options.children.is_empty() {
                return Err(DistSupervisorError::InvalidSimpleOneForOne);
            }
            if options.child_template.is_none() {
                return Err(DistSupervisorError::MissingChildTemplate);
            }
        }
        let mut seen = HashSet::new();
        for spec in &options.children {
            if !seen.insert(spec.id.clone()) {
                return Err(DistSupervisorError::DuplicateChild {
                    child_id: spec.id.clone(),
                });
            }
        }

        let sup_ref = ServerRef::remote(ServerId::new(), cluster.node_id().clone());
        let inner = Arc::new(DistInner {
            cluster,
            sup_ref,
            strategy: options.strategy,
            template: options.child_template,
            intensity: options.intensity,
            default_selector: options.selector,
            state: Mutex::new(DistState {
                children: Vec::new(),
                window: RestartWindow::default(),
                phase: Phase::Running,
                failure: None,
                dynamic_seq: 0,
            }),
            rr: AtomicUsize::new(0),
            cancel: CancellationToken::new(),
        });

        for spec in options.children {
            match place(&inner, &spec, None).await {
                Ok(placement) => {
                    inner.state.lock().children.push(DistRecord {
                        spec,
                        placement: Some(placement),
                        restart_count: 0,
                        dynamic: false,
                    });
                }
                Err(err) => {
                    unwind(&inner).await;
                    return Err(err);
                }
            }
        }

        spawn_watch_task(&inner);
        Ok(Self { inner })
    }

    pub async fn start_child(
        &self,
        spec: DistChildSpec,
    ) -> Result<ServerRef, DistSupervisorError> {
        {
            let state = self.inner.state.lock();
            if state.phase != Phase::Running {
                return Err(DistSupervisorError::NotRunning);
            }
            if state.children.iter().any(|c| c.spec.id == spec.id) {
                return Err(DistSupervisorError::DuplicateChild { child_id: spec.id });
            }
        }
        let placement = place(&self.inner, &spec, None).await?;
        let server = placement.server.clone();
        self.inner.state.lock().children.push(DistRecord {
            spec,
            placement: Some(placement),
            restart_count: 0,
            dynamic: false,
        });
        Ok(server)
    }

    /// Spawn a new instance from the template (simple_one_for_one).
    pub async fn start_template_child(
        &self,
        args: Value,
    ) -> Result<ServerRef, DistSupervisorError> {
        let Some(template) = self.inner.template.clone() else {
            return Err(DistSupervisorError::MissingChildTemplate);
        };
        let id = {
            let mut state = self.inner.state.lock();
            if state.phase != Phase::Running {
                return Err(DistSupervisorError::NotRunning);
            }
            state.dynamic_seq += 1;
            format!("{}-{}", template.id, state.dynamic_seq)
        };
        let spec = DistChildSpec { id, args, name: None, ..template };
        let placement = place(&self.inner, &spec, None).await?;
        let server = placement.server.clone();
        self.inner.state.lock().children.push(DistRecord {
            spec,
            placement: Some(placement),
            restart_count: 0,
            dynamic: true,
        });
        Ok(server)
    }

    pub async fn terminate_child(&self, id: &str) -> Result<(), DistSupervisorError> {
        let (placement, timeout) = {
            let mut state = self.inner.state.lock();
            let record = state
                .children
                .iter_mut()
                .find(|c| c.spec.id == id)
                .ok_or_else(|| DistSupervisorError::ChildNotFound {
                    child_id: id.to_string(),
                })?;
            let placement = record.placement.take();
            let timeout = record.spec.shutdown_timeout;
            if record.dynamic {
                state.children.retain(|c| c.spec.id != id);
            }
            (placement, timeout)
        };
        if let Some(placement) = placement {
            stop_placement(&self.inner, &placement, timeout).await;
        }
        Ok(())
    }

    /// Stop and re-place a child; the selector may pick a different
    /// node than last time. Fails with `DistributedChildClaim` when
    /// another supervisor is already restarting the same child id.
    pub async fn restart_child(&self, id: &str) -> Result<ServerRef, DistSupervisorError> {
        let claim = claim_name(id);
        if let Err(GlobalError::GlobalNameConflict { .. }) =
            self.inner.cluster.global_register(&claim, &self.inner.sup_ref)
        {
            return Err(DistSupervisorError::DistributedChildClaim {
                child_id: id.to_string(),
            });
        }

        let looked_up = {
            let mut state = self.inner.state.lock();
            if state.phase != Phase::Running {
                Err(DistSupervisorError::NotRunning)
            } else {
                state
                    .children
                    .iter_mut()
                    .find(|c| c.spec.id == id)
                    .map(|record| (record.spec.clone(), record.placement.take()))
                    .ok_or_else(|| DistSupervisorError::ChildNotFound {
                        child_id: id.to_string(),
                    })
            }
        };
        let (spec, placement) = match looked_up {
            Ok(found) => found,
            Err(err) => {
                self.inner.cluster.global_unregister(&claim);
                return Err(err);
            }
        };

        if let Some(placement) = placement {
            stop_placement(&self.inner, &placement, spec.shutdown_timeout).await;
        }
        let placed = place(&self.inner, &spec, None).await;
        self.inner.cluster.global_unregister(&claim);
        let placement = placed?;
        let server = placement.server.clone();
        let mut state = self.inner.state.lock();
        if let Some(record) = state.children.iter_mut().find(|c| c.spec.id == id) {
            record.placement = Some(placement);
            record.restart_count += 1;
        }
        Ok(server)
    }

    /// Stop the supervisor and its children (reverse start order).
    pub async fn stop(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.phase != Phase::Running {
                return;
            }
            state.phase = Phase::Stopping;
        }
        self.inner.cancel.cancel();
        stop_all(&self.inner).await;
        self.inner.state.lock().phase = Phase::Stopped;
    }

    pub fn failure(&self) -> Option<DistSupervisorError> {
        self.inner.state.lock().failure.clone()
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.lock().phase == Phase::Running
    }

    /// Child ids with their current placement.
    pub fn children(&self) -> Vec<(String, Option<ServerRef>)> {
        self.inner
            .state
            .lock()
            .children
            .iter()
            .map(|c| (c.spec.id.clone(), c.placement.as_ref().map(|p| p.server.clone())))
            .collect()
    }

    pub fn child(&self, id: &str) -> Option<ServerRef> {
        self.inner
            .state
            .lock()
            .children
            .iter()
            .find(|c| c.spec.id == id)
            .and_then(|c| c.placement.as_ref().map(|p| p.server.clone()))
    }

    pub fn child_node(&self, id: &str) -> Option<NodeId> {
        self.inner
            .state
            .lock()
            .children
            .iter()
            .find(|c| c.spec.id == id)
            .and_then(|c| c.placement.as_ref().map(|p| p.node.clone()))
    }
}

fn claim_name(child_id: &str) -> String {
    format!("hive:claim:{child_id}")
}

fn candidates(inner: &DistInner, exclude: Option<&NodeId>) -> Vec<NodeRecord> {
    let mut nodes = inner.cluster.connected_nodes();
    nodes.push(inner.cluster.self_record());
    nodes.sort_by(|a, b| a.id.cmp(&b.id));
    if let Some(exclude) = exclude {
        nodes.retain(|n| n.id != *exclude);
    }
    nodes
}

/// Select a node and spawn + monitor one child instance.
async fn place(
    inner: &Arc<DistInner>,
    spec: &DistChildSpec,
    exclude: Option<&NodeId>,
) -> Result<Placement, DistSupervisorError> {
    let selector = spec.selector.as_ref().unwrap_or(&inner.default_selector);
    let node = selector
        .pick(&candidates(inner, exclude), &inner.rr, inner.cluster.node_id())
        .ok_or_else(|| DistSupervisorError::NoAvailableNode { child_id: spec.id.clone() })?;

    let options = RemoteSpawnOptions {
        name: spec.name.clone(),
        registration: if spec.name.is_some() {
            SpawnRegistration::Global
        } else {
            SpawnRegistration::None
        },
        trap_exit: false,
        timeout: None,
    };
    let server = inner
        .cluster
        .spawn(&node, &spec.behavior, spec.args.clone(), options)
        .await
        .map_err(|err| match err {
            RemoteError::BehaviorNotFound { name, node } => {
                DistSupervisorError::DistributedBehaviorNotFound { name, node }
            }
            other => DistSupervisorError::Remote(other),
        })?;
    let monitor_id = inner
        .cluster
        .monitor(&inner.sup_ref, &server)
        .await
        .map_err(DistSupervisorError::Remote)?;

    tracing::debug!(
        child = %spec.id,
        node = %node,
        server = %server,
        "distributed child placed"
    );
    Ok(Placement { server, node, monitor_id })
}

async fn stop_placement(inner: &Arc<DistInner>, placement: &Placement, timeout: Duration) {
    // Demonitor first so the deliberate stop does not look like a
    // crash to the watch task.
    inner.cluster.demonitor(&placement.monitor_id);
    let _ = inner
        .cluster
        .stop_server(&placement.server, ExitReason::Shutdown, timeout)
        .await;
}

async fn unwind(inner: &Arc<DistInner>) {
    stop_all(inner).await;
}

async fn stop_all(inner: &Arc<DistInner>) {
    let placed: Vec<(Placement, Duration)> = {
        let mut state = inner.state.lock();
        state
            .children
            .iter_mut()
            .rev()
            .filter_map(|c| c.placement.take().map(|p| (p, c.spec.shutdown_timeout)))
            .collect()
    };
    for (placement, timeout) in placed {
        stop_placement(inner, &placement, timeout).await;
    }
}

fn spawn_watch_task(inner: &Arc<DistInner>) {
    let weak: Weak<DistInner> = Arc::downgrade(inner);
    let mut events = inner.cluster.runtime().subscribe();
    let cancel = inner.cancel.clone();
    let sup_id = inner.sup_ref.id;
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            let LifecycleEvent::ProcessDown { watcher, monitor_id, monitored, reason } = event
            else {
                continue;
            };
            if watcher.id != sup_id {
                continue;
            }
            let Some(inner) = weak.upgrade() else { break };
            handle_child_down(&inner, monitor_id, monitored, reason).await;
        }
    });
}

async fn handle_child_down(
    inner: &Arc<DistInner>,
    monitor_id: MonitorId,
    monitored: ServerRef,
    reason: ExitReason,
) {
    enum Plan {
        None,
        Failed,
        Restart { stop_first: Vec<(Placement, Duration)>, ids: Vec<String> },
    }

    let migration_from =
        (reason == ExitReason::Noconnection).then(|| monitored.node.clone()).flatten();

    let plan = {
        let mut state = inner.state.lock();
        if state.phase != Phase::Running {
            return;
        }
        let Some(index) = state
            .children
            .iter()
            .position(|c| c.placement.as_ref().is_some_and(|p| p.monitor_id == monitor_id))
        else {
            return;
        };
        state.children[index].placement = None;
        let child_id = state.children[index].spec.id.clone();
        let dynamic = state.children[index].dynamic;
        let restarting = state.children[index].spec.restart.should_restart(&reason);
        tracing::debug!(
            child = %child_id,
            reason = %reason,
            restarting,
            "distributed child down"
        );

        if !restarting {
            if dynamic {
                state.children.retain(|c| c.spec.id != child_id);
            }
            Plan::None
        } else {
            let now_ms = inner.cluster.runtime().clock().epoch_ms();
            if !state.window.record(now_ms, &inner.intensity) {
                state.phase = Phase::Failed;
                state.failure = Some(DistSupervisorError::MaxRestartsExceeded {
                    restarts: state.window.len() as u32,
                    within_ms: inner.intensity.within.as_millis() as u64,
                });
                Plan::Failed
            } else {
                match inner.strategy {
                    Strategy::OneForOne | Strategy::SimpleOneForOne => {
                        Plan::Restart { stop_first: Vec::new(), ids: vec![child_id] }
                    }
                    Strategy::OneForAll => {
                        let stop_first: Vec<(Placement, Duration)> = state
                            .children
                            .iter_mut()
                            .rev()
                            .filter_map(|c| {
                                c.placement.take().map(|p| (p, c.spec.shutdown_timeout))
                            })
                            .collect();
                        let ids =
                            state.children.iter().map(|c| c.spec.id.clone()).collect();
                        Plan::Restart { stop_first, ids }
                    }
                    Strategy::RestForOne => {
                        let stop_first: Vec<(Placement, Duration)> = state.children
                            [index..]
                            .iter_mut()
                            .rev()
                            .filter_map(|c| {
                                c.placement.take().map(|p| (p, c.spec.shutdown_timeout))
                            })
                            .collect();
                        let ids = state.children[index..]
                            .iter()
                            .map(|c| c.spec.id.clone())
                            .collect();
                        Plan::Restart { stop_first, ids }
                    }
                }
            }
        }
    };

    match plan {
        Plan::None => {}
        Plan::Failed => {
            tracing::warn!("distributed supervisor restart intensity exceeded");
            stop_all(inner).await;
        }
        Plan::Restart { stop_first, ids } => {
            for (placement, timeout) in stop_first {
                stop_placement(inner, &placement, timeout).await;
            }
            for id in ids {
                restart_child_instance(inner, &id, migration_from.as_ref()).await;
            }
        }
    }
}

/// Claim, re-place, and commit one child. `migrated_from` marks a
/// node-loss reschedule, which excludes the lost node and announces
/// `child_migrated`.
async fn restart_child_instance(
    inner: &Arc<DistInner>,
    id: &str,
    migrated_from: Option<&NodeId>,
) {
    let spec = {
        let state = inner.state.lock();
        if state.phase != Phase::Running {
            return;
        }
        match state.children.iter().find(|c| c.spec.id == id) {
            Some(record) => record.spec.clone(),
            None => return,
        }
    };

    let claim = claim_name(id);
    match inner.cluster.global_register(&claim, &inner.sup_ref) {
        Ok(()) => {}
        Err(GlobalError::GlobalNameConflict { .. }) => {
            tracing::debug!(child = id, "child claimed by another supervisor");
            return;
        }
        Err(_) => return,
    }

    let placed = place(inner, &spec, migrated_from).await;
    inner.cluster.global_unregister(&claim);

    match placed {
        Ok(placement) => {
            let to_node = placement.node.clone();
            let stale_placement = {
                let mut state = inner.state.lock();
                if state.phase != Phase::Running {
                    Some(placement)
                } else {
                    if let Some(record) =
                        state.children.iter_mut().find(|c| c.spec.id == id)
                    {
                        record.placement = Some(placement);
                        record.restart_count += 1;
                    }
                    None
                }
            };
            if let Some(placement) = stale_placement {
                stop_placement(inner, &placement, spec.shutdown_timeout).await;
                return;
            }
            if let Some(from) = migrated_from {
                inner.cluster.inner.events.emit(ClusterEvent::ChildMigrated {
                    child_id: id.to_string(),
                    from: from.clone(),
                    to: to_node,
                });
            }
        }
        Err(err) => {
            tracing::warn!(child = id, error = %err, "failed to re-place child");
        }
    }
}

#[cfg(test)]
#[path = "dist_sup_tests.rs"]
mod tests;
