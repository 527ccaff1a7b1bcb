// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervision: child specs, restart strategies, intensity limits.
//!
//! A supervisor is a runtime-owned component that starts children in
//! declaration order, watches their `stopped` lifecycle events, and
//! restarts them per strategy and per-child policy. Crossing the
//! restart intensity bound stops the supervisor itself with
//! `MaxRestartsExceeded`.

mod intensity;

pub use intensity::{RestartIntensity, RestartWindow};

use crate::behavior::{Behavior, StartOptions};
use crate::error::SupervisorError;
use crate::observer::{SupervisorStat, SupervisorStatSource, TreeNode};
use crate::runtime::Runtime;
use hive_core::{ExitReason, LifecycleEvent, ServerId, ServerRef};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const DEFAULT_CHILD_SHUTDOWN: Duration = Duration::from_millis(5_000);

/// Restart strategy for the whole supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Restart only the failed child.
    OneForOne,
    /// Terminate all children (reverse start order), restart all.
    OneForAll,
    /// Terminate and restart the failed child and everything started
    /// after it.
    RestForOne,
    /// Dynamic homogeneous children from a template.
    SimpleOneForOne,
}

hive_core::simple_display! {
    Strategy {
        OneForOne => "one_for_one",
        OneForAll => "one_for_all",
        RestForOne => "rest_for_one",
        SimpleOneForOne => "simple_one_for_one",
    }
}

/// Per-child restart policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestartPolicy {
    #[default]
    Permanent,
    /// Restart only on abnormal exit.
    Transient,
    Temporary,
}

impl RestartPolicy {
    pub fn should_restart(&self, reason: &ExitReason) -> bool {
        match self {
            Self::Permanent => true,
            Self::Transient => reason.is_abnormal(),
            Self::Temporary => false,
        }
    }
}

/// When the loss of significant children stops the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoShutdown {
    #[default]
    Never,
    AnySignificant,
    AllSignificant,
}

/// Specification of one supervised child.
#[derive(Clone)]
pub struct ChildSpec {
    pub id: String,
    pub behavior: Arc<dyn Behavior>,
    pub args: Value,
    pub options: StartOptions,
    pub restart: RestartPolicy,
    pub shutdown_timeout: Duration,
    pub significant: bool,
}

impl ChildSpec {
    pub fn new(id: impl Into<String>, behavior: Arc<dyn Behavior>) -> Self {
        Self {
            id: id.into(),
            behavior,
            args: Value::Null,
            options: StartOptions::default(),
            restart: RestartPolicy::Permanent,
            shutdown_timeout: DEFAULT_CHILD_SHUTDOWN,
            significant: false,
        }
    }

    pub fn args(mut self, args: Value) -> Self {
        self.args = args;
        self
    }

    pub fn options(mut self, options: StartOptions) -> Self {
        self.options = options;
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

    pub fn significant(mut self, on: bool) -> Self {
        self.significant = on;
        self
    }
}

/// Options for `Supervisor::start`.
pub struct SupervisorOptions {
    pub strategy: Strategy,
    pub children: Vec<ChildSpec>,
    /// Required by (and only meaningful for) `simple_one_for_one`.
    pub child_template: Option<ChildSpec>,
    pub intensity: RestartIntensity,
    pub auto_shutdown: AutoShutdown,
    pub name: Option<String>,
}

impl SupervisorOptions {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            children: Vec::new(),
            child_template: None,
            intensity: RestartIntensity::default(),
            auto_shutdown: AutoShutdown::Never,
            name: None,
        }
    }

    pub fn child(mut self, spec: ChildSpec) -> Self {
        self.children.push(spec);
        self
    }

    pub fn child_template(mut self, spec: ChildSpec) -> Self {
        self.child_template = Some(spec);
        self
    }

    pub fn intensity(mut self, intensity: RestartIntensity) -> Self {
        self.intensity = intensity;
        self
    }

    pub fn auto_shutdown(mut self, auto_shutdown: AutoShutdown) -> Self {
        self.auto_shutdown = auto_shutdown;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
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

struct ChildRecord {
    spec: ChildSpec,
    server: Option<ServerRef>,
    restart_count: u32,
    /// Dynamic instances (simple_one_for_one) are dropped on exit
    /// instead of lingering with no server.
    dynamic: bool,
}

struct SupState {
    children: Vec<ChildRecord>,
    window: RestartWindow,
    phase: Phase,
    failure: Option<SupervisorError>,
    /// Stops this supervisor initiated itself; their `stopped` events
    /// must not trigger restart logic.
    expected_stops: HashSet<ServerId>,
    dynamic_seq: u64,
}

struct SupInner {
    runtime: Runtime,
    strategy: Strategy,
    template: Option<ChildSpec>,
    intensity: RestartIntensity,
    auto_shutdown: AutoShutdown,
    name: Option<String>,
    state: Mutex<SupState>,
    cancel: CancellationToken,
}

impl Drop for SupInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Handle to a running supervisor.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<SupInner>,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor").finish_non_exhaustive()
    }
}

impl Supervisor {
    /// Validate options, start children in declaration order, and
    /// begin watching them. A child failing to start unwinds the
    /// already-started siblings in reverse order.
    pub async fn start(
        runtime: Runtime,
        options: SupervisorOptions,
    ) -> Result<Self, SupervisorError> {
        if options.strategy == Strategy::SimpleOneForOne {
            if !options.children.is_empty() {
                return Err(SupervisorError::InvalidSimpleOneForOne);
            }
            if options.child_template.is_none() {
                return Err(SupervisorError::MissingChildTemplate);
            }
        }
        let mut seen = HashSet::new();
        for spec in &options.children {
            if !seen.insert(spec.id.clone()) {
                return Err(SupervisorError::DuplicateChild { id: spec.id.clone() });
            }
        }

        let inner = Arc::new(SupInner {
            runtime: runtime.clone(),
            strategy: options.strategy,
            template: options.child_template,
            intensity: options.intensity,
            auto_shutdown: options.auto_shutdown,
            name: options.name,
            state: Mutex::new(SupState {
                children: Vec::new(),
                window: RestartWindow::default(),
                phase: Phase::Running,
                failure: None,
                expected_stops: HashSet::new(),
                dynamic_seq: 0,
            }),
            cancel: CancellationToken::new(),
        });

        for spec in options.children {
            let id = spec.id.clone();
            match start_instance(&inner, &spec).await {
                Ok(server) => {
                    inner.state.lock().children.push(ChildRecord {
                        spec,
                        server: Some(server),
                        restart_count: 0,
                        dynamic: false,
                    });
                }
                Err(source) => {
                    unwind_started(&inner).await;
                    return Err(SupervisorError::ChildStart { id, source });
                }
            }
        }

        let source: Weak<dyn SupervisorStatSource> =
            Arc::downgrade(&(inner.clone() as Arc<dyn SupervisorStatSource>));
        runtime.register_supervisor(source);
        spawn_watch_task(&inner);
        tracing::debug!(
            supervisor = ?inner.name,
            strategy = %inner.strategy,
            children = inner.state.lock().children.len(),
            "supervisor started"
        );
        Ok(Self { inner })
    }

    /// Add and start a child under a static-strategy supervisor.
    pub async fn start_child(&self, spec: ChildSpec) -> Result<ServerRef, SupervisorError> {
        if self.inner.strategy == Strategy::SimpleOneForOne {
            return Err(SupervisorError::InvalidSimpleOneForOne);
        }
        {
            let state = self.inner.state.lock();
            if state.phase != Phase::Running {
                return Err(SupervisorError::NotRunning);
            }
            if state.children.iter().any(|c| c.spec.id == spec.id) {
                return Err(SupervisorError::DuplicateChild { id: spec.id.clone() });
            }
        }
        let id = spec.id.clone();
        let server = start_instance(&self.inner, &spec)
            .await
            .map_err(|source| SupervisorError::ChildStart { id: id.clone(), source })?;
        let mut state = self.inner.state.lock();
        if state.children.iter().any(|c| c.spec.id == id) {
            // Lost a race with a concurrent start_child of the same id.
            drop(state);
            let _ = self.inner.runtime.stop(&server, ExitReason::Shutdown).await;
            return Err(SupervisorError::DuplicateChild { id });
        }
        state.children.push(ChildRecord {
            spec,
            server: Some(server.clone()),
            restart_count: 0,
            dynamic: false,
        });
        Ok(server)
    }

    /// Spawn a new instance from the template (simple_one_for_one).
    pub async fn start_template_child(&self, args: Value) -> Result<ServerRef, SupervisorError> {
        if self.inner.strategy != Strategy::SimpleOneForOne {
            return Err(SupervisorError::MissingChildTemplate);
        }
        let Some(template) = self.inner.template.clone() else {
            return Err(SupervisorError::MissingChildTemplate);
        };
        let id = {
            let mut state = self.inner.state.lock();
            if state.phase != Phase::Running {
                return Err(SupervisorError::NotRunning);
            }
            state.dynamic_seq += 1;
            format!("{}-{}", template.id, state.dynamic_seq)
        };
        let spec = ChildSpec { id: id.clone(), args, ..template };
        let server = start_instance(&self.inner, &spec)
            .await
            .map_err(|source| SupervisorError::ChildStart { id, source })?;
        self.inner.state.lock().children.push(ChildRecord {
            spec,
            server: Some(server.clone()),
            restart_count: 0,
            dynamic: true,
        });
        Ok(server)
    }

    /// Stop a child without removing its spec (static strategies) so
    /// `restart_child` can revive it later. Dynamic instances are
    /// removed outright.
    pub async fn terminate_child(&self, id: &str) -> Result<(), SupervisorError> {
        let (server, shutdown_timeout) = {
            let mut state = self.inner.state.lock();
            let record = state
                .children
                .iter_mut()
                .find(|c| c.spec.id == id)
                .ok_or_else(|| SupervisorError::ChildNotFound { id: id.to_string() })?;
            let server = record.server.take();
            let timeout = record.spec.shutdown_timeout;
            let dynamic = record.dynamic;
            if let Some(server) = &server {
                state.expected_stops.insert(server.id);
            }
            if dynamic {
                state.children.retain(|c| c.spec.id != id);
            }
            (server, timeout)
        };
        if let Some(server) = server {
            let _ = self
                .inner
                .runtime
                .stop_with_timeout(&server, ExitReason::Shutdown, shutdown_timeout)
                .await;
        }
        Ok(())
    }

    /// Restart a child: stop the current instance if running, then
    /// start a fresh one from the stored spec.
    pub async fn restart_child(&self, id: &str) -> Result<ServerRef, SupervisorError> {
        let (spec, server) = {
            let mut state = self.inner.state.lock();
            if state.phase != Phase::Running {
                return Err(SupervisorError::NotRunning);
            }
            let record = state
                .children
                .iter_mut()
                .find(|c| c.spec.id == id)
                .ok_or_else(|| SupervisorError::ChildNotFound { id: id.to_string() })?;
            let server = record.server.take();
            let spec = record.spec.clone();
            if let Some(server) = &server {
                state.expected_stops.insert(server.id);
            }
            (spec, server)
        };
        if let Some(server) = server {
            let _ = self
                .inner
                .runtime
                .stop_with_timeout(&server, ExitReason::Shutdown, spec.shutdown_timeout)
                .await;
        }
        let started = start_instance(&self.inner, &spec)
            .await
            .map_err(|source| SupervisorError::ChildStart { id: id.to_string(), source })?;
        let mut state = self.inner.state.lock();
        if let Some(record) = state.children.iter_mut().find(|c| c.spec.id == id) {
            record.server = Some(started.clone());
            record.restart_count += 1;
        }
        Ok(started)
    }

    /// Stop the supervisor: children terminate in reverse start order,
    /// each with its own shutdown timeout.
    pub async fn stop(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.phase != Phase::Running {
                return;
            }
            state.phase = Phase::Stopping;
        }
        self.inner.cancel.cancel();
        stop_all_children(&self.inner).await;
        self.inner.state.lock().phase = Phase::Stopped;
    }

    /// The error that stopped this supervisor, if any.
    pub fn failure(&self) -> Option<SupervisorError> {
        self.inner.state.lock().failure.clone()
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.lock().phase == Phase::Running
    }

    /// Child ids and their current instances, in start order.
    pub fn children(&self) -> Vec<(String, Option<ServerRef>)> {
        self.inner
            .state
            .lock()
            .children
            .iter()
            .map(|c| (c.spec.id.clone(), c.server.clone()))
            .collect()
    }

    pub fn child(&self, id: &str) -> Option<ServerRef> {
        self.inner
            .state
            .lock()
            .children
            .iter()
            .find(|c| c.spec.id == id)
            .and_then(|c| c.server.clone())
    }
}

impl SupervisorStatSource for SupInner {
    fn stat(&self) -> SupervisorStat {
        let state = self.state.lock();
        SupervisorStat {
            name: self.name.clone(),
            strategy: self.strategy.to_string(),
            child_count: state.children.len(),
            running_children: state.children.iter().filter(|c| c.server.is_some()).count(),
            restarts_in_window: state.window.len(),
        }
    }

    fn tree(&self) -> TreeNode {
        let state = self.state.lock();
        TreeNode {
            label: self
                .name
                .clone()
                .unwrap_or_else(|| format!("supervisor({})", self.strategy)),
            children: state
                .children
                .iter()
                .map(|c| TreeNode {
                    label: match &c.server {
                        Some(server) => format!("{} [{}]", c.spec.id, server.id),
                        None => format!("{} [down]", c.spec.id),
                    },
                    children: Vec::new(),
                })
                .collect(),
        }
    }
}

async fn start_instance(
    inner: &Arc<SupInner>,
    spec: &ChildSpec,
) -> Result<ServerRef, crate::error::GenServerError> {
    inner
        .runtime
        .start(spec.behavior.clone(), spec.args.clone(), spec.options.clone())
        .await
}

/// Reverse-order unwind used when startup fails partway.
async fn unwind_started(inner: &Arc<SupInner>) {
    let started: Vec<(ServerRef, Duration)> = {
        let mut guard = inner.state.lock();
        let state = &mut *guard;
        for record in state.children.iter() {
            if let Some(server) = &record.server {
                state.expected_stops.insert(server.id);
            }
        }
        state
            .children
            .iter()
            .rev()
            .filter_map(|c| c.server.clone().map(|s| (s, c.spec.shutdown_timeout)))
            .collect()
    };
    for (server, timeout) in started {
        let _ = inner.runtime.stop_with_timeout(&server, ExitReason::Shutdown, timeout).await;
    }
}

async fn stop_all_children(inner: &Arc<SupInner>) {
    let to_stop: Vec<(ServerRef, Duration)> = {
        let mut state = inner.state.lock();
        let mut to_stop = Vec::new();
        let mut expected = std::mem::take(&mut state.expected_stops);
        for record in state.children.iter_mut().rev() {
            if let Some(server) = record.server.take() {
                expected.insert(server.id);
                to_stop.push((server, record.spec.shutdown_timeout));
            }
        }
        state.expected_stops = expected;
        to_stop
    };
    for (server, timeout) in to_stop {
        let _ = inner.runtime.stop_with_timeout(&server, ExitReason::Shutdown, timeout).await;
    }
}

fn spawn_watch_task(inner: &Arc<SupInner>) {
    let weak = Arc::downgrade(inner);
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
            let Some(inner) = weak.upgrade() else { break };
            handle_child_stopped(&inner, server, reason).await;
        }
    });
}

enum RestartPlan {
    None,
    /// Start-order indices to restart; `terminate_first` stop in
    /// reverse order before anything restarts.
    Restart { terminate_first: Vec<(ServerRef, Duration)>, restart_ids: Vec<String> },
    AutoShutdown,
    Failed,
}

async fn handle_child_stopped(inner: &Arc<SupInner>, server: ServerRef, reason: ExitReason) {
    let plan = {
        let mut state = inner.state.lock();
        if state.expected_stops.remove(&server.id) {
            return;
        }
        if state.phase != Phase::Running {
            return;
        }
        let Some(index) = state
            .children
            .iter()
            .position(|c| c.server.as_ref().is_some_and(|s| s.id == server.id))
        else {
            return;
        };
        state.children[index].server = None;
        let child_id = state.children[index].spec.id.clone();
        let significant = state.children[index].spec.significant;
        let dynamic = state.children[index].dynamic;

        let restarting = state.children[index].spec.restart.should_restart(&reason);
        tracing::debug!(
            supervisor = ?inner.name,
            child = %child_id,
            reason = %reason,
            restarting,
            "supervised child stopped"
        );

        if !restarting {
            if dynamic {
                state.children.retain(|c| c.spec.id != child_id);
            }
            match inner.auto_shutdown {
                AutoShutdown::AnySignificant if significant => RestartPlan::AutoShutdown,
                AutoShutdown::AllSignificant if significant => {
                    let any_significant_left = state
                        .children
                        .iter()
                        .any(|c| c.spec.significant && c.server.is_some());
                    if any_significant_left {
                        RestartPlan::None
                    } else {
                        RestartPlan::AutoShutdown
                    }
                }
                _ => RestartPlan::None,
            }
        } else {
            let now_ms = inner.runtime.clock().epoch_ms();
            if !state.window.record(now_ms, &inner.intensity) {
                state.phase = Phase::Failed;
                state.failure = Some(SupervisorError::MaxRestartsExceeded {
                    restarts: state.window.len() as u32,
                    within_ms: inner.intensity.within.as_millis() as u64,
                });
                RestartPlan::Failed
            } else {
                let (terminate_first, restart_ids) = match inner.strategy {
                    Strategy::OneForOne | Strategy::SimpleOneForOne => {
                        (Vec::new(), vec![child_id])
                    }
                    Strategy::OneForAll => {
                        let terminate: Vec<(ServerRef, Duration)> = state
                            .children
                            .iter_mut()
                            .rev()
                            .filter_map(|c| {
                                c.server.take().map(|s| (s, c.spec.shutdown_timeout))
                            })
                            .collect();
                        let ids =
                            state.children.iter().map(|c| c.spec.id.clone()).collect();
                        (terminate, ids)
                    }
                    Strategy::RestForOne => {
                        let terminate: Vec<(ServerRef, Duration)> = state.children
                            [index..]
                            .iter_mut()
                            .rev()
                            .filter_map(|c| {
                                c.server.take().map(|s| (s, c.spec.shutdown_timeout))
                            })
                            .collect();
                        let ids = state.children[index..]
                            .iter()
                            .map(|c| c.spec.id.clone())
                            .collect();
                        (terminate, ids)
                    }
                };
                for (server, _) in &terminate_first {
                    state.expected_stops.insert(server.id);
                }
                RestartPlan::Restart { terminate_first, restart_ids }
            }
        }
    };

    match plan {
        RestartPlan::None => {}
        RestartPlan::AutoShutdown => {
            tracing::info!(supervisor = ?inner.name, "significant child lost, auto-shutdown");
            shutdown_from_watch(inner).await;
        }
        RestartPlan::Failed => {
            tracing::warn!(supervisor = ?inner.name, "restart intensity exceeded");
            stop_all_children(inner).await;
        }
        RestartPlan::Restart { terminate_first, restart_ids } => {
            for (server, timeout) in terminate_first {
                let _ = inner
                    .runtime
                    .stop_with_timeout(&server, ExitReason::Shutdown, timeout)
                    .await;
            }
            for id in restart_ids {
                restart_one(inner, &id).await;
            }
        }
    }
}

async fn shutdown_from_watch(inner: &Arc<SupInner>) {
    {
        let mut state = inner.state.lock();
        if state.phase != Phase::Running {
            return;
        }
        state.phase = Phase::Stopping;
    }
    stop_all_children(inner).await;
    inner.state.lock().phase = Phase::Stopped;
}

/// Start a fresh instance for `id`. A failing start consumes restart
/// intensity and retries until it sticks or the window is exhausted.
async fn restart_one(inner: &Arc<SupInner>, id: &str) {
    loop {
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
        match start_instance(inner, &spec).await {
            Ok(server) => {
                let stale_server = {
                    let mut state = inner.state.lock();
                    if state.phase != Phase::Running {
                        // Lost a race with shutdown; undo the start.
                        Some(server)
                    } else {
                        if let Some(record) =
                            state.children.iter_mut().find(|c| c.spec.id == id)
                        {
                            record.server = Some(server);
                            record.restart_count += 1;
                        }
                        None
                    }
                };
                if let Some(server) = stale_server {
                    let _ = inner.runtime.stop(&server, ExitReason::Shutdown).await;
                }
                return;
            }
            Err(err) => {
                tracing::warn!(child = id, error = %err, "child restart failed");
                let exceeded = {
                    let mut state = inner.state.lock();
                    let now_ms = inner.runtime.clock().epoch_ms();
                    if !state.window.record(now_ms, &inner.intensity) {
                        state.phase = Phase::Failed;
                        state.failure = Some(SupervisorError::MaxRestartsExceeded {
                            restarts: state.window.len() as u32,
                            within_ms: inner.intensity.within.as_millis() as u64,
                        });
                        true
                    } else {
                        false
                    }
                };
                if exceeded {
                    stop_all_children(inner).await;
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
