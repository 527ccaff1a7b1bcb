// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The process runtime: process table, names, monitors, links, timers.
//!
//! All shared tables are runtime-owned singletons behind short-lived
//! `parking_lot` locks; behavior callbacks never run while a table
//! lock is held. Lock order where two tables are needed is always
//! processes → relations.

use crate::behavior::{Behavior, StartOptions};
use crate::error::GenServerError;
use crate::events::EventHub;
use crate::observer::SupervisorStatSource;
use crate::process::{Envelope, ProcessTask};
use hive_core::{
    ClockHandle, ExitReason, LifecycleEvent, LinkId, MonitorId, ServerId, ServerRef,
    StateMetadata, SystemClock, TimerId,
};
use hive_store::PersistenceManager;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

pub(crate) const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_millis(5_000);
pub(crate) const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Lifecycle phase of a process record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    Starting,
    Running,
    Terminating,
    Stopped,
}

hive_core::simple_display! {
    ProcessStatus {
        Starting => "starting",
        Running => "running",
        Terminating => "terminating",
        Stopped => "stopped",
    }
}

pub(crate) struct ProcessEntry {
    pub server: ServerRef,
    pub name: Option<String>,
    pub sender: mpsc::UnboundedSender<Envelope>,
    pub status: ProcessStatus,
    pub trap_exit: bool,
    pub started_at_ms: u64,
    pub message_count: u64,
    pub mailbox_len: usize,
    pub last_message_at_ms: Option<u64>,
    pub cancel: CancellationToken,
    pub kill_reason: Option<ExitReason>,
    pub manager: Option<Arc<PersistenceManager>>,
}

#[derive(Clone)]
struct MonitorRecord {
    id: MonitorId,
    watcher: ServerRef,
    target: ServerRef,
}

#[derive(Clone)]
struct LinkRecord {
    id: LinkId,
    a: ServerRef,
    b: ServerRef,
}

impl LinkRecord {
    fn peer_of(&self, id: ServerId) -> Option<&ServerRef> {
        if self.a.id == id {
            Some(&self.b)
        } else if self.b.id == id {
            Some(&self.a)
        } else {
            None
        }
    }
}

/// Monitor and link graphs. Each record lives in both endpoints'
/// slots and is removed from both on teardown; the runtime is the
/// sole owner, so no reference cycles exist.
#[derive(Default)]
struct RelationTables {
    monitors_by_target: HashMap<ServerId, Vec<MonitorRecord>>,
    monitors_by_watcher: HashMap<ServerId, Vec<MonitorId>>,
    links_by_process: HashMap<ServerId, Vec<LinkRecord>>,
}

struct TimerEntry {
    owner: ServerId,
    handle: tokio::task::JoinHandle<()>,
}

pub(crate) struct RuntimeInner {
    clock: ClockHandle,
    processes: Mutex<HashMap<ServerId, ProcessEntry>>,
    names: Mutex<HashMap<String, ServerId>>,
    relations: Mutex<RelationTables>,
    timers: Mutex<HashMap<TimerId, TimerEntry>>,
    supervisors: Mutex<Vec<Weak<dyn SupervisorStatSource>>>,
    events: EventHub,
    started_at_ms: u64,
}

/// Handle to the process runtime. Cheap to clone; all clones share
/// the same tables.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_clock(SystemClock::handle())
    }

    pub fn with_clock(clock: ClockHandle) -> Self {
        let started_at_ms = clock.epoch_ms();
        Self {
            inner: Arc::new(RuntimeInner {
                clock,
                processes: Mutex::new(HashMap::new()),
                names: Mutex::new(HashMap::new()),
                relations: Mutex::new(RelationTables::default()),
                timers: Mutex::new(HashMap::new()),
                supervisors: Mutex::new(Vec::new()),
                events: EventHub::new(),
                started_at_ms,
            }),
        }
    }

    pub fn clock(&self) -> &ClockHandle {
        &self.inner.clock
    }

    pub fn events(&self) -> &EventHub {
        &self.inner.events
    }

    /// Subscribe to the lifecycle event stream.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<LifecycleEvent> {
        self.inner.events.subscribe()
    }

    pub fn started_at_ms(&self) -> u64 {
        self.inner.started_at_ms
    }

    // ---- start ---------------------------------------------------------

    /// Start a process running `behavior` with `args`.
    ///
    /// The handle is only returned once `init` (or a state restore)
    /// has succeeded and the mailbox task is running.
    pub async fn start(
        &self,
        behavior: Arc<dyn Behavior>,
        args: Value,
        options: StartOptions,
    ) -> Result<ServerRef, GenServerError> {
        let id = ServerId::new();
        let server = ServerRef::local(id);
        let now_ms = self.inner.clock.epoch_ms();

        // Reserve the name before any await so concurrent starts race
        // on the table, not on init.
        if let Some(name) = &options.name {
            let mut names = self.inner.names.lock();
            if names.contains_key(name) {
                return Err(GenServerError::AlreadyRegistered { name: name.clone() });
            }
            names.insert(name.clone(), id);
        }

        let manager = options.persistence.clone().map(|config| {
            Arc::new(PersistenceManager::new(config, id, options.name.clone()))
        });

        let restored = match &manager {
            Some(manager) if manager.config().restore_on_start => {
                match manager.load(now_ms).await {
                    Ok(Some((state, metadata))) => Some((state, metadata)),
                    Ok(None) => None,
                    Err(err) => {
                        // A bad or stale snapshot falls back to a fresh
                        // init; the owner still hears about it.
                        manager.report(&err);
                        tracing::warn!(
                            server = %server,
                            error = %err,
                            "state restore failed, starting fresh"
                        );
                        None
                    }
                }
            }
            _ => None,
        };

        let init_result = match restored {
            Some((state, metadata)) => match behavior.on_state_restore(state).await {
                Ok(state) => Ok((state, Some(metadata))),
                Err(message) => Err(message),
            },
            None => behavior.init(args).await.map(|state| (state, None)),
        };
        let (state, restored_meta) = match init_result {
            Ok(ok) => ok,
            Err(message) => {
                if let Some(name) = &options.name {
                    self.inner.names.lock().remove(name);
                }
                return Err(GenServerError::InitializationError { message });
            }
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        {
            let mut processes = self.inner.processes.lock();
            processes.insert(
                id,
                ProcessEntry {
                    server: server.clone(),
                    name: options.name.clone(),
                    sender: tx.clone(),
                    status: ProcessStatus::Running,
                    trap_exit: options.trap_exit,
                    started_at_ms: now_ms,
                    message_count: 0,
                    mailbox_len: 0,
                    last_message_at_ms: None,
                    cancel: cancel.clone(),
                    kill_reason: None,
                    manager: manager.clone(),
                },
            );
        }

        self.spawn_persistence_ticks(&tx, &cancel, manager.as_deref());

        let task = ProcessTask {
            runtime: self.clone(),
            server: server.clone(),
            behavior,
            state,
            manager,
            rx,
            cancel,
        };
        tokio::spawn(task.run());

        tracing::debug!(server = %server, name = ?options.name, "process started");
        self.inner.events.emit(LifecycleEvent::Started {
            server: server.clone(),
            name: options.name.clone(),
        });
        if let Some(metadata) = restored_meta {
            self.inner.events.emit(LifecycleEvent::StateRestored {
                server: server.clone(),
                metadata,
            });
        }
        Ok(server)
    }

    fn spawn_persistence_ticks(
        &self,
        sender: &mpsc::UnboundedSender<Envelope>,
        cancel: &CancellationToken,
        manager: Option<&PersistenceManager>,
    ) {
        let Some(manager) = manager else { return };
        if let Some(interval) = manager.config().snapshot_interval {
            spawn_tick(sender.clone(), cancel.clone(), interval, || Envelope::SnapshotTick);
        }
        if manager.config().max_state_age.is_some() {
            if let Some(interval) = manager.config().cleanup_interval {
                spawn_tick(sender.clone(), cancel.clone(), interval, || Envelope::CleanupTick);
            }
        }
    }

    // ---- messaging -----------------------------------------------------

    /// Synchronous request; suspends until the reply, the timeout
    /// (default 5 000 ms), or the death of the callee.
    pub async fn call(
        &self,
        server: &ServerRef,
        msg: Value,
        timeout: Option<Duration>,
    ) -> Result<Value, GenServerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.enqueue(server, Envelope::Call { msg, reply: reply_tx })?;
        let timeout = timeout.unwrap_or(DEFAULT_CALL_TIMEOUT);
        match tokio::time::timeout(timeout, reply_rx).await {
            // Dropping reply_rx on timeout discards any late reply.
            Err(_) => Err(GenServerError::CallTimeout {
                id: server.id,
                timeout_ms: timeout.as_millis() as u64,
            }),
            Ok(Err(_)) => Err(GenServerError::ServerNotRunning { id: server.id }),
            Ok(Ok(result)) => result,
        }
    }

    /// Fire-and-forget send. Never blocks; silently dropped when the
    /// process is stopped or stopping.
    pub fn cast(&self, server: &ServerRef, msg: Value) {
        let _ = self.enqueue(server, Envelope::Cast { msg });
    }

    /// Deliver an info message (timers, exit signals, direct sends).
    /// Returns false when the process is not running.
    pub fn deliver_info(&self, server: &ServerRef, msg: Value) -> bool {
        self.enqueue(server, Envelope::Info { msg }).is_ok()
    }

    fn enqueue(&self, server: &ServerRef, envelope: Envelope) -> Result<(), GenServerError> {
        let is_user_message =
            matches!(envelope, Envelope::Call { .. } | Envelope::Cast { .. } | Envelope::Info { .. });
        let now_ms = self.inner.clock.epoch_ms();
        let mut processes = self.inner.processes.lock();
        let entry = processes
            .get_mut(&server.id)
            .ok_or(GenServerError::ServerNotRunning { id: server.id })?;
        if entry.status != ProcessStatus::Running {
            return Err(GenServerError::ServerNotRunning { id: server.id });
        }
        entry
            .sender
            .send(envelope)
            .map_err(|_| GenServerError::ServerNotRunning { id: server.id })?;
        if is_user_message {
            entry.message_count += 1;
            entry.mailbox_len += 1;
            entry.last_message_at_ms = Some(now_ms);
        }
        Ok(())
    }

    pub(crate) fn note_handled(&self, server: &ServerRef) {
        let mut processes = self.inner.processes.lock();
        if let Some(entry) = processes.get_mut(&server.id) {
            entry.mailbox_len = entry.mailbox_len.saturating_sub(1);
        }
    }

    // ---- timers --------------------------------------------------------

    /// One-shot, non-durable timer delivering `msg` as an info message
    /// after `delay`. Owned by the target process: cancelled when it
    /// terminates.
    pub fn send_after(&self, server: &ServerRef, msg: Value, delay: Duration) -> TimerRef {
        let id = TimerId::new();
        let runtime = self.clone();
        let target = server.clone();
        let timer_id = id;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Remove ourselves first so cancel() on a fired timer is a no-op.
            if runtime.inner.timers.lock().remove(&timer_id).is_some() {
                runtime.deliver_info(&target, msg);
            }
        });
        self.inner
            .timers
            .lock()
            .insert(id, TimerEntry { owner: server.id, handle });
        TimerRef { id, runtime: self.clone() }
    }

    pub(crate) fn cancel_timer(&self, id: &TimerId) -> bool {
        match self.inner.timers.lock().remove(id) {
            Some(entry) => {
                entry.handle.abort();
                true
            }
            None => false,
        }
    }

    fn cancel_timers_owned_by(&self, owner: ServerId) {
        let mut timers = self.inner.timers.lock();
        let ids: Vec<TimerId> =
            timers.iter().filter(|(_, e)| e.owner == owner).map(|(id, _)| *id).collect();
        for id in ids {
            if let Some(entry) = timers.remove(&id) {
                entry.handle.abort();
            }
        }
    }

    // ---- stop ----------------------------------------------------------

    /// Orderly stop with the default shutdown timeout.
    pub async fn stop(
        &self,
        server: &ServerRef,
        reason: ExitReason,
    ) -> Result<(), GenServerError> {
        self.stop_with_timeout(server, reason, DEFAULT_SHUTDOWN_TIMEOUT).await
    }

    /// Orderly stop: sends the shutdown envelope, waits up to `timeout`
    /// for the terminate sequence, then force-kills. Returns once the
    /// process is fully gone.
    pub async fn stop_with_timeout(
        &self,
        server: &ServerRef,
        reason: ExitReason,
        timeout: Duration,
    ) -> Result<(), GenServerError> {
        // Subscribe before touching the process so the Stopped event
        // cannot be missed.
        let events = self.subscribe();
        let (done_tx, done_rx) = oneshot::channel();
        let already_terminating = {
            let mut processes = self.inner.processes.lock();
            let Some(entry) = processes.get_mut(&server.id) else {
                return Err(GenServerError::ServerNotRunning { id: server.id });
            };
            if entry.status == ProcessStatus::Terminating {
                true
            } else {
                entry.status = ProcessStatus::Terminating;
                let _ = entry
                    .sender
                    .send(Envelope::Stop { reason: reason.clone(), done: Some(done_tx) });
                false
            }
        };

        if already_terminating {
            self.await_stopped(server.id, events, timeout).await;
            return Ok(());
        }

        match tokio::time::timeout(timeout, done_rx).await {
            Ok(Ok(())) => Ok(()),
            // The task died some other way; it is gone either way.
            Ok(Err(_)) => Ok(()),
            Err(_) => {
                tracing::warn!(server = %server, "shutdown timeout, killing process");
                self.kill(server, reason);
                self.await_stopped(server.id, events, DEFAULT_SHUTDOWN_TIMEOUT).await;
                Ok(())
            }
        }
    }

    /// Force-kill: cancels the mailbox task at the next await point.
    pub(crate) fn kill(&self, server: &ServerRef, reason: ExitReason) {
        let mut processes = self.inner.processes.lock();
        if let Some(entry) = processes.get_mut(&server.id) {
            entry.kill_reason = Some(reason);
            entry.status = ProcessStatus::Terminating;
            entry.cancel.cancel();
        }
    }

    pub(crate) fn take_kill_reason(&self, server: &ServerRef) -> Option<ExitReason> {
        self.inner.processes.lock().get_mut(&server.id).and_then(|e| e.kill_reason.take())
    }

    async fn await_stopped(
        &self,
        id: ServerId,
        mut events: mpsc::UnboundedReceiver<LifecycleEvent>,
        timeout: Duration,
    ) {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if !self.exists(id) {
                return;
            }
            match tokio::time::timeout_at(deadline, events.recv()).await {
                Ok(Some(LifecycleEvent::Stopped { server, .. })) if server.id == id => return,
                Ok(Some(_)) => continue,
                Ok(None) | Err(_) => return,
            }
        }
    }

    /// Send an exit signal to `target` as if from `from`.
    ///
    /// Trapping processes receive an `EXIT` info message and survive;
    /// everyone else terminates with the same reason.
    pub fn exit_signal(&self, target: &ServerRef, from: &ServerRef, reason: ExitReason) {
        let traps = {
            let processes = self.inner.processes.lock();
            match processes.get(&target.id) {
                Some(entry) if entry.status == ProcessStatus::Running => entry.trap_exit,
                _ => return,
            }
        };
        if traps {
            self.deliver_info(
                target,
                json!({
                    "type": "EXIT",
                    "from": from,
                    "reason": reason,
                }),
            );
        } else {
            let mut processes = self.inner.processes.lock();
            if let Some(entry) = processes.get_mut(&target.id) {
                let _ = entry.sender.send(Envelope::Stop { reason, done: None });
            }
        }
    }

    // ---- monitors and links -------------------------------------------

    /// Register a one-way monitor. A dead target yields an immediate
    /// `process_down` with reason `noproc`.
    pub fn monitor(&self, watcher: &ServerRef, target: &ServerRef) -> MonitorId {
        let id = MonitorId::new();
        let processes = self.inner.processes.lock();
        let alive = processes
            .get(&target.id)
            .is_some_and(|e| e.status != ProcessStatus::Stopped);
        if alive {
            let mut relations = self.inner.relations.lock();
            relations.monitors_by_target.entry(target.id).or_default().push(MonitorRecord {
                id,
                watcher: watcher.clone(),
                target: target.clone(),
            });
            relations.monitors_by_watcher.entry(watcher.id).or_default().push(id);
            return id;
        }
        drop(processes);
        self.inner.events.emit(LifecycleEvent::ProcessDown {
            watcher: watcher.clone(),
            monitor_id: id,
            monitored: target.clone(),
            reason: ExitReason::Noproc,
        });
        id
    }

    /// Remove a monitor. Returns false when it was already gone.
    pub fn demonitor(&self, id: &MonitorId) -> bool {
        let mut relations = self.inner.relations.lock();
        let mut found = false;
        for records in relations.monitors_by_target.values_mut() {
            let before = records.len();
            records.retain(|r| r.id != *id);
            found |= records.len() != before;
        }
        for ids in relations.monitors_by_watcher.values_mut() {
            ids.retain(|m| m != id);
        }
        found
    }

    /// Establish a symmetric link. Linking to a dead process delivers
    /// an immediate `noproc` exit signal to the requester.
    pub fn link(&self, requester: &ServerRef, target: &ServerRef) -> LinkId {
        let id = LinkId::new();
        let target_alive = {
            let processes = self.inner.processes.lock();
            let target_alive = processes
                .get(&target.id)
                .is_some_and(|e| e.status != ProcessStatus::Stopped);
            if target_alive {
                let record =
                    LinkRecord { id, a: requester.clone(), b: target.clone() };
                let mut relations = self.inner.relations.lock();
                relations
                    .links_by_process
                    .entry(requester.id)
                    .or_default()
                    .push(record.clone());
                relations.links_by_process.entry(target.id).or_default().push(record);
            }
            target_alive
        };
        if !target_alive {
            self.exit_signal(requester, target, ExitReason::Noproc);
        }
        id
    }

    /// Remove a link from both endpoints. Returns false when unknown.
    pub fn unlink(&self, id: &LinkId) -> bool {
        let mut relations = self.inner.relations.lock();
        let mut found = false;
        for records in relations.links_by_process.values_mut() {
            let before = records.len();
            records.retain(|r| r.id != *id);
            found |= records.len() != before;
        }
        found
    }

    // ---- persistence surface ------------------------------------------

    /// Snapshot current state through the process's own mailbox, so it
    /// serializes with in-flight messages.
    pub async fn checkpoint(&self, server: &ServerRef) -> Result<StateMetadata, GenServerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.enqueue(server, Envelope::Checkpoint { reply: reply_tx })?;
        match reply_rx.await {
            Ok(result) => result,
            Err(_) => Err(GenServerError::ServerNotRunning { id: server.id }),
        }
    }

    pub async fn last_checkpoint_meta(
        &self,
        server: &ServerRef,
    ) -> Result<Option<StateMetadata>, GenServerError> {
        let manager = self.manager_of(server)?;
        Ok(manager.last_metadata().await?)
    }

    pub async fn clear_persisted_state(
        &self,
        server: &ServerRef,
    ) -> Result<bool, GenServerError> {
        let manager = self.manager_of(server)?;
        Ok(manager.delete().await?)
    }

    fn manager_of(&self, server: &ServerRef) -> Result<Arc<PersistenceManager>, GenServerError> {
        let processes = self.inner.processes.lock();
        let entry = processes
            .get(&server.id)
            .ok_or(GenServerError::ServerNotRunning { id: server.id })?;
        entry
            .manager
            .clone()
            .ok_or(GenServerError::PersistenceNotConfigured { id: server.id })
    }

    // ---- lookups -------------------------------------------------------

    pub fn whereis(&self, name: &str) -> Option<ServerRef> {
        let id = *self.inner.names.lock().get(name)?;
        Some(ServerRef::local(id))
    }

    pub fn is_alive(&self, server: &ServerRef) -> bool {
        self.inner
            .processes
            .lock()
            .get(&server.id)
            .is_some_and(|e| e.status == ProcessStatus::Running)
    }

    pub fn status(&self, server: &ServerRef) -> Option<ProcessStatus> {
        self.inner.processes.lock().get(&server.id).map(|e| e.status)
    }

    pub fn process_count(&self) -> usize {
        self.inner.processes.lock().len()
    }

    pub(crate) fn exists(&self, id: ServerId) -> bool {
        self.inner.processes.lock().contains_key(&id)
    }

    pub(crate) fn set_status(&self, server: &ServerRef, status: ProcessStatus) {
        if let Some(entry) = self.inner.processes.lock().get_mut(&server.id) {
            entry.status = status;
        }
    }

    pub(crate) fn register_supervisor(&self, source: Weak<dyn SupervisorStatSource>) {
        self.inner.supervisors.lock().push(source);
    }

    pub(crate) fn supervisor_sources(&self) -> Vec<Arc<dyn SupervisorStatSource>> {
        let mut sources = self.inner.supervisors.lock();
        sources.retain(|weak| weak.strong_count() > 0);
        sources.iter().filter_map(|weak| weak.upgrade()).collect()
    }

    pub(crate) fn entry_snapshot(&self) -> Vec<crate::observer::ServerStat> {
        let now_ms = self.inner.clock.epoch_ms();
        let processes = self.inner.processes.lock();
        processes
            .values()
            .map(|entry| crate::observer::ServerStat {
                server: entry.server.clone(),
                name: entry.name.clone(),
                status: entry.status,
                message_count: entry.message_count,
                mailbox_len: entry.mailbox_len,
                started_at_ms: entry.started_at_ms,
                last_message_at_ms: entry.last_message_at_ms,
                uptime_ms: now_ms.saturating_sub(entry.started_at_ms),
            })
            .collect()
    }

    // ---- teardown ------------------------------------------------------

    /// Stop every process (used by node shutdown and tests). Processes
    /// get the default shutdown timeout each, in parallel.
    pub async fn shutdown(&self) {
        let servers: Vec<ServerRef> = {
            let processes = self.inner.processes.lock();
            processes.values().map(|e| e.server.clone()).collect()
        };
        futures_util::future::join_all(servers.into_iter().map(|server| {
            let runtime = self.clone();
            async move {
                let _ = runtime.stop(&server, ExitReason::Shutdown).await;
            }
        }))
        .await;
    }

    // ---- termination plumbing -----------------------------------------

    /// Tear a process out of every table and notify the world.
    ///
    /// Runs on the process task after the terminate sequence (or a
    /// forced kill): timers die, the name frees up, monitors fire
    /// exactly once each, links propagate, then `stopped` goes out.
    pub(crate) fn finish_terminate(&self, server: &ServerRef, reason: ExitReason) {
        let id = server.id;
        self.cancel_timers_owned_by(id);

        let name = {
            let mut processes = self.inner.processes.lock();
            processes.remove(&id).and_then(|e| e.name)
        };
        if let Some(name) = name {
            self.inner.names.lock().remove(&name);
        }

        let (downs, links) = {
            let mut relations = self.inner.relations.lock();

            // Monitors watching this process fire once each.
            let downs = relations.monitors_by_target.remove(&id).unwrap_or_default();
            for record in &downs {
                if let Some(ids) = relations.monitors_by_watcher.get_mut(&record.watcher.id) {
                    ids.retain(|m| *m != record.id);
                }
            }

            // Monitors this process held over others disappear.
            if let Some(ids) = relations.monitors_by_watcher.remove(&id) {
                for records in relations.monitors_by_target.values_mut() {
                    records.retain(|r| !ids.contains(&r.id));
                }
            }

            // Links detach from both endpoints.
            let links = relations.links_by_process.remove(&id).unwrap_or_default();
            for link in &links {
                if let Some(peer) = link.peer_of(id) {
                    if let Some(records) = relations.links_by_process.get_mut(&peer.id) {
                        records.retain(|r| r.id != link.id);
                    }
                }
            }

            (downs, links)
        };

        for record in downs {
            self.inner.events.emit(LifecycleEvent::ProcessDown {
                watcher: record.watcher,
                monitor_id: record.id,
                monitored: record.target,
                reason: reason.clone(),
            });
        }

        if reason.is_abnormal() {
            for link in &links {
                if let Some(peer) = link.peer_of(id) {
                    self.exit_signal(peer, server, reason.clone());
                }
            }
        }

        self.inner.events.emit(LifecycleEvent::Stopped {
            server: server.clone(),
            reason,
        });
    }
}

/// Cancellable handle returned by [`Runtime::send_after`].
pub struct TimerRef {
    id: TimerId,
    runtime: Runtime,
}

impl TimerRef {
    pub fn id(&self) -> TimerId {
        self.id
    }

    /// Cancel the timer. Returns false when it already fired or was
    /// cancelled.
    pub fn cancel(&self) -> bool {
        self.runtime.cancel_timer(&self.id)
    }
}

fn spawn_tick(
    sender: mpsc::UnboundedSender<Envelope>,
    cancel: CancellationToken,
    interval: Duration,
    make: fn() -> Envelope,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {
                    if sender.send(make()).is_err() {
                        break;
                    }
                }
            }
        }
    });
}

#[cfg(test)]
#[path = "runtime_tests/mod.rs"]
mod tests;
