// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-process mailbox task.
//!
//! One task per process drains the mailbox and runs exactly one
//! behavior callback at a time. Between messages (and between a
//! message and its callback) a forced kill via the cancellation token
//! wins, which is how shutdown-timeout overruns are cut short.

use crate::behavior::Behavior;
use crate::error::GenServerError;
use crate::runtime::{ProcessStatus, Runtime};
use hive_core::{ExitReason, LifecycleEvent, ServerRef, StateMetadata};
use hive_store::{PersistenceManager, StoreError};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// A queued mailbox message.
pub(crate) enum Envelope {
    Call { msg: Value, reply: oneshot::Sender<Result<Value, GenServerError>> },
    Cast { msg: Value },
    Info { msg: Value },
    Stop { reason: ExitReason, done: Option<oneshot::Sender<()>> },
    Checkpoint { reply: oneshot::Sender<Result<StateMetadata, GenServerError>> },
    SnapshotTick,
    CleanupTick,
}

enum Step {
    Continue,
    Exit(LoopExit),
}

enum LoopExit {
    /// Orderly stop, explicit or from a drained mailbox.
    Stop { reason: ExitReason, done: Option<oneshot::Sender<()>> },
    /// A callback returned an error.
    Crash { reason: ExitReason },
    /// Forced kill; skip the terminate callback.
    Killed,
}

pub(crate) struct ProcessTask {
    pub runtime: Runtime,
    pub server: ServerRef,
    pub behavior: Arc<dyn Behavior>,
    pub state: Value,
    pub manager: Option<Arc<PersistenceManager>>,
    pub rx: mpsc::UnboundedReceiver<Envelope>,
    pub cancel: CancellationToken,
}

impl ProcessTask {
    pub(crate) async fn run(mut self) {
        let exit = self.message_loop().await;
        let reason = match exit {
            LoopExit::Stop { reason, done } => {
                self.shutdown(&reason).await;
                self.runtime.finish_terminate(&self.server, reason.clone());
                if let Some(done) = done {
                    let _ = done.send(());
                }
                reason
            }
            LoopExit::Crash { reason } => {
                tracing::warn!(server = %self.server, reason = %reason, "process crashed");
                self.shutdown(&reason).await;
                self.runtime.finish_terminate(&self.server, reason.clone());
                reason
            }
            LoopExit::Killed => {
                let reason = self
                    .runtime
                    .take_kill_reason(&self.server)
                    .unwrap_or(ExitReason::Shutdown);
                self.runtime.finish_terminate(&self.server, reason.clone());
                reason
            }
        };
        tracing::debug!(server = %self.server, reason = %reason, "process stopped");
    }

    async fn message_loop(&mut self) -> LoopExit {
        loop {
            let envelope = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return LoopExit::Killed,
                envelope = self.rx.recv() => match envelope {
                    Some(envelope) => envelope,
                    None => return LoopExit::Stop { reason: ExitReason::Normal, done: None },
                },
            };
            let cancel = self.cancel.clone();
            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => return LoopExit::Killed,
                step = self.handle(envelope) => step,
            };
            match step {
                Step::Continue => {}
                Step::Exit(exit) => return exit,
            }
        }
    }

    async fn handle(&mut self, envelope: Envelope) -> Step {
        match envelope {
            Envelope::Call { msg, reply } => {
                self.runtime.note_handled(&self.server);
                match self.behavior.handle_call(msg, self.state.clone()).await {
                    Ok((value, new_state)) => {
                        self.state = new_state;
                        let _ = reply.send(Ok(value));
                        Step::Continue
                    }
                    // Dropping `reply` tells the caller the server died.
                    Err(message) => Step::Exit(LoopExit::Crash {
                        reason: ExitReason::error(message),
                    }),
                }
            }
            Envelope::Cast { msg } => {
                self.runtime.note_handled(&self.server);
                match self.behavior.handle_cast(msg, self.state.clone()).await {
                    Ok(new_state) => {
                        self.state = new_state;
                        Step::Continue
                    }
                    Err(message) => Step::Exit(LoopExit::Crash {
                        reason: ExitReason::error(message),
                    }),
                }
            }
            Envelope::Info { msg } => {
                self.runtime.note_handled(&self.server);
                match self.behavior.handle_info(msg, self.state.clone()).await {
                    Ok(new_state) => {
                        self.state = new_state;
                        Step::Continue
                    }
                    Err(message) => Step::Exit(LoopExit::Crash {
                        reason: ExitReason::error(message),
                    }),
                }
            }
            Envelope::Stop { reason, done } => Step::Exit(LoopExit::Stop { reason, done }),
            Envelope::Checkpoint { reply } => {
                let _ = reply.send(self.checkpoint().await);
                Step::Continue
            }
            Envelope::SnapshotTick => {
                self.snapshot(false).await;
                Step::Continue
            }
            Envelope::CleanupTick => {
                if let Some(manager) = self.manager.clone() {
                    if let Err(err) = manager.cleanup().await {
                        manager.report(&err);
                        self.emit_persistence_error(&err);
                    }
                }
                Step::Continue
            }
        }
    }

    /// Manual checkpoint: a vetoed snapshot is an error here, unlike
    /// the periodic path.
    async fn checkpoint(&self) -> Result<StateMetadata, GenServerError> {
        let Some(manager) = self.manager.clone() else {
            return Err(GenServerError::PersistenceNotConfigured { id: self.server.id });
        };
        let Some(state) = self.behavior.before_persist(&self.state) else {
            let err = StoreError::PersistSkipped;
            manager.report(&err);
            return Err(err.into());
        };
        match manager.save(state, self.runtime.clock().epoch_ms()).await {
            Ok(metadata) => {
                self.runtime.events().emit(LifecycleEvent::StatePersisted {
                    server: self.server.clone(),
                    metadata: metadata.clone(),
                });
                Ok(metadata)
            }
            Err(err) => {
                manager.report(&err);
                self.emit_persistence_error(&err);
                Err(err.into())
            }
        }
    }

    /// Periodic or shutdown snapshot; never crashes the process.
    async fn snapshot(&self, on_shutdown: bool) {
        let Some(manager) = self.manager.clone() else { return };
        if on_shutdown && !manager.config().persist_on_shutdown {
            return;
        }
        // A vetoed periodic snapshot skips silently.
        let Some(state) = self.behavior.before_persist(&self.state) else { return };
        match manager.save(state, self.runtime.clock().epoch_ms()).await {
            Ok(metadata) => {
                self.runtime.events().emit(LifecycleEvent::StatePersisted {
                    server: self.server.clone(),
                    metadata,
                });
            }
            Err(err) => {
                manager.report(&err);
                self.emit_persistence_error(&err);
            }
        }
    }

    /// Orderly termination: callback, final snapshot, adapter teardown.
    async fn shutdown(&mut self, reason: &ExitReason) {
        self.runtime.set_status(&self.server, ProcessStatus::Terminating);
        self.behavior.terminate(reason, self.state.clone()).await;
        self.snapshot(true).await;
        if let Some(manager) = self.manager.clone() {
            if manager.config().cleanup_on_terminate {
                if let Err(err) = manager.delete().await {
                    manager.report(&err);
                    self.emit_persistence_error(&err);
                }
            }
            if let Err(err) = manager.close().await {
                manager.report(&err);
            }
        }
    }

    fn emit_persistence_error(&self, err: &StoreError) {
        self.runtime.events().emit(LifecycleEvent::PersistenceError {
            server: self.server.clone(),
            error: err.to_string(),
        });
    }
}
