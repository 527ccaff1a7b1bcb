// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The behavior vtable implemented by every GenServer.

use async_trait::async_trait;
use hive_core::ExitReason;
use hive_store::PersistenceConfig;
use serde_json::Value;

/// State transitions for a stateful process.
///
/// `init`, `handle_call`, and `handle_cast` are required; the rest have
/// no-op defaults. Returning `Err` from any callback crashes the
/// process with `ExitReason::Error { message }`; the supervisor (if
/// any) decides what happens next.
#[async_trait]
pub trait Behavior: Send + Sync + 'static {
    /// Produce the initial state. A failure here surfaces to the
    /// caller of `start` and the process never exists.
    async fn init(&self, args: Value) -> Result<Value, String>;

    /// Handle a synchronous call. Returns `(reply, new_state)`.
    async fn handle_call(&self, msg: Value, state: Value) -> Result<(Value, Value), String>;

    /// Handle a fire-and-forget cast. Returns the new state.
    async fn handle_cast(&self, msg: Value, state: Value) -> Result<Value, String>;

    /// Handle out-of-band messages: timer deliveries, trapped exit
    /// signals, direct sends.
    async fn handle_info(&self, _msg: Value, state: Value) -> Result<Value, String> {
        Ok(state)
    }

    /// Invoked during orderly termination, before monitors and links
    /// are notified.
    async fn terminate(&self, _reason: &ExitReason, _state: Value) {}

    /// Transform restored state before it becomes the initial state.
    async fn on_state_restore(&self, state: Value) -> Result<Value, String> {
        Ok(state)
    }

    /// Choose what to persist. `None` skips the snapshot: a manual
    /// checkpoint reports an error, a periodic snapshot skips silently.
    fn before_persist(&self, state: &Value) -> Option<Value> {
        Some(state.clone())
    }
}

/// Options for `Runtime::start`.
#[derive(Clone, Default)]
pub struct StartOptions {
    /// Unique registered name for lookup; `AlreadyRegistered` when taken.
    pub name: Option<String>,
    /// Convert incoming exit signals into info messages instead of
    /// terminating.
    pub trap_exit: bool,
    pub persistence: Option<PersistenceConfig>,
}

impl StartOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), ..Self::default() }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn trap_exit(mut self, on: bool) -> Self {
        self.trap_exit = on;
        self
    }

    pub fn persistence(mut self, config: PersistenceConfig) -> Self {
        self.persistence = Some(config);
        self
    }
}
