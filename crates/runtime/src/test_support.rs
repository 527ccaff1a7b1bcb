// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test behaviors and helpers shared across crates' tests.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use crate::behavior::{Behavior, StartOptions};
use crate::runtime::Runtime;
use async_trait::async_trait;
use hive_core::ServerRef;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Counter: init → args (or 0), call "get" → state, cast "inc" → +1,
/// call or cast "boom" → crash.
pub struct Counter;

#[async_trait]
impl Behavior for Counter {
    async fn init(&self, args: Value) -> Result<Value, String> {
        Ok(if args.is_number() { args } else { json!(0) })
    }

    async fn handle_call(&self, msg: Value, state: Value) -> Result<(Value, Value), String> {
        match msg.as_str() {
            Some("get") => Ok((state.clone(), state)),
            Some("boom") => Err("boom".to_string()),
            _ => Ok((Value::Null, state)),
        }
    }

    async fn handle_cast(&self, msg: Value, state: Value) -> Result<Value, String> {
        match msg.as_str() {
            Some("inc") => Ok(json!(state.as_i64().unwrap_or(0) + 1)),
            Some("boom") => Err("boom".to_string()),
            _ => Ok(state),
        }
    }
}

/// Recorder: appends every message as `[kind, msg]`; call "log"
/// returns the log.
pub struct Recorder;

fn push(state: Value, kind: &str, msg: Value) -> Value {
    let mut log = state.as_array().cloned().unwrap_or_default();
    log.push(json!([kind, msg]));
    Value::Array(log)
}

#[async_trait]
impl Behavior for Recorder {
    async fn init(&self, _args: Value) -> Result<Value, String> {
        Ok(json!([]))
    }

    async fn handle_call(&self, msg: Value, state: Value) -> Result<(Value, Value), String> {
        if msg.as_str() == Some("log") {
            return Ok((state.clone(), state));
        }
        let state = push(state, "call", msg);
        Ok((Value::Null, state))
    }

    async fn handle_cast(&self, msg: Value, state: Value) -> Result<Value, String> {
        Ok(push(state, "cast", msg))
    }

    async fn handle_info(&self, msg: Value, state: Value) -> Result<Value, String> {
        Ok(push(state, "info", msg))
    }
}

/// Sleeps for `msg.delay_ms` inside handle_call.
pub struct Slow;

#[async_trait]
impl Behavior for Slow {
    async fn init(&self, _args: Value) -> Result<Value, String> {
        Ok(Value::Null)
    }

    async fn handle_call(&self, msg: Value, state: Value) -> Result<(Value, Value), String> {
        let delay = msg["delay_ms"].as_u64().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok((json!("done"), state))
    }

    async fn handle_cast(&self, _msg: Value, state: Value) -> Result<Value, String> {
        Ok(state)
    }
}

/// Fails in init with "nope".
pub struct FailsInit;

#[async_trait]
impl Behavior for FailsInit {
    async fn init(&self, _args: Value) -> Result<Value, String> {
        Err("nope".to_string())
    }

    async fn handle_call(&self, _msg: Value, state: Value) -> Result<(Value, Value), String> {
        Ok((Value::Null, state))
    }

    async fn handle_cast(&self, _msg: Value, state: Value) -> Result<Value, String> {
        Ok(state)
    }
}

pub async fn start_counter(runtime: &Runtime) -> ServerRef {
    runtime
        .start(Arc::new(Counter), Value::Null, StartOptions::default())
        .await
        .expect("start counter")
}

/// Poll `f` every few ms until it returns Some or `max` elapses.
pub async fn wait_for<T>(max: Duration, mut f: impl FnMut() -> Option<T>) -> Option<T> {
    let deadline = tokio::time::Instant::now() + max;
    loop {
        if let Some(value) = f() {
            return Some(value);
        }
        if tokio::time::Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
