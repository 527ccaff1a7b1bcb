// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for the spec suite.

use async_trait::async_trait;
use hive_runtime::Behavior;
use serde_json::{json, Value};
use std::time::Duration;

/// The counter behavior from the scenarios: init → 0 (or numeric
/// args), `get` replies with the state, `inc` adds one, `boom`
/// crashes.
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
            _ => Ok(state),
        }
    }
}

/// Traps exits and records every info message.
pub struct Coordinator;

#[async_trait]
impl Behavior for Coordinator {
    async fn init(&self, _args: Value) -> Result<Value, String> {
        Ok(json!([]))
    }

    async fn handle_call(&self, _msg: Value, state: Value) -> Result<(Value, Value), String> {
        Ok((state.clone(), state))
    }

    async fn handle_cast(&self, _msg: Value, state: Value) -> Result<Value, String> {
        Ok(state)
    }

    async fn handle_info(&self, msg: Value, state: Value) -> Result<Value, String> {
        let mut log = state.as_array().cloned().unwrap_or_default();
        log.push(msg);
        Ok(Value::Array(log))
    }
}

/// Poll `f` until it yields Some or `max` elapses.
pub async fn eventually<T>(max: Duration, mut f: impl FnMut() -> Option<T>) -> Option<T> {
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
