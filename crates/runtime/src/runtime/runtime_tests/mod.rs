// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kernel tests: call/cast/info semantics, monitors, links, timers,
//! persistence wiring.
//!
//! Child modules pull the shared surface from here via `use super::*`.

use crate::behavior::{Behavior, StartOptions};
use crate::runtime::Runtime;
use crate::test_support::{start_counter, wait_for, Counter, FailsInit, Recorder, Slow};
use async_trait::async_trait;
use hive_core::{ExitReason, LifecycleEvent, ServerRef};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

mod calls;
mod links;
mod monitors;
mod persistence;
mod timers;
