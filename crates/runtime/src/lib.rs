// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hive-runtime: the GenServer process model.
//!
//! A [`Runtime`] owns every process record, the name table, the
//! monitor/link graphs, and the lifecycle event hub. Each process runs
//! as one task draining a FIFO mailbox; exactly one behavior callback
//! is active per process at any time, so state never needs a lock.

pub mod behavior;
pub mod error;
pub mod events;
pub mod observer;
pub mod registry;
pub mod runtime;
pub mod supervisor;

mod process;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use behavior::{Behavior, StartOptions};
pub use error::{GenServerError, RegistryError, SupervisorError};
pub use events::EventHub;
pub use observer::{MemoryStats, ObserverSnapshot, ServerStat, SupervisorStat, TreeNode};
pub use registry::{Registry, RegistryEntry, RegistryMode};
pub use runtime::{ProcessStatus, Runtime, TimerRef};
pub use supervisor::{
    AutoShutdown, ChildSpec, RestartIntensity, RestartPolicy, RestartWindow, Strategy,
    Supervisor, SupervisorOptions,
};
