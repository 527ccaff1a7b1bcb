// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hive-cluster: the distribution layer.
//!
//! A [`Cluster`] extends one node's [`hive_runtime::Runtime`] across a
//! peer-to-peer mesh: framed TCP with optional HMAC, heartbeat failure
//! detection, remote call/cast/spawn/monitor/link, a replicated global
//! name registry, and supervisors that place children across nodes.

pub mod catalog;
pub mod cluster;
pub mod config;
pub mod dist_sup;
pub mod error;
pub mod global;
pub mod node;

mod correlation;
mod links;
mod peer;
mod remote;

#[cfg(test)]
mod test_util;

pub use catalog::BehaviorCatalog;
pub use cluster::Cluster;
pub use config::ClusterConfig;
pub use dist_sup::{
    DistChildSpec, DistSupervisorOptions, DistributedSupervisor, NodeSelector,
};
pub use error::{ClusterError, DistSupervisorError, GlobalError, RemoteError};
pub use hive_wire::SpawnRegistration;
pub use node::{ClusterEvent, NodeRecord, NodeStatus};
pub use remote::RemoteSpawnOptions;
