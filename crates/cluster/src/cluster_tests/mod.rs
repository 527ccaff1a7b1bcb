// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Multi-node integration tests over loopback TCP.

use crate::config::ClusterConfig;
use crate::error::{ClusterError, GlobalError, RemoteError};
use crate::node::{ClusterEvent, NodeStatus};
use crate::remote::RemoteSpawnOptions;
use crate::test_util::{start_node, test_catalog, wait_connected, wait_disconnected};
use crate::Cluster;
use hive_core::{ExitReason, LifecycleEvent, ServerRef};
use hive_runtime::test_support::wait_for;
use hive_runtime::{Runtime, StartOptions};
use hive_wire::SpawnRegistration;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

mod global;
mod relations;
mod remote;
mod transport;
