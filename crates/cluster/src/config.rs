// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cluster configuration.

use crate::error::ClusterError;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 4369;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(5_000);
pub const DEFAULT_HEARTBEAT_MISS_THRESHOLD: u32 = 3;
pub const DEFAULT_RECONNECT_BASE_DELAY: Duration = Duration::from_millis(1_000);
pub const DEFAULT_RECONNECT_MAX_DELAY: Duration = Duration::from_millis(30_000);

/// Configuration for one cluster node.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Logical node name (the part before `@`).
    pub node_name: String,
    /// Bind host. `0.0.0.0` advertises the loopback address to peers.
    pub host: String,
    /// Bind port. 0 binds an ephemeral port and advertises the bound
    /// one.
    pub port: u16,
    /// Peers to dial at startup, as `name@host:port`.
    pub seeds: Vec<String>,
    /// Shared secret for frame HMACs. Must match across all members.
    pub cluster_secret: Option<String>,
    pub heartbeat_interval: Duration,
    pub heartbeat_miss_threshold: u32,
    pub reconnect_base_delay: Duration,
    pub reconnect_max_delay: Duration,
}

impl ClusterConfig {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            seeds: Vec::new(),
            cluster_secret: None,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            heartbeat_miss_threshold: DEFAULT_HEARTBEAT_MISS_THRESHOLD,
            reconnect_base_delay: DEFAULT_RECONNECT_BASE_DELAY,
            reconnect_max_delay: DEFAULT_RECONNECT_MAX_DELAY,
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn seed(mut self, seed: impl Into<String>) -> Self {
        self.seeds.push(seed.into());
        self
    }

    pub fn cluster_secret(mut self, secret: impl Into<String>) -> Self {
        self.cluster_secret = Some(secret.into());
        self
    }

    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn heartbeat_miss_threshold(mut self, threshold: u32) -> Self {
        self.heartbeat_miss_threshold = threshold;
        self
    }

    pub fn reconnect_delays(mut self, base: Duration, max: Duration) -> Self {
        self.reconnect_base_delay = base;
        self.reconnect_max_delay = max;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ClusterError> {
        if self.node_name.is_empty() {
            return Err(ClusterError::InvalidClusterConfig {
                message: "node_name must not be empty".into(),
            });
        }
        if self.node_name.contains('@') {
            return Err(ClusterError::InvalidClusterConfig {
                message: "node_name must not contain '@'".into(),
            });
        }
        if self.host.is_empty() {
            return Err(ClusterError::InvalidClusterConfig {
                message: "host must not be empty".into(),
            });
        }
        if self.heartbeat_interval.is_zero() {
            return Err(ClusterError::InvalidClusterConfig {
                message: "heartbeat_interval must be positive".into(),
            });
        }
        if self.heartbeat_miss_threshold == 0 {
            return Err(ClusterError::InvalidClusterConfig {
                message: "heartbeat_miss_threshold must be positive".into(),
            });
        }
        if self.reconnect_base_delay > self.reconnect_max_delay {
            return Err(ClusterError::InvalidClusterConfig {
                message: "reconnect_base_delay exceeds reconnect_max_delay".into(),
            });
        }
        Ok(())
    }

    /// The host peers should dial; a wildcard bind advertises loopback.
    pub(crate) fn advertised_host(&self) -> &str {
        if self.host == "0.0.0.0" || self.host == "::" {
            "127.0.0.1"
        } else {
            &self.host
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
