// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node identity: `name@host:port`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::str::FromStr;
use thiserror::Error;

/// Errors from parsing a node identity string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NodeIdError {
    #[error("node id {0:?} is missing the '@' separator")]
    MissingAt(String),

    #[error("node id {0:?} has an empty name")]
    EmptyName(String),

    #[error("node id {0:?} is missing the ':port' suffix")]
    MissingPort(String),

    #[error("node id {0:?} has an empty host")]
    EmptyHost(String),

    #[error("node id {0:?} has an invalid port")]
    InvalidPort(String),
}

/// Identity of a cluster node: `name@host:port`.
///
/// Two nodes with the same identity are the same logical peer. The
/// string form is the canonical representation on the wire and in the
/// global registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    name: String,
    host: String,
    port: u16,
}

impl NodeId {
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
    ) -> Result<Self, NodeIdError> {
        let name = name.into();
        let host = host.into();
        if name.is_empty() {
            return Err(NodeIdError::EmptyName(format!("{name}@{host}:{port}")));
        }
        if host.is_empty() {
            return Err(NodeIdError::EmptyHost(format!("{name}@{host}:{port}")));
        }
        if port == 0 {
            return Err(NodeIdError::InvalidPort(format!("{name}@{host}:{port}")));
        }
        Ok(Self { name, host, port })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Deterministic priority used to break global-registry ties.
    ///
    /// First 8 bytes (big-endian) of the SHA-256 of the canonical id;
    /// every node computes the same value for a given peer.
    pub fn priority(&self) -> u64 {
        let digest = Sha256::digest(self.to_string().as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(bytes)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}:{}", self.name, self.host, self.port)
    }
}

impl FromStr for NodeId {
    type Err = NodeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, addr) = s
            .split_once('@')
            .ok_or_else(|| NodeIdError::MissingAt(s.to_string()))?;
        if name.is_empty() {
            return Err(NodeIdError::EmptyName(s.to_string()));
        }
        let (host, port) = addr
            .rsplit_once(':')
            .ok_or_else(|| NodeIdError::MissingPort(s.to_string()))?;
        if host.is_empty() {
            return Err(NodeIdError::EmptyHost(s.to_string()));
        }
        let port: u16 = port
            .parse()
            .map_err(|_| NodeIdError::InvalidPort(s.to_string()))?;
        if port == 0 {
            return Err(NodeIdError::InvalidPort(s.to_string()));
        }
        Ok(Self { name: name.to_string(), host: host.to_string(), port })
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[path = "node_tests.rs"]
mod tests;
