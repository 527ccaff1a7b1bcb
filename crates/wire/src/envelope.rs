// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Versioned message envelope.

use crate::frame::WireError;
use hive_core::{CorrId, NodeId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROTOCOL_VERSION: u32 = 1;

/// Every frame payload is one of these.
///
/// The set is open for extension: unknown kinds fail decoding on old
/// nodes, which close the connection rather than guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Hello,
    HelloAck,
    Heartbeat,
    PeerList,
    NodeDown,
    CallRequest,
    CallReply,
    CallError,
    Cast,
    SpawnRequest,
    SpawnReply,
    StopRequest,
    StopReply,
    MonitorRequest,
    MonitorAck,
    Demonitor,
    ProcessDown,
    LinkRequest,
    LinkAck,
    Unlink,
    ExitSignal,
    GlobalRegister,
    GlobalRegisterAck,
    GlobalUnregister,
    GlobalConflict,
    GlobalSyncRequest,
    GlobalSyncReply,
}

/// The envelope carried in every frame:
/// `{ v, kind, corr_id?, from, to?, body }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEnvelope {
    pub v: u32,
    pub kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corr_id: Option<CorrId>,
    pub from: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<NodeId>,
    #[serde(default)]
    pub body: Value,
}

impl WireEnvelope {
    /// Build an envelope, serializing `body`. Unserializable bodies
    /// surface as [`WireError::Serialization`].
    pub fn new(
        kind: MessageKind,
        from: NodeId,
        body: &impl Serialize,
    ) -> Result<Self, WireError> {
        Ok(Self {
            v: PROTOCOL_VERSION,
            kind,
            corr_id: None,
            from,
            to: None,
            body: serde_json::to_value(body)
                .map_err(|e| WireError::Serialization { message: e.to_string() })?,
        })
    }

    pub fn with_corr(mut self, corr_id: CorrId) -> Self {
        self.corr_id = Some(corr_id);
        self
    }

    pub fn with_to(mut self, to: NodeId) -> Self {
        self.to = Some(to);
        self
    }

    /// Decode the body into its typed form.
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T, WireError> {
        serde_json::from_value(self.body.clone())
            .map_err(|e| WireError::Deserialization { message: e.to_string() })
    }
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
