// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! hive-wire: cluster wire protocol, version 1.
//!
//! Wire format: 4-byte length prefix (big-endian), then an optional
//! 32-byte HMAC-SHA256 (when a cluster secret is configured), then a
//! JSON envelope payload.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod bodies;
mod envelope;
mod frame;

pub use bodies::{
    CallErrorBody, CallReplyBody, CallRequestBody, CastBody, DemonitorBody, ExitSignalBody,
    GlobalConflictBody, GlobalEntryBody, GlobalRegisterAckBody, GlobalRegisterBody,
    GlobalSyncReplyBody, GlobalUnregisterBody, HeartbeatBody, HelloBody, LinkAckBody,
    LinkRequestBody, MonitorAckBody, MonitorRequestBody, NodeDownBody, PeerListBody,
    ProcessDownBody, RemoteErrorKind, SpawnRegistration, SpawnReplyBody, SpawnRequestBody,
    StopReplyBody, StopRequestBody, UnlinkBody,
};
pub use envelope::{MessageKind, WireEnvelope, PROTOCOL_VERSION};
pub use frame::{decode, encode, read_frame, write_frame, WireError, MAC_LEN, MAX_FRAME_LEN};

#[cfg(test)]
mod property_tests;
