// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process exit reasons.
//!
//! Exit reasons ride on monitor down events, link exit signals, and the
//! wire protocol, so the serde shape is part of the cluster contract.

use serde::{Deserialize, Serialize};

/// Why a process terminated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExitReason {
    /// Normal completion. Does not propagate over links.
    Normal,
    /// Clean supervisor-initiated shutdown. Non-crashing, like Normal;
    /// transient children do not restart on it.
    Shutdown,
    /// A callback failed or the process was stopped with an error.
    Error { message: String },
    /// The target process was already stopped when the relationship was
    /// established.
    Noproc,
    /// The node hosting the remote peer became unreachable.
    Noconnection,
}

impl ExitReason {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error { message: message.into() }
    }

    /// Abnormal reasons propagate over links and count as crashes for
    /// transient restart policies.
    pub fn is_abnormal(&self) -> bool {
        !matches!(self, Self::Normal | Self::Shutdown)
    }
}

crate::simple_display! {
    ExitReason {
        Normal => "normal",
        Shutdown => "shutdown",
        Error { .. } => "error",
        Noproc => "noproc",
        Noconnection => "noconnection",
    }
}

#[cfg(test)]
#[path = "exit_tests.rs"]
mod tests;
