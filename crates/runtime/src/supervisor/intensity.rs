// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Restart intensity window.

use std::collections::VecDeque;
use std::time::Duration;

/// Bound on restarts per trailing window. Defaults to 3 in 5 000 ms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartIntensity {
    pub max_restarts: u32,
    pub within: Duration,
}

impl Default for RestartIntensity {
    fn default() -> Self {
        Self { max_restarts: 3, within: Duration::from_millis(5_000) }
    }
}

/// Timestamps of recorded restarts, pruned to the trailing window.
/// Holds at most `max_restarts + 1` entries: the entry that crosses
/// the bound is the supervisor's death warrant.
#[derive(Debug, Default)]
pub struct RestartWindow {
    timestamps: VecDeque<u64>,
}

impl RestartWindow {
    /// Record a restart that actually happened. Returns false when the
    /// bound is now exceeded.
    pub fn record(&mut self, now_ms: u64, intensity: &RestartIntensity) -> bool {
        let cutoff = now_ms.saturating_sub(intensity.within.as_millis() as u64);
        while self.timestamps.front().is_some_and(|t| *t < cutoff) {
            self.timestamps.pop_front();
        }
        self.timestamps.push_back(now_ms);
        self.timestamps.len() <= intensity.max_restarts as usize
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

#[cfg(test)]
#[path = "intensity_tests.rs"]
mod tests;
