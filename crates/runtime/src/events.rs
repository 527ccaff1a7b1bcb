// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle event fan-out.
//!
//! Subscribers get an unbounded channel so `emit` never blocks the
//! runtime; a subscriber that falls behind only grows its own queue.
//! Closed receivers are pruned on the next emit.

use hive_core::LifecycleEvent;
use parking_lot::Mutex;
use tokio::sync::mpsc;

#[derive(Default)]
pub struct EventHub {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<LifecycleEvent>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<LifecycleEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Deliver to every live subscriber, at-least-once.
    pub fn emit(&self, event: LifecycleEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
