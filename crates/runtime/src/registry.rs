// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Keyed process registry with unique and duplicate modes.
//!
//! Registrations are removed automatically when the referenced process
//! stops, driven by the runtime's lifecycle subscription.

use crate::error::RegistryError;
use crate::runtime::Runtime;
use hive_core::{match_pattern, LifecycleEvent, ServerRef};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;

/// Keying discipline for a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryMode {
    /// Each key maps to at most one entry.
    Unique,
    /// Each key maps to a set of entries; `dispatch` broadcasts.
    Duplicate,
}

/// One registration under a key.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub server: ServerRef,
    pub metadata: Value,
    pub registered_at_ms: u64,
}

struct RegistryInner {
    mode: RegistryMode,
    runtime: Runtime,
    keys: Mutex<HashMap<String, Vec<RegistryEntry>>>,
    cancel: CancellationToken,
}

impl Drop for RegistryInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Process registry bound to one runtime.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl Registry {
    pub fn new(runtime: Runtime, mode: RegistryMode) -> Self {
        let inner = Arc::new(RegistryInner {
            mode,
            runtime,
            keys: Mutex::new(HashMap::new()),
            cancel: CancellationToken::new(),
        });
        spawn_cleanup_task(&inner);
        Self { inner }
    }

    pub fn mode(&self) -> RegistryMode {
        self.inner.mode
    }

    /// Register `server` under `key`.
    pub fn register(
        &self,
        key: impl Into<String>,
        server: &ServerRef,
        metadata: Value,
    ) -> Result<(), RegistryError> {
        let key = key.into();
        let entry = RegistryEntry {
            server: server.clone(),
            metadata,
            registered_at_ms: self.inner.runtime.clock().epoch_ms(),
        };
        let mut keys = self.inner.keys.lock();
        let entries = keys.entry(key.clone()).or_default();
        match self.inner.mode {
            RegistryMode::Unique if !entries.is_empty() => {
                Err(RegistryError::AlreadyRegisteredKey { key })
            }
            RegistryMode::Duplicate if entries.iter().any(|e| e.server == *server) => {
                Err(RegistryError::DuplicateRegistration { key, server: server.id })
            }
            _ => {
                entries.push(entry);
                Ok(())
            }
        }
    }

    /// Remove every entry under `key`. A missing key is a no-op
    /// returning false.
    pub fn unregister(&self, key: &str) -> bool {
        self.inner.keys.lock().remove(key).is_some()
    }

    /// Remove one server's entry under `key`.
    pub fn unregister_entry(&self, key: &str, server: &ServerRef) -> bool {
        let mut keys = self.inner.keys.lock();
        let Some(entries) = keys.get_mut(key) else { return false };
        let before = entries.len();
        entries.retain(|e| e.server != *server);
        let removed = entries.len() != before;
        if entries.is_empty() {
            keys.remove(key);
        }
        removed
    }

    /// Unique-mode lookup.
    pub fn lookup(&self, key: &str) -> Result<RegistryEntry, RegistryError> {
        let keys = self.inner.keys.lock();
        let entries = keys
            .get(key)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| RegistryError::KeyNotFound { key: key.to_string() })?;
        if entries.len() > 1 {
            return Err(RegistryError::DuplicateKeyLookup { key: key.to_string() });
        }
        Ok(entries[0].clone())
    }

    pub fn lookup_all(&self, key: &str) -> Vec<RegistryEntry> {
        self.inner.keys.lock().get(key).cloned().unwrap_or_default()
    }

    pub fn count(&self, key: &str) -> usize {
        self.inner.keys.lock().get(key).map(|e| e.len()).unwrap_or(0)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.keys.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Keys matching a glob pattern (`*`, `**`, `?`).
    pub fn match_keys(&self, pattern: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .inner
            .keys
            .lock()
            .keys()
            .filter(|k| match_pattern(pattern, k))
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Broadcast `msg` as a cast to every entry under `key`. Returns
    /// the number of processes addressed.
    pub fn dispatch(&self, key: &str, msg: Value) -> Result<usize, RegistryError> {
        self.dispatch_with(key, |entry| {
            self.inner.runtime.cast(&entry.server, msg.clone());
        })
    }

    /// Broadcast with a custom routing function; the function may
    /// filter, transform, or route however it likes.
    pub fn dispatch_with(
        &self,
        key: &str,
        f: impl Fn(&RegistryEntry),
    ) -> Result<usize, RegistryError> {
        if self.inner.mode != RegistryMode::Duplicate {
            return Err(RegistryError::DispatchNotSupported);
        }
        let entries = self.lookup_all(key);
        for entry in &entries {
            f(entry);
        }
        Ok(entries.len())
    }
}

fn spawn_cleanup_task(inner: &Arc<RegistryInner>) {
    let weak: Weak<RegistryInner> = Arc::downgrade(inner);
    let mut events = inner.runtime.subscribe();
    let cancel = inner.cancel.clone();
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            let LifecycleEvent::Stopped { server, .. } = event else { continue };
            let Some(inner) = weak.upgrade() else { break };
            let mut keys = inner.keys.lock();
            keys.retain(|_, entries| {
                entries.retain(|e| e.server.id != server.id);
                !entries.is_empty()
            });
        }
    });
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
