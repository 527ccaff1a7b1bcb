// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Behavior catalog consulted by remote spawns.
//!
//! Every node registers its behaviors before participating in
//! distributed spawns; a spawn request naming an absent behavior fails
//! with `BehaviorNotFound` on the target node.

use hive_runtime::Behavior;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct BehaviorCatalog {
    behaviors: Arc<Mutex<HashMap<String, Arc<dyn Behavior>>>>,
}

impl BehaviorCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a behavior under `name`.
    pub fn register(&self, name: impl Into<String>, behavior: Arc<dyn Behavior>) {
        self.behaviors.lock().insert(name.into(), behavior);
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.behaviors.lock().remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Behavior>> {
        self.behaviors.lock().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.behaviors.lock().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.behaviors.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod tests;
