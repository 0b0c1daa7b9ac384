//! State owned by the host thread.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

/// Stand-in for the host application's scene.
///
/// Only the dispatcher touches it, always from the host thread.
#[derive(Debug, Default)]
pub struct HostState {
    paused: bool,
    locked: BTreeSet<String>,
    /// Last payload per `(component, target)`.
    applied: BTreeMap<(String, String), Value>,
    mutations: u64,
}

impl HostState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_locked(&self, id: &str) -> bool {
        self.locked.contains(id)
    }

    /// Lock or unlock an object. Returns whether the set changed.
    pub fn set_locked(&mut self, id: &str, locked: bool) -> bool {
        if locked {
            self.locked.insert(id.to_string())
        } else {
            self.locked.remove(id)
        }
    }

    pub fn locked_objects(&self) -> impl Iterator<Item = &str> {
        self.locked.iter().map(String::as_str)
    }

    /// Record `payload` as the latest state of `component` on `target`.
    pub fn apply(&mut self, component: &str, target: &str, payload: Value) {
        self.applied
            .insert((component.to_string(), target.to_string()), payload);
        self.mutations += 1;
    }

    pub fn last_applied(&self, component: &str, target: &str) -> Option<&Value> {
        self.applied
            .get(&(component.to_string(), target.to_string()))
    }

    /// Number of mutations applied since startup.
    pub fn mutation_count(&self) -> u64 {
        self.mutations
    }
}
