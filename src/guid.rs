//! Process-wide unique id generation.
//!
//! Plugins draw their own id, and the ids of their subscriptions, from this
//! service instead of rolling their own counters, so that two components can
//! never collide on an id by coincidence.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

use rustc_hash::FxHashMap;

use crate::registry::Service;

/// Generates process-unique, optionally namespaced, ids.
///
/// A call to [`GenGuid::get`] with the same `(namespace, subnamespace)` pair
/// never returns the same value twice; calls across distinct namespaces draw
/// from independent counters, so the *global* id returned by
/// `get(0, 0)` and a namespaced id from `get(1, 0)` may coincide numerically,
/// but the pair (namespace, id) is always unique. This mirrors a logical
/// containment: a plugin's own id and the ids of its subscriptions come from
/// distinct namespaces so neither set has to reserve room for the other.
#[derive(Default)]
pub struct GenGuid {
    counters: RwLock<FxHashMap<(u64, u64), Mutex<AtomicU64>>>,
}

impl GenGuid {
    /// Construct a generator with no namespaces populated yet.
    pub fn new() -> Self {
        Self {
            counters: RwLock::new(FxHashMap::default()),
        }
    }

    /// Return the next id in `(namespace, subnamespace)`, starting at 1.
    pub fn get(&self, namespace: u64, subnamespace: u64) -> u64 {
        let key = (namespace, subnamespace);
        {
            let counters = self.counters.read().expect("guid lock poisoned");
            if let Some(counter) = counters.get(&key) {
                return counter.lock().expect("guid lock poisoned").fetch_add(1, Ordering::Relaxed) + 1;
            }
        }
        let mut counters = self.counters.write().expect("guid lock poisoned");
        let counter = counters
            .entry(key)
            .or_insert_with(|| Mutex::new(AtomicU64::new(1)));
        counter.lock().expect("guid lock poisoned").fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Return the next id in the global namespace (`0, 0`).
    pub fn get_global(&self) -> u64 {
        self.get(0, 0)
    }
}

impl Service for GenGuid {}
