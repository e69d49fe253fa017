//! Keyed state storage
//!
//! Per-principal state (lockout counters, security settings) lives behind
//! [`StateStore`] so hosts can swap the in-memory default for a durable
//! backend. Implementations must apply `modify` atomically per key.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Keyed store with atomic read-modify-write
pub trait StateStore<V>: Send + Sync {
    /// Read the current value for `key`
    fn load(&self, key: &str) -> Option<V>;

    /// Atomically replace the value for `key` with `f(current)`.
    ///
    /// Returning `None` from `f` removes the entry. Returns the stored value.
    fn modify(&self, key: &str, f: &mut dyn FnMut(Option<V>) -> Option<V>) -> Option<V>;

    /// Remove the value for `key`
    fn remove(&self, key: &str) -> Option<V>;
}

/// In-memory store backed by a sharded concurrent map
pub struct MemoryStore<V> {
    entries: DashMap<String, V>,
}

impl<V> MemoryStore<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send + Sync> StateStore<V> for MemoryStore<V> {
    fn load(&self, key: &str) -> Option<V> {
        self.entries.get(key).map(|v| v.clone())
    }

    fn modify(&self, key: &str, f: &mut dyn FnMut(Option<V>) -> Option<V>) -> Option<V> {
        // The entry guard holds the shard lock for the whole update.
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => match f(Some(occupied.get().clone())) {
                Some(updated) => {
                    occupied.insert(updated.clone());
                    Some(updated)
                }
                None => {
                    occupied.remove();
                    None
                }
            },
            Entry::Vacant(vacant) => {
                let updated = f(None)?;
                vacant.insert(updated.clone());
                Some(updated)
            }
        }
    }

    fn remove(&self, key: &str) -> Option<V> {
        self.entries.remove(key).map(|(_, v)| v)
    }
}
