//! Cache Store Module
//!
//! Concurrency-safe mapping from key to entry, backed by `DashMap`.

use std::hash::Hash;

use dashmap::DashMap;

use crate::cache::{CacheEntry, Snapshot};

// == Concurrent Store ==
/// Key-value storage safe for unsynchronized use from any number of callers.
///
/// Every operation is linearizable per key: a caller always observes its own
/// preceding writes.
#[derive(Debug)]
pub struct ConcurrentStore<K, V>
where
    K: Eq + Hash,
{
    entries: DashMap<K, CacheEntry<V>>,
}

impl<K, V> ConcurrentStore<K, V>
where
    K: Eq + Hash,
{
    // == Constructor ==
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    // == Get ==
    /// Returns a copy of the entry stored under `key`, expired or not.
    pub fn get(&self, key: &K) -> Option<CacheEntry<V>>
    where
        V: Clone,
    {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    // == Set ==
    /// Stores `entry` under `key`, replacing any previous entry.
    pub fn set(&self, key: K, entry: CacheEntry<V>) {
        self.entries.insert(key, entry);
    }

    // == Delete ==
    /// Removes the entry under `key`. Returns false if there was none.
    pub fn delete(&self, key: &K) -> bool {
        self.entries.remove(key).is_some()
    }

    // == Conditional Delete ==
    /// Removes the entry under `key` only if it is still the write captured
    /// by `snapshot`.
    ///
    /// The check and the removal happen under the same shard lock, so a value
    /// written after the snapshot was taken is never removed.
    pub fn remove_if_unchanged(&self, key: &K, snapshot: &Snapshot) -> bool {
        self.entries
            .remove_if(key, |_, entry| entry.matches(snapshot))
            .is_some()
    }

    // == For Each ==
    /// Visits stored entries until `visitor` returns false.
    ///
    /// Iteration is weakly consistent: concurrent writes to other shards may
    /// or may not be observed. The visitor must not write to this store, as
    /// the shard being visited stays read-locked.
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&K, &CacheEntry<V>) -> bool,
    {
        for item in self.entries.iter() {
            if !visitor(item.key(), item.value()) {
                break;
            }
        }
    }

    // == Length ==
    /// Returns the number of stored entries, including expired ones that
    /// have not been reclaimed yet.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    /// Returns true if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> Default for ConcurrentStore<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}
