//! Expiry Chain
//!
//! Singly linked list of pending expirations, sorted by expiry instant.
//! Only the scheduler task that owns a chain ever touches it, so it carries
//! no lock.

use std::hash::Hash;

use tokio::time::Instant;
use tracing::trace;

use crate::cache::{ConcurrentStore, Snapshot};

// == Expiry Record ==
/// One pending expiration: the key, the write it was scheduled for, and the
/// link to the next record.
#[derive(Debug)]
pub struct ExpiryRecord<K> {
    pub key: K,
    pub snapshot: Snapshot,
    next: Option<Box<ExpiryRecord<K>>>,
}

impl<K> ExpiryRecord<K> {
    /// Instant at which the scheduled write expires.
    pub fn expiry(&self) -> Instant {
        self.snapshot.expiry
    }
}

// == Sweep Report ==
/// Outcome of one sweep over the head of a chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Records whose entry was still current and got removed from the store
    pub reclaimed: u64,
    /// Records whose entry had been overwritten or deleted in the meantime
    pub stale: u64,
}

// == Expiry Chain ==
/// Records in ascending expiry order; equal expiries keep arrival order.
#[derive(Debug)]
pub struct ExpiryChain<K> {
    head: Option<Box<ExpiryRecord<K>>>,
    len: usize,
}

impl<K> ExpiryChain<K>
where
    K: Eq + Hash,
{
    // == Constructor ==
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self { head: None, len: 0 }
    }

    // == Insert ==
    /// Links a record in front of the first record expiring strictly later,
    /// or at the tail if there is none.
    pub fn insert(&mut self, key: K, snapshot: Snapshot) {
        let mut cursor = &mut self.head;
        while cursor
            .as_ref()
            .is_some_and(|node| node.expiry() <= snapshot.expiry)
        {
            if let Some(node) = cursor {
                cursor = &mut node.next;
            }
        }

        let next = cursor.take();
        *cursor = Some(Box::new(ExpiryRecord {
            key,
            snapshot,
            next,
        }));
        self.len += 1;
        trace!(pending = self.len, "Expiry record linked");
    }

    // == Remove ==
    /// Splices out the first record for `key`. Returns false if the chain
    /// holds no record for it.
    pub fn remove(&mut self, key: &K) -> bool {
        let mut cursor = &mut self.head;
        loop {
            match cursor {
                None => return false,
                Some(node) if node.key == *key => {
                    let next = node.next.take();
                    *cursor = next;
                    self.len -= 1;
                    trace!(pending = self.len, "Expiry record spliced out");
                    return true;
                }
                Some(node) => cursor = &mut node.next,
            }
        }
    }

    // == Sweep Expired ==
    /// Pops every record at the head that has expired at `now` and removes
    /// its entry from `store`, but only if that entry is still the exact
    /// write the record was scheduled for.
    pub fn sweep_expired<V>(&mut self, now: Instant, store: &ConcurrentStore<K, V>) -> SweepReport {
        let mut report = SweepReport::default();

        while let Some(record) = self.pop_expired(now) {
            if store.remove_if_unchanged(&record.key, &record.snapshot) {
                report.reclaimed += 1;
            } else {
                report.stale += 1;
            }
        }
        report
    }

    fn pop_expired(&mut self, now: Instant) -> Option<ExpiryRecord<K>> {
        if !self.head.as_ref().is_some_and(|head| head.expiry() <= now) {
            return None;
        }
        let mut head = self.head.take()?;
        self.head = head.next.take();
        self.len -= 1;
        Some(*head)
    }

    // == Accessors ==
    /// Expiry of the head record, i.e. the next instant a sweep is due.
    pub fn next_expiry(&self) -> Option<Instant> {
        self.head.as_ref().map(|head| head.expiry())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &ExpiryRecord<K>> {
        std::iter::successors(self.head.as_deref(), |node| node.next.as_deref())
    }
}

impl<K> Default for ExpiryChain<K>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

// Unlink iteratively; the default drop would recurse once per record.
impl<K> Drop for ExpiryChain<K> {
    fn drop(&mut self) {
        let mut cursor = self.head.take();
        while let Some(mut node) = cursor {
            cursor = node.next.take();
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheEntry;
    use std::time::Duration;

    /// Stores a timed entry and returns the snapshot a scheduled write carries.
    fn write(store: &ConcurrentStore<&'static str, &'static str>, key: &'static str, expiry: Instant) -> Snapshot {
        let entry = CacheEntry::expiring("value", expiry);
        let snapshot = entry.snapshot().unwrap();
        store.set(key, entry);
        snapshot
    }

    fn snapshot_at(expiry: Instant) -> Snapshot {
        CacheEntry::expiring((), expiry).snapshot().unwrap()
    }

    fn keys<K: Eq + Hash + Copy>(chain: &ExpiryChain<K>) -> Vec<K> {
        chain.iter().map(|record| record.key).collect()
    }

    #[test]
    fn test_chain_new() {
        let chain: ExpiryChain<&str> = ExpiryChain::new();
        assert!(chain.is_empty());
        assert_eq!(chain.len(), 0);
        assert!(chain.next_expiry().is_none());
    }

    #[test]
    fn test_insert_keeps_ascending_order() {
        let base = Instant::now();
        let mut chain = ExpiryChain::new();

        chain.insert("c", snapshot_at(base + Duration::from_secs(3)));
        chain.insert("a", snapshot_at(base + Duration::from_secs(1)));
        chain.insert("d", snapshot_at(base + Duration::from_secs(4)));
        chain.insert("b", snapshot_at(base + Duration::from_secs(2)));

        assert_eq!(keys(&chain), vec!["a", "b", "c", "d"]);
        assert_eq!(chain.len(), 4);
        assert_eq!(chain.next_expiry(), Some(base + Duration::from_secs(1)));
    }

    #[test]
    fn test_insert_equal_expiry_appends_after_existing() {
        let expiry = Instant::now() + Duration::from_secs(1);
        let mut chain = ExpiryChain::new();

        chain.insert("first", snapshot_at(expiry));
        chain.insert("second", snapshot_at(expiry));
        chain.insert("earlier", snapshot_at(expiry - Duration::from_millis(1)));
        chain.insert("third", snapshot_at(expiry));

        assert_eq!(keys(&chain), vec!["earlier", "first", "second", "third"]);
    }

    #[test]
    fn test_remove_head_middle_and_tail() {
        let base = Instant::now();
        let mut chain = ExpiryChain::new();
        for (i, key) in ["a", "b", "c", "d"].into_iter().enumerate() {
            chain.insert(key, snapshot_at(base + Duration::from_secs(i as u64)));
        }

        assert!(chain.remove(&"a"));
        assert!(chain.remove(&"c"));
        assert!(chain.remove(&"d"));
        assert_eq!(keys(&chain), vec!["b"]);
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_remove_missing_and_empty() {
        let mut chain = ExpiryChain::new();
        assert!(!chain.remove(&"a"), "Removing from an empty chain is a no-op");

        chain.insert("a", snapshot_at(Instant::now()));
        assert!(!chain.remove(&"b"));
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_remove_only_first_match() {
        let base = Instant::now();
        let mut chain = ExpiryChain::new();
        chain.insert("k", snapshot_at(base + Duration::from_secs(1)));
        chain.insert("k", snapshot_at(base + Duration::from_secs(2)));

        assert!(chain.remove(&"k"));
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.next_expiry(), Some(base + Duration::from_secs(2)));
    }

    #[test]
    fn test_sweep_pops_only_expired_head() {
        let store = ConcurrentStore::new();
        let base = Instant::now();
        let mut chain = ExpiryChain::new();

        chain.insert("a", write(&store, "a", base + Duration::from_secs(1)));
        chain.insert("b", write(&store, "b", base + Duration::from_secs(2)));
        chain.insert("c", write(&store, "c", base + Duration::from_secs(3)));

        let report = chain.sweep_expired(base + Duration::from_secs(2), &store);

        assert_eq!(report, SweepReport { reclaimed: 2, stale: 0 });
        assert_eq!(keys(&chain), vec!["c"]);
        assert!(store.get(&"a").is_none());
        assert!(store.get(&"b").is_none());
        assert!(store.get(&"c").is_some());
    }

    #[test]
    fn test_sweep_skips_overwritten_entries() {
        let store = ConcurrentStore::new();
        let base = Instant::now();
        let mut chain = ExpiryChain::new();

        chain.insert("k", write(&store, "k", base + Duration::from_secs(1)));
        // Refreshed with a later expiry before the first record is swept
        chain.insert("k", write(&store, "k", base + Duration::from_secs(5)));

        let report = chain.sweep_expired(base + Duration::from_secs(2), &store);

        assert_eq!(report, SweepReport { reclaimed: 0, stale: 1 });
        assert!(store.get(&"k").is_some(), "Refreshed entry must survive");
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_sweep_counts_deleted_entries_as_stale() {
        let store = ConcurrentStore::new();
        let base = Instant::now();
        let mut chain = ExpiryChain::new();

        chain.insert("k", write(&store, "k", base));
        store.delete(&"k");

        let report = chain.sweep_expired(base, &store);
        assert_eq!(report, SweepReport { reclaimed: 0, stale: 1 });
        assert!(chain.is_empty());
    }

    #[test]
    fn test_sweep_nothing_due() {
        let store = ConcurrentStore::new();
        let base = Instant::now();
        let mut chain = ExpiryChain::new();
        chain.insert("a", write(&store, "a", base + Duration::from_secs(1)));

        let report = chain.sweep_expired(base, &store);
        assert_eq!(report, SweepReport::default());
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_drop_long_chain() {
        let snapshot = snapshot_at(Instant::now());
        let mut chain = ExpiryChain::new();
        // Prepend directly so building the chain stays linear
        for key in 0..200_000u32 {
            let next = chain.head.take();
            chain.head = Some(Box::new(ExpiryRecord {
                key,
                snapshot,
                next,
            }));
            chain.len += 1;
        }
        assert_eq!(chain.len(), 200_000);
        drop(chain);
    }
}
