//! Cache Facade Module
//!
//! Public cache handle combining the concurrent store with the expiry
//! scheduler. Reads check expiry themselves; the scheduler only reclaims
//! memory.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::cache::{CacheEntry, CacheStats, ConcurrentStore, StatsRecorder};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::tasks::{ScheduleExpiry, Scheduler, SchedulerContext, SchedulerHandle};

/// Expiry used when `now + ttl` overflows.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

// == Cache ==
/// In-process key-value cache with permanent and expiring entries.
///
/// Cloning is cheap and every clone refers to the same cache. Entries whose
/// expiry has passed are invisible to reads immediately; a background
/// scheduler task removes them from memory some time after.
///
/// # Example
/// ```ignore
/// let cache = Cache::new();
/// cache.set_permanent("config", "v1");
/// cache.set_with_ttl("session", "abc", Duration::from_secs(30)).await;
/// assert_eq!(cache.get(&"session"), Some("abc"));
/// cache.close();
/// ```
pub struct Cache<K, V>
where
    K: Eq + Hash,
{
    inner: Arc<CacheInner<K, V>>,
}

struct CacheInner<K, V>
where
    K: Eq + Hash,
{
    ctx: SchedulerContext<K, V>,
    /// Scheduler currently accepting instructions
    scheduler: Mutex<SchedulerHandle<K>>,
}

impl<K, V> Clone for Cache<K, V>
where
    K: Eq + Hash,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    // == Constructors ==
    /// Creates a cache with the default configuration.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime, like `tokio::spawn`.
    pub fn new() -> Self {
        Self::build(CacheConfig::default())
    }

    /// Creates a cache from `config`.
    ///
    /// Fails if the configuration is invalid or no Tokio runtime is running.
    pub fn with_config(config: CacheConfig) -> Result<Self> {
        config.validate()?;
        Handle::try_current().map_err(|e| CacheError::NoRuntime(e.to_string()))?;
        Ok(Self::build(config))
    }

    fn build(config: CacheConfig) -> Self {
        let ctx = SchedulerContext {
            store: Arc::new(ConcurrentStore::new()),
            stats: Arc::new(StatsRecorder::new()),
            shutdown: CancellationToken::new(),
            queue_capacity: config.queue_capacity,
            name: config.name,
        };
        let scheduler = Scheduler::launch(&ctx, 0, None);

        Self {
            inner: Arc::new(CacheInner {
                ctx,
                scheduler: Mutex::new(scheduler),
            }),
        }
    }

    // == Get ==
    /// Returns the value and expiry stored under `key`.
    ///
    /// Returns None if the key is absent or its expiry has passed. Never
    /// modifies the cache.
    pub fn get_with_expiry(&self, key: &K) -> Option<(V, Option<Instant>)>
    where
        V: Clone,
    {
        let found = self
            .inner
            .ctx
            .store
            .get(key)
            .filter(|entry| !entry.is_expired());

        match found {
            Some(entry) => {
                self.inner.ctx.stats.record_hit();
                Some((entry.value, entry.expiry))
            }
            None => {
                self.inner.ctx.stats.record_miss();
                None
            }
        }
    }

    /// Returns the value stored under `key`, unless absent or expired.
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.get_with_expiry(key).map(|(value, _)| value)
    }

    // == Set Permanent ==
    /// Stores `value` under `key` without an expiry, replacing any previous
    /// entry. Does nothing once the cache is closed.
    pub fn set_permanent(&self, key: K, value: V) {
        if self.is_closed() {
            return;
        }
        self.inner.ctx.store.set(key, CacheEntry::permanent(value));
    }

    // == Set With Expiry ==
    /// Stores `value` under `key` until `expiry`, replacing any previous
    /// entry, and schedules the entry for reclamation.
    ///
    /// Writes whose expiry is not strictly in the future are ignored, as are
    /// writes after `close()`. The returned future may wait briefly while the
    /// scheduler catches up with earlier instructions.
    pub async fn set_with_expiry(&self, key: K, value: V, expiry: Instant) {
        if self.is_closed() {
            return;
        }
        if expiry <= Instant::now() {
            debug!("Ignored write with an expiry that has already passed");
            return;
        }

        let entry = CacheEntry::expiring(value, expiry);
        let Some(snapshot) = entry.snapshot() else {
            return;
        };
        self.inner.ctx.store.set(key.clone(), entry);
        self.dispatch_insert(ScheduleExpiry { key, snapshot }).await;
    }

    /// Stores `value` under `key` for `ttl` from now.
    ///
    /// A `ttl` too large to represent as an instant is capped at roughly
    /// thirty years.
    pub async fn set_with_ttl(&self, key: K, value: V, ttl: Duration) {
        let now = Instant::now();
        let expiry = now.checked_add(ttl).unwrap_or_else(|| now + FAR_FUTURE);
        self.set_with_expiry(key, value, expiry).await;
    }

    // == Delete ==
    /// Removes `key` from the cache and drops its pending expiry record.
    /// Does nothing once the cache is closed.
    pub async fn delete(&self, key: K) {
        if self.is_closed() {
            return;
        }
        self.inner.ctx.store.delete(&key);
        self.dispatch_delete(key).await;
    }

    // == Range Over ==
    /// Calls `visitor` for each live entry until it returns false.
    ///
    /// Expired entries are skipped, not removed. The visitor must not write
    /// to this cache.
    pub fn range_over<F>(&self, mut visitor: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        let now = Instant::now();
        self.inner.ctx.store.for_each(|key, entry| {
            if entry.is_expired_at(now) {
                return true;
            }
            visitor(key, &entry.value)
        });
    }

    // == Close ==
    /// Stops the expiry scheduler for good.
    ///
    /// Stored data stays readable under the usual expiry checks, but later
    /// writes and deletes are ignored and nothing is reclaimed anymore.
    /// Call at most once per cache.
    pub fn close(&self) {
        self.inner.ctx.shutdown.cancel();
        info!(cache = %self.inner.ctx.name, "Cache closed");
    }

    /// Returns true once `close()` has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.ctx.shutdown.is_cancelled()
    }

    // == Introspection ==
    /// Returns the number of stored entries, including expired entries the
    /// scheduler has not reclaimed yet.
    pub fn len(&self) -> usize {
        self.inner.ctx.store.len()
    }

    /// Returns true if nothing is stored, expired or not.
    pub fn is_empty(&self) -> bool {
        self.inner.ctx.store.is_empty()
    }

    /// Returns true while the most recently launched scheduler task is running.
    pub fn scheduler_active(&self) -> bool {
        !self.inner.scheduler.lock().task.is_finished()
    }

    /// Returns a snapshot of the cache counters.
    pub fn stats(&self) -> CacheStats {
        self.inner.ctx.stats.snapshot(self.len())
    }

    // == Instruction Delivery ==
    async fn dispatch_insert(&self, mut request: ScheduleExpiry<K>) {
        loop {
            let inserts = self.inner.scheduler.lock().inserts.clone();
            match inserts.send(request).await {
                Ok(()) => return,
                Err(failed) => match self.relaunch(&inserts, failed.0) {
                    Some(unsent) => request = unsent,
                    None => return,
                },
            }
        }
    }

    /// Handles an insert the scheduler behind `stale` refused.
    ///
    /// Launches a scheduler seeded with `request` unless another caller has
    /// already replaced `stale`, in which case the request is handed back to
    /// be sent again.
    fn relaunch(
        &self,
        stale: &mpsc::Sender<ScheduleExpiry<K>>,
        request: ScheduleExpiry<K>,
    ) -> Option<ScheduleExpiry<K>> {
        let mut current = self.inner.scheduler.lock();
        if self.is_closed() {
            trace!("Dropped expiry instruction after close");
            return None;
        }
        if !current.inserts.same_channel(stale) {
            return Some(request);
        }

        let generation = current.generation + 1;
        *current = Scheduler::launch(&self.inner.ctx, generation, Some(request));
        info!(cache = %self.inner.ctx.name, generation, "Expiry scheduler relaunched");
        None
    }

    async fn dispatch_delete(&self, key: K) {
        let deletes = self.inner.scheduler.lock().deletes.clone();
        // A refused delete is dropped. A scheduler that closed its queues
        // with records left may still hold one for this key; that record,
        // and its share of `pending_expiries`, stays until its expiry is
        // swept, where it counts as stale since the entry is already gone.
        if deletes.send(key).await.is_err() {
            trace!("Dropped delete instruction, no live scheduler");
        }
    }
}

impl<K, V> Default for Cache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Drop for CacheInner<K, V>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        self.ctx.shutdown.cancel();
    }
}
