//! Cache Statistics Module
//!
//! Tracks read outcomes and the work done by the expiry scheduler.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;

use crate::tasks::SweepReport;

// == Cache Stats ==
/// Point-in-time copy of the cache counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Number of reads that found a live entry
    pub hits: u64,
    /// Number of reads that found nothing, or only an expired entry
    pub misses: u64,
    /// Entries removed from the store by a sweep
    pub reclaimed: u64,
    /// Swept records whose entry had been overwritten or deleted
    pub stale_records: u64,
    /// Records currently waiting in expiry chains
    pub pending_expiries: usize,
    /// Number of times a scheduler task was started
    pub scheduler_launches: u64,
    /// Current number of entries in the store, expired or not
    pub total_entries: usize,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no reads have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// == Stats Recorder ==
/// Shared counters updated by the facade and the scheduler tasks.
#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    hits: AtomicU64,
    misses: AtomicU64,
    reclaimed: AtomicU64,
    stale_records: AtomicU64,
    pending_expiries: AtomicUsize,
    scheduler_launches: AtomicU64,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_launch(&self) {
        self.scheduler_launches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sweep(&self, report: &SweepReport) {
        self.reclaimed.fetch_add(report.reclaimed, Ordering::Relaxed);
        self.stale_records.fetch_add(report.stale, Ordering::Relaxed);
    }

    // == Pending Expiries ==
    /// Applies the change of one chain's length from `before` to `after`.
    pub fn track_pending(&self, before: usize, after: usize) {
        if after > before {
            self.pending_expiries
                .fetch_add(after - before, Ordering::Relaxed);
        } else if before > after {
            self.pending_expiries
                .fetch_sub(before - after, Ordering::Relaxed);
        }
    }

    // == Snapshot ==
    /// Copies the counters; `total_entries` is supplied by the caller.
    pub fn snapshot(&self, total_entries: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            reclaimed: self.reclaimed.load(Ordering::Relaxed),
            stale_records: self.stale_records.load(Ordering::Relaxed),
            pending_expiries: self.pending_expiries.load(Ordering::Relaxed),
            scheduler_launches: self.scheduler_launches.load(Ordering::Relaxed),
            total_entries,
        }
    }
}
