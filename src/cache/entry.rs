//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with optional expiry.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::time::Instant;

/// Source of entry stamps, unique for the lifetime of the process.
static NEXT_STAMP: AtomicU64 = AtomicU64::new(1);

// == Cache Entry ==
/// Represents a single cache entry with value and expiry metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Expiration instant, None = permanent
    pub expiry: Option<Instant>,
    /// Identifies this particular write of the key
    stamp: u64,
}

impl<V> CacheEntry<V> {
    // == Constructors ==
    /// Creates a permanent entry that never expires.
    pub fn permanent(value: V) -> Self {
        Self::new(value, None)
    }

    /// Creates an entry that expires at `expiry`.
    pub fn expiring(value: V, expiry: Instant) -> Self {
        Self::new(value, Some(expiry))
    }

    fn new(value: V, expiry: Option<Instant>) -> Self {
        Self {
            value,
            expiry,
            stamp: NEXT_STAMP.fetch_add(1, Ordering::Relaxed),
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now`.
    ///
    /// Boundary condition: an entry is expired once `now` reaches the expiry
    /// instant. Permanent entries never expire.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        match self.expiry {
            Some(expiry) => now >= expiry,
            None => false,
        }
    }

    /// Checks if the entry has expired against the current time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    // == Snapshot ==
    /// Captures the identity of a timed entry for a later conditional delete.
    ///
    /// Returns None for permanent entries, which are never scheduled.
    pub fn snapshot(&self) -> Option<Snapshot> {
        self.expiry.map(|expiry| Snapshot {
            expiry,
            stamp: self.stamp,
        })
    }

    /// Returns true if this is exactly the write captured by `snapshot`.
    pub fn matches(&self, snapshot: &Snapshot) -> bool {
        self.stamp == snapshot.stamp && self.expiry == Some(snapshot.expiry)
    }
}

// == Snapshot ==
/// Identity of a timed write at the moment it was scheduled for expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// Expiry instant of the write
    pub expiry: Instant,
    stamp: u64,
}
