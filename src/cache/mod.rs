//! Cache Module
//!
//! Provides the in-process cache: entries, the concurrent store, statistics
//! and the public [`Cache`] handle.

mod entry;
mod facade;
mod stats;
mod store;


// Re-export public types
pub use entry::{CacheEntry, Snapshot};
pub use facade::Cache;
pub use stats::CacheStats;
pub use store::ConcurrentStore;

pub(crate) use stats::StatsRecorder;
