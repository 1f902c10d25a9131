//! Mini TTL Cache - An in-process key-value cache with expiring entries
//!
//! Entries are either permanent or carry an expiry instant. Every read checks
//! expiry on its own, so visibility never depends on background work. A
//! single scheduler task per cache keeps a sorted chain of pending
//! expirations and removes expired entries from memory.

pub mod cache;
pub mod config;
pub mod error;
mod tasks;

pub use cache::{Cache, CacheEntry, CacheStats};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use tokio::time::Instant;
