//! Error types for the cache
//!
//! Reads, writes and deletes never fail: absence is reported as `None` and
//! writes after `close()` are dropped silently. Errors only arise while
//! constructing a cache.

use thiserror::Error;

// == Cache Error Enum ==
/// Errors raised while building a [`Cache`](crate::Cache).
#[derive(Error, Debug)]
pub enum CacheError {
    /// Configuration values that cannot be used
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The cache was built outside a Tokio runtime
    #[error("No Tokio runtime: {0}")]
    NoRuntime(String),
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CacheError::InvalidConfig("queue_capacity must be at least 1".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: queue_capacity must be at least 1"
        );

        let err = CacheError::NoRuntime("no reactor running".to_string());
        assert!(err.to_string().starts_with("No Tokio runtime"));
    }
}
