//! Error types for the cache and version guard
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for storage surfaces, the cache and the guard.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The store refused a write because it is out of space
    #[error("Storage quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The storage surface is missing, denied or failed to do I/O
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Logical key collides with the reserved cache namespace
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Payload could not be encoded to the entry wire format
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Background worker registry failure
    #[error("Worker registry error: {0}")]
    Worker(String),

    /// Named response cache registry failure
    #[error("Response cache error: {0}")]
    ResponseCache(String),
}

impl CacheError {
    /// Returns true for failures caused by the store running out of space.
    pub fn is_quota(&self) -> bool {
        matches!(self, CacheError::QuotaExceeded(_))
    }
}

// == Result Type Alias ==
/// Convenience Result type for the crate.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CacheError::QuotaExceeded("cache_big".to_string());
        assert_eq!(err.to_string(), "Storage quota exceeded: cache_big");
        assert!(err.is_quota());

        let err = CacheError::InvalidKey("cache_x".to_string());
        assert!(!err.is_quota());
    }

    #[test]
    fn test_serialization_error_from() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: CacheError = json_err.into();
        assert!(matches!(err, CacheError::Serialization(_)));
    }
}
