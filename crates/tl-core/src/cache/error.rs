//! Cache error types.

use thiserror::Error;

/// Errors that can occur during cache operations.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// The cache backend could not be reached.
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),

    /// Failed to serialize or deserialize cache data.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Timed out waiting for a lock on the cache key.
    #[error("Lock timeout for key: {0}")]
    LockTimeout(String),
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_error_display() {
        let err = CacheError::LockTimeout("virustotal:ip:192.168.1.1".to_string());
        assert!(err.to_string().contains("virustotal:ip:192.168.1.1"));

        let err = CacheError::Serialization("invalid JSON".to_string());
        assert!(err.to_string().contains("invalid JSON"));
    }
}
