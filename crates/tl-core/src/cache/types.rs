//! Cache types and structures.

use serde_json::Value;
use tokio::time::Instant;

/// Statistics for cache operations.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Current number of entries in the cache, expired ones included.
    pub size: u64,
    /// Cache hit rate (hits / (hits + misses)), 0.0 if no operations.
    pub hit_rate: f64,
}

impl CacheStats {
    pub fn new(hits: u64, misses: u64, size: u64) -> Self {
        let hit_rate = if hits + misses > 0 {
            hits as f64 / (hits + misses) as f64
        } else {
            0.0
        };

        Self {
            hits,
            misses,
            size,
            hit_rate,
        }
    }

    pub fn total_operations(&self) -> u64 {
        self.hits + self.misses
    }
}

/// A single cache entry with value and expiration.
///
/// Expiry uses the tokio clock so paused-time tests can step past a TTL.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Value,
    /// When this entry expires, or None for no expiration.
    pub expires_at: Option<Instant>,
}

impl CacheEntry {
    pub fn new(value: Value, expires_at: Option<Instant>) -> Self {
        Self { value, expires_at }
    }

    /// Creates a cache entry that never expires.
    pub fn permanent(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    /// Returns true if this entry has expired.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires) => Instant::now() >= expires,
            None => false,
        }
    }
}
