//! Cache abstraction for storing provider results.
//!
//! The [`Cache`] trait is object safe so the pipeline can hold an
//! `Arc<dyn Cache>` and tests can swap in their own backend. Single-flight
//! coalescing of concurrent misses lives one layer up in
//! [`crate::enrichment::ResultCache`].
//!
//! # Example
//!
//! ```ignore
//! use tl_core::cache::{Cache, MemoryCache};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! let cache = MemoryCache::new();
//! cache.set("virustotal:ip:8.8.8.8", &json!({"data": {}}), Duration::from_secs(60)).await?;
//! assert!(cache.exists("virustotal:ip:8.8.8.8").await?);
//! ```

mod error;
mod memory;
mod types;

pub use error::{CacheError, CacheResult};
pub use memory::MemoryCache;
pub use types::{CacheEntry, CacheStats};

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// A TTL cache of JSON values.
///
/// A TTL of `Duration::ZERO` means the entry never expires.
#[async_trait]
pub trait Cache: Send + Sync + 'static {
    /// Returns the value for `key` if present and not expired.
    async fn get(&self, key: &str) -> CacheResult<Option<Value>>;

    /// Like [`Cache::get`], but leaves the hit/miss statistics untouched.
    async fn peek(&self, key: &str) -> CacheResult<Option<Value>>;

    /// Stores `value` under `key`, replacing any previous entry.
    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> CacheResult<()>;

    /// Removes `key`; returns whether it existed.
    async fn delete(&self, key: &str) -> CacheResult<bool>;

    /// Checks if a key exists and hasn't expired.
    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// Drops every entry.
    async fn clear(&self) -> CacheResult<()>;

    fn stats(&self) -> CacheStats;
}
