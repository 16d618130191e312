//! In-process cache backed by a `HashMap`.

use super::{Cache, CacheEntry, CacheResult, CacheStats};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

/// An in-memory TTL cache living for the lifetime of the process.
///
/// Entries are evicted lazily on TTL only; there is no capacity bound.
/// Call [`MemoryCache::cleanup_expired`] to reclaim memory from stale keys.
#[derive(Debug, Default)]
pub struct MemoryCache {
    data: RwLock<HashMap<String, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes expired entries and returns how many were dropped.
    pub async fn cleanup_expired(&self) -> usize {
        let mut data = self.data.write().await;
        let before = data.len();
        data.retain(|_, entry| !entry.is_expired());
        let removed = before - data.len();
        if removed > 0 {
            debug!(removed, "Removed expired cache entries");
        }
        removed
    }

    /// Resets the statistics counters.
    pub fn reset_stats(&self) {
        self.hits.store(0, Ordering::SeqCst);
        self.misses.store(0, Ordering::SeqCst);
    }

    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::SeqCst);
        metrics::counter!("tl_cache_hits_total").increment(1);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::SeqCst);
        metrics::counter!("tl_cache_misses_total").increment(1);
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<Value>> {
        let data = self.data.read().await;

        match data.get(key) {
            Some(entry) if !entry.is_expired() => {
                self.record_hit();
                Ok(Some(entry.value.clone()))
            }
            _ => {
                self.record_miss();
                Ok(None)
            }
        }
    }

    async fn peek(&self, key: &str) -> CacheResult<Option<Value>> {
        let data = self.data.read().await;
        Ok(data
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> CacheResult<()> {
        // A TTL past the clock's range is treated like no expiry.
        let expires_at = if ttl.is_zero() {
            None
        } else {
            Instant::now().checked_add(ttl)
        };

        let mut data = self.data.write().await;
        data.insert(key.to_string(), CacheEntry::new(value.clone(), expires_at));
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let mut data = self.data.write().await;
        Ok(data.remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let data = self.data.read().await;
        Ok(data.get(key).is_some_and(|entry| !entry.is_expired()))
    }

    async fn clear(&self) -> CacheResult<()> {
        self.data.write().await.clear();
        Ok(())
    }

    fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::SeqCst);
        let misses = self.misses.load(Ordering::SeqCst);

        // Best effort: a writer holding the lock reports size 0.
        let size = match self.data.try_read() {
            Ok(data) => data.len() as u64,
            Err(_) => 0,
        };

        CacheStats::new(hits, misses, size)
    }
}
