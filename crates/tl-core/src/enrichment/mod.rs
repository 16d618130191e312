//! Cached provider lookups.
//!
//! [`ResultCache`] implements the cache-through pattern with single-flight
//! coalescing: check cache, take a per-key lock, re-check, call the provider,
//! store the result. Terminal failures are stored as `{}` so a failing key is
//! not retried until its entry expires.
//!
//! # Cache Key Format
//!
//! `{provider}:{kind}:{key}`, for example `virustotal:ip:8.8.8.8`.

mod types;

pub use types::{EnrichmentResult, ResultCacheConfig, DEFAULT_CACHE_TTL_SECS};

use crate::cache::{Cache, CacheStats};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Duration;
use tl_connectors::{ConnectorResult, EnrichmentProvider, LookupKey, LookupKind};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

/// Builds the cache key for a provider result.
pub fn cache_key(provider: &str, key: &LookupKey) -> String {
    format!("{}:{}:{}", provider, key.kind(), key.as_str())
}

type KeyLocks = StdMutex<HashMap<String, Arc<Mutex<()>>>>;

fn lock_map(locks: &KeyLocks) -> MutexGuard<'_, HashMap<String, Arc<Mutex<()>>>> {
    locks.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Removes a key's lock entry when the fetching caller finishes, including
/// when its fetch panics or is cancelled.
struct KeyLockRelease<'a> {
    locks: &'a KeyLocks,
    key: &'a str,
}

impl Drop for KeyLockRelease<'_> {
    fn drop(&mut self) {
        lock_map(self.locks).remove(self.key);
    }
}

/// Shared result cache with per-key single-flight.
pub struct ResultCache {
    cache: Arc<dyn Cache>,
    config: ResultCacheConfig,
    key_locks: KeyLocks,
}

impl ResultCache {
    pub fn new(cache: Arc<dyn Cache>, config: ResultCacheConfig) -> Self {
        Self {
            cache,
            config,
            key_locks: StdMutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Number of keys with a fetch in progress.
    pub fn in_flight(&self) -> usize {
        lock_map(&self.key_locks).len()
    }

    fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        lock_map(&self.key_locks)
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn cached(&self, cache_key: &str) -> Option<EnrichmentResult> {
        match self.cache.get(cache_key).await {
            Ok(hit) => hit.map(EnrichmentResult::from),
            Err(e) => {
                warn!(key = %cache_key, error = %e, "Cache read failed, fetching directly");
                None
            }
        }
    }

    /// Returns the cached result for `(provider, key)`, fetching at most once
    /// per TTL window across all concurrent callers.
    ///
    /// A failed fetch resolves to `{}`, which is cached like any other result.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        provider: &str,
        key: &LookupKey,
        fetch_fn: F,
    ) -> EnrichmentResult
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = ConnectorResult<Value>> + Send,
    {
        let cache_key = cache_key(provider, key);

        if let Some(hit) = self.cached(&cache_key).await {
            debug!(key = %cache_key, "Cache hit");
            return hit;
        }

        let key_lock = self.key_lock(&cache_key);
        let _guard = key_lock.lock().await;
        let _release = KeyLockRelease {
            locks: &self.key_locks,
            key: &cache_key,
        };

        // Another caller may have filled the entry while we waited. Peek so
        // the miss above is not counted twice.
        if let Ok(Some(hit)) = self.cache.peek(&cache_key).await {
            return EnrichmentResult::from(hit);
        }

        let result = match fetch_fn().await {
            Ok(body) => EnrichmentResult::from(body),
            Err(e) => {
                warn!(provider, key = %key, error = %e, "Lookup failed, recording empty result");
                EnrichmentResult::empty()
            }
        };

        if let Err(e) = self
            .cache
            .set(&cache_key, result.as_value(), self.config.ttl)
            .await
        {
            warn!(key = %cache_key, error = %e, "Failed to cache result");
        }

        result
    }
}

/// A provider paired with the shared result cache.
#[derive(Clone)]
pub struct CachedProvider {
    provider: Arc<dyn EnrichmentProvider>,
    cache: Arc<ResultCache>,
}

impl CachedProvider {
    pub fn new(provider: Arc<dyn EnrichmentProvider>, cache: Arc<ResultCache>) -> Self {
        Self { provider, cache }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    pub fn lookup_kind(&self) -> LookupKind {
        self.provider.lookup_kind()
    }

    /// Resolves `key` through the cache. Never fails; errors become `{}`.
    #[instrument(skip(self), fields(provider = %self.provider.provider_name()))]
    pub async fn resolve(&self, key: &LookupKey) -> EnrichmentResult {
        let provider = Arc::clone(&self.provider);
        let label = provider.provider_name().to_string();
        self.cache
            .get_or_fetch(self.provider.provider_name(), key, || async move {
                metrics::counter!("tl_provider_requests_total", "provider" => label).increment(1);
                provider.lookup(key).await
            })
            .await
    }
}
