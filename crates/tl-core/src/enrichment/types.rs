//! Types for cached enrichment.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Default TTL for provider results (1 hour).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

/// One provider's answer for one key.
///
/// Holds the provider's full JSON body, or the empty object `{}` when the
/// lookup failed for good or was not applicable. Never partially populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnrichmentResult(Value);

impl EnrichmentResult {
    /// The `{}` result.
    pub fn empty() -> Self {
        Self(Value::Object(Map::new()))
    }

    /// True for `{}` (and for `null`, which a cache backend may hand back).
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            Value::Object(map) => map.is_empty(),
            Value::Null => true,
            _ => false,
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl Default for EnrichmentResult {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Value> for EnrichmentResult {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Configuration for the result cache.
#[derive(Debug, Clone)]
pub struct ResultCacheConfig {
    /// How long a result stays fresh. `Duration::ZERO` disables expiry.
    pub ttl: Duration,
}

impl Default for ResultCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_result() {
        let empty = EnrichmentResult::empty();
        assert!(empty.is_empty());
        assert_eq!(serde_json::to_string(&empty).unwrap(), "{}");
        assert!(!EnrichmentResult::from(json!({"data": 1})).is_empty());
    }

    #[test]
    fn test_serializes_transparently() {
        let result = EnrichmentResult::from(json!({"key": "val"}));
        assert_eq!(serde_json::to_value(&result).unwrap(), json!({"key": "val"}));
    }

    #[test]
    fn test_default_ttl() {
        assert_eq!(ResultCacheConfig::default().ttl, Duration::from_secs(3600));
    }
}
