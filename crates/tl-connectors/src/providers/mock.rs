//! Mock enrichment provider for testing.
//!
//! Returns preset results per key, supports failure injection and latency,
//! and counts calls per key so caching behaviour can be asserted.

use crate::traits::{
    Connector, ConnectorError, ConnectorHealth, ConnectorResult, EnrichmentProvider, LookupKey,
    LookupKind,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// Behavior configuration for failure injection.
#[derive(Debug, Clone, Default)]
pub enum MockBehavior {
    /// Return results normally.
    #[default]
    Normal,
    /// Return an error for specific keys.
    FailOn {
        keys: Vec<String>,
        error: ConnectorError,
    },
    /// Sleep before answering.
    WithLatency(Duration),
    /// Always fail.
    AlwaysFail(ConnectorError),
}

/// Configurable in-memory provider.
pub struct MockProvider {
    name: String,
    kind: LookupKind,
    results: RwLock<HashMap<String, Value>>,
    behavior: RwLock<MockBehavior>,
    call_count: AtomicU64,
    calls_per_key: RwLock<HashMap<String, u64>>,
    history: RwLock<Vec<String>>,
}

impl MockProvider {
    /// Creates a mock answering keys of `kind` under provider name `name`.
    pub fn new(name: &str, kind: LookupKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            results: RwLock::new(HashMap::new()),
            behavior: RwLock::new(MockBehavior::Normal),
            call_count: AtomicU64::new(0),
            calls_per_key: RwLock::new(HashMap::new()),
            history: RwLock::new(Vec::new()),
        }
    }

    /// Presets the result returned for `key`.
    pub async fn add_result(&self, key: &str, result: Value) {
        self.results.write().await.insert(key.to_string(), result);
    }

    pub async fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.write().await = behavior;
    }

    /// Total lookups made.
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Lookups made for one key.
    pub async fn calls_for(&self, key: &str) -> u64 {
        self.calls_per_key
            .read()
            .await
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    /// Keys looked up, in call order.
    pub async fn history(&self) -> Vec<String> {
        self.history.read().await.clone()
    }

    pub fn reset_counts(&self) {
        self.call_count.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn health_check(&self) -> ConnectorResult<ConnectorHealth> {
        match &*self.behavior.read().await {
            MockBehavior::AlwaysFail(e) => Ok(ConnectorHealth::Unhealthy(e.to_string())),
            _ => Ok(ConnectorHealth::Healthy),
        }
    }
}

#[async_trait]
impl EnrichmentProvider for MockProvider {
    fn provider_name(&self) -> &str {
        &self.name
    }

    fn lookup_kind(&self) -> LookupKind {
        self.kind
    }

    async fn lookup(&self, key: &LookupKey) -> ConnectorResult<Value> {
        let value = key.as_str().to_string();
        self.call_count.fetch_add(1, Ordering::SeqCst);
        *self
            .calls_per_key
            .write()
            .await
            .entry(value.clone())
            .or_insert(0) += 1;
        self.history.write().await.push(value.clone());

        let behavior = self.behavior.read().await.clone();
        match behavior {
            MockBehavior::Normal => {}
            MockBehavior::WithLatency(delay) => tokio::time::sleep(delay).await,
            MockBehavior::AlwaysFail(e) => return Err(e),
            MockBehavior::FailOn { keys, error } => {
                if keys.contains(&value) {
                    return Err(error);
                }
            }
        }

        let preset = self.results.read().await.get(&value).cloned();
        Ok(preset.unwrap_or_else(|| json!({ "key": value, "source": self.name })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_preset_and_default_results() {
        let mock = MockProvider::new("virustotal", LookupKind::Ip);
        mock.add_result("8.8.8.8", json!({"reputation": 0})).await;

        let preset = mock
            .lookup(&LookupKey::parse_ip("8.8.8.8").unwrap())
            .await
            .unwrap();
        assert_eq!(preset, json!({"reputation": 0}));

        let fallback = mock
            .lookup(&LookupKey::parse_ip("1.1.1.1").unwrap())
            .await
            .unwrap();
        assert_eq!(fallback["key"], "1.1.1.1");

        assert_eq!(mock.call_count(), 2);
        assert_eq!(mock.calls_for("8.8.8.8").await, 1);
        assert_eq!(mock.history().await, vec!["8.8.8.8", "1.1.1.1"]);
    }

    #[tokio::test]
    async fn test_fail_on_specific_key() {
        let mock = MockProvider::new("censys", LookupKind::Ip);
        mock.set_behavior(MockBehavior::FailOn {
            keys: vec!["10.0.0.1".to_string()],
            error: ConnectorError::HttpStatus(500),
        })
        .await;

        let err = mock
            .lookup(&LookupKey::parse_ip("10.0.0.1").unwrap())
            .await
            .unwrap_err();
        assert_eq!(err, ConnectorError::HttpStatus(500));
        assert!(mock
            .lookup(&LookupKey::parse_ip("10.0.0.2").unwrap())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_always_fail_is_unhealthy() {
        let mock = MockProvider::new("censys", LookupKind::Ip);
        mock.set_behavior(MockBehavior::AlwaysFail(ConnectorError::Timeout(
            "down".into(),
        )))
        .await;

        assert!(matches!(
            mock.health_check().await.unwrap(),
            ConnectorHealth::Unhealthy(_)
        ));
    }
}
