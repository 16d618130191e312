//! Censys Search v2 host connector.

use super::{build_client, health_from_probe, DEFAULT_TIMEOUT_SECS};
use crate::http::HttpClient;
use crate::secure_string::SecureString;
use crate::traits::{
    AuthConfig, Connector, ConnectorConfig, ConnectorError, ConnectorHealth, ConnectorResult,
    EnrichmentProvider, LookupKey, LookupKind,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{info, instrument};

/// Public Censys Search endpoint.
pub const DEFAULT_BASE_URL: &str = "https://search.censys.io";

/// Field name Censys results are stored under.
pub const PROVIDER_NAME: &str = "censys";

/// Censys connector configuration.
#[derive(Debug, Clone)]
pub struct CensysConfig {
    pub connector: ConnectorConfig,
    pub requests_per_minute: Option<u32>,
}

impl CensysConfig {
    /// Configuration for the public API using bearer-token auth.
    pub fn new(api_token: SecureString) -> Self {
        Self {
            connector: ConnectorConfig {
                name: PROVIDER_NAME.to_string(),
                base_url: DEFAULT_BASE_URL.to_string(),
                auth: AuthConfig::BearerToken { token: api_token },
                timeout_secs: DEFAULT_TIMEOUT_SECS,
                retries: 3,
                backoff_factor: 1.0,
                verify_tls: true,
                headers: HashMap::new(),
            },
            requests_per_minute: None,
        }
    }
}

/// Censys host lookups (`GET /api/v2/hosts/{ip}`).
pub struct CensysConnector {
    client: HttpClient,
}

impl CensysConnector {
    pub fn new(config: CensysConfig) -> ConnectorResult<Self> {
        let client = build_client(config.connector, config.requests_per_minute)?;
        info!(base_url = %client.config().base_url, "Censys connector initialized");
        Ok(Self { client })
    }

    pub fn with_client(client: HttpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Connector for CensysConnector {
    fn name(&self) -> &str {
        &self.client.config().name
    }

    async fn health_check(&self) -> ConnectorResult<ConnectorHealth> {
        Ok(health_from_probe(self.client.probe("/api/v1/account").await))
    }
}

#[async_trait]
impl EnrichmentProvider for CensysConnector {
    fn provider_name(&self) -> &str {
        PROVIDER_NAME
    }

    fn lookup_kind(&self) -> LookupKind {
        LookupKind::Ip
    }

    #[instrument(skip(self), fields(provider = PROVIDER_NAME, ip = %key))]
    async fn lookup(&self, key: &LookupKey) -> ConnectorResult<Value> {
        if key.kind() != LookupKind::Ip {
            return Err(ConnectorError::InvalidRequest(format!(
                "Censys cannot look up a {} key",
                key.kind()
            )));
        }
        let path = format!("/api/v2/hosts/{}", key.as_str());
        self.client.get_json(&path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockReply, MockTransport};
    use serde_json::json;
    use std::sync::Arc;

    fn connector(transport: Arc<MockTransport>) -> CensysConnector {
        let mut config = CensysConfig::new(SecureString::new("censys-token"));
        config.connector.backoff_factor = 0.0;
        CensysConnector::with_client(HttpClient::with_transport(config.connector, transport))
    }

    #[tokio::test]
    async fn test_host_lookup_uses_bearer_token() {
        let transport = Arc::new(MockTransport::new());
        transport
            .route(
                "https://search.censys.io/api/v2/hosts/1.1.1.1",
                vec![MockReply::json(200, json!({"result": {"ip": "1.1.1.1"}}))],
            )
            .await;
        let censys = connector(transport.clone());

        let key = LookupKey::parse_ip("1.1.1.1").unwrap();
        let result = censys.lookup(&key).await.unwrap();

        assert_eq!(result["result"]["ip"], "1.1.1.1");
        let requests = transport.requests().await;
        assert_eq!(
            requests[0].headers,
            vec![(
                "Authorization".to_string(),
                "Bearer censys-token".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_unauthorized_is_permanent() {
        let transport = Arc::new(MockTransport::new());
        transport
            .route(
                "https://search.censys.io/api/v2/hosts/1.1.1.1",
                vec![MockReply::status(401)],
            )
            .await;
        let censys = connector(transport.clone());

        let key = LookupKey::parse_ip("1.1.1.1").unwrap();
        let err = censys.lookup(&key).await.unwrap_err();

        assert!(matches!(err, ConnectorError::AuthenticationFailed(_)));
        assert_eq!(transport.request_count().await, 1);
    }

    #[tokio::test]
    async fn test_health_check_healthy() {
        let transport = Arc::new(MockTransport::new());
        transport
            .route(
                "https://search.censys.io/api/v1/account",
                vec![MockReply::json(200, json!({"login": "analyst"}))],
            )
            .await;
        let censys = connector(transport);

        assert_eq!(censys.health_check().await.unwrap(), ConnectorHealth::Healthy);
    }
}
