//! VirusTotal API v3 connector.
//!
//! Two lookups are supported: IP address reports
//! (`/api/v3/ip_addresses/{ip}`) and intelligence search for raw user-agent
//! strings (`/api/v3/search?query={ua}`). Both authenticate with the
//! `x-apikey` header and return the response body untouched.

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

/// Public VirusTotal endpoint.
pub const DEFAULT_BASE_URL: &str = "https://www.virustotal.com";

/// Field name VirusTotal results are stored under.
pub const PROVIDER_NAME: &str = "virustotal";

/// VirusTotal connector configuration.
#[derive(Debug, Clone)]
pub struct VirusTotalConfig {
    /// Base connector configuration.
    pub connector: ConnectorConfig,
    /// Optional client-side limit (the public API allows 4 req/min).
    pub requests_per_minute: Option<u32>,
}

impl VirusTotalConfig {
    /// Configuration for the public API with default retry settings.
    pub fn new(api_key: SecureString) -> Self {
        Self {
            connector: ConnectorConfig {
                name: PROVIDER_NAME.to_string(),
                base_url: DEFAULT_BASE_URL.to_string(),
                auth: AuthConfig::ApiKey {
                    key: api_key,
                    header_name: "x-apikey".to_string(),
                },
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

/// Which VirusTotal endpoint a connector queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VirusTotalLookup {
    /// `GET /api/v3/ip_addresses/{ip}`
    IpAddress,
    /// `GET /api/v3/search?query={user_agent}`
    UserAgentSearch,
}

/// VirusTotal reputation connector.
pub struct VirusTotalConnector {
    client: HttpClient,
    lookup: VirusTotalLookup,
}

impl VirusTotalConnector {
    /// Creates a connector for IP address reports.
    pub fn ip_addresses(config: VirusTotalConfig) -> ConnectorResult<Self> {
        Self::new(config, VirusTotalLookup::IpAddress)
    }

    /// Creates a connector for user-agent searches.
    pub fn user_agent_search(config: VirusTotalConfig) -> ConnectorResult<Self> {
        Self::new(config, VirusTotalLookup::UserAgentSearch)
    }

    fn new(config: VirusTotalConfig, lookup: VirusTotalLookup) -> ConnectorResult<Self> {
        let client = build_client(config.connector, config.requests_per_minute)?;
        info!(
            lookup = ?lookup,
            base_url = %client.config().base_url,
            "VirusTotal connector initialized"
        );
        Ok(Self::with_client(client, lookup))
    }

    /// Wraps a prepared client (used with a mock transport in tests).
    pub fn with_client(client: HttpClient, lookup: VirusTotalLookup) -> Self {
        Self { client, lookup }
    }

    pub fn lookup_mode(&self) -> VirusTotalLookup {
        self.lookup
    }
}

#[async_trait]
impl Connector for VirusTotalConnector {
    fn name(&self) -> &str {
        &self.client.config().name
    }

    async fn health_check(&self) -> ConnectorResult<ConnectorHealth> {
        Ok(health_from_probe(
            self.client.probe("/api/v3/users/current").await,
        ))
    }
}

#[async_trait]
impl EnrichmentProvider for VirusTotalConnector {
    fn provider_name(&self) -> &str {
        PROVIDER_NAME
    }

    fn lookup_kind(&self) -> LookupKind {
        match self.lookup {
            VirusTotalLookup::IpAddress => LookupKind::Ip,
            VirusTotalLookup::UserAgentSearch => LookupKind::UserAgent,
        }
    }

    #[instrument(skip(self), fields(provider = PROVIDER_NAME, key = %key))]
    async fn lookup(&self, key: &LookupKey) -> ConnectorResult<Value> {
        if key.kind() != self.lookup_kind() {
            return Err(ConnectorError::InvalidRequest(format!(
                "VirusTotal {:?} lookup cannot handle a {} key",
                self.lookup,
                key.kind()
            )));
        }

        match self.lookup {
            VirusTotalLookup::IpAddress => {
                let path = format!("/api/v3/ip_addresses/{}", key.as_str());
                self.client.get_json(&path).await
            }
            VirusTotalLookup::UserAgentSearch => {
                self.client
                    .get_json_with_query("/api/v3/search", &[("query", key.as_str())])
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockReply, MockTransport};
    use serde_json::json;
    use std::sync::Arc;

    fn connector(transport: Arc<MockTransport>, lookup: VirusTotalLookup) -> VirusTotalConnector {
        let config = VirusTotalConfig::new(SecureString::new("vt-key"));
        let client = HttpClient::with_transport(config.connector, transport);
        VirusTotalConnector::with_client(client, lookup)
    }

    #[test]
    fn test_config_defaults() {
        let config = VirusTotalConfig::new(SecureString::new("k"));
        assert_eq!(config.connector.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.connector.retries, 3);
        assert_eq!(config.connector.backoff_factor, 1.0);
        assert!(config.requests_per_minute.is_none());
    }

    #[tokio::test]
    async fn test_ip_lookup_hits_ip_endpoint_with_api_key() {
        let transport = Arc::new(MockTransport::new());
        transport
            .route(
                "https://www.virustotal.com/api/v3/ip_addresses/8.8.8.8",
                vec![MockReply::json(200, json!({"data": {"id": "8.8.8.8"}}))],
            )
            .await;
        let vt = connector(transport.clone(), VirusTotalLookup::IpAddress);

        let key = LookupKey::parse_ip("8.8.8.8").unwrap();
        let result = vt.lookup(&key).await.unwrap();

        assert_eq!(result, json!({"data": {"id": "8.8.8.8"}}));
        let requests = transport.requests().await;
        assert_eq!(
            requests[0].headers,
            vec![("x-apikey".to_string(), "vt-key".to_string())]
        );
    }

    #[tokio::test]
    async fn test_user_agent_search_encodes_query() {
        let transport = Arc::new(MockTransport::new());
        let url = "https://www.virustotal.com/api/v3/search?query=Mozilla%2F5.0";
        transport
            .route(url, vec![MockReply::json(200, json!({"data": []}))])
            .await;
        let vt = connector(transport.clone(), VirusTotalLookup::UserAgentSearch);

        let key = LookupKey::user_agent("Mozilla/5.0").unwrap();
        let result = vt.lookup(&key).await.unwrap();

        assert_eq!(result, json!({"data": []}));
        assert_eq!(transport.requests_to(url).await, 1);
        assert_eq!(vt.lookup_kind(), LookupKind::UserAgent);
    }

    #[tokio::test]
    async fn test_kind_mismatch_is_rejected_without_request() {
        let transport = Arc::new(MockTransport::new());
        let vt = connector(transport.clone(), VirusTotalLookup::IpAddress);

        let key = LookupKey::user_agent("curl/8.0").unwrap();
        let err = vt.lookup(&key).await.unwrap_err();

        assert!(matches!(err, ConnectorError::InvalidRequest(_)));
        assert_eq!(transport.request_count().await, 0);
    }

    #[tokio::test]
    async fn test_health_check_reports_rejected_key() {
        let transport = Arc::new(MockTransport::new());
        transport
            .route(
                "https://www.virustotal.com/api/v3/users/current",
                vec![MockReply::status(401)],
            )
            .await;
        let vt = connector(transport, VirusTotalLookup::IpAddress);

        let health = vt.health_check().await.unwrap();
        assert!(matches!(health, ConnectorHealth::Unhealthy(_)));
    }
}
