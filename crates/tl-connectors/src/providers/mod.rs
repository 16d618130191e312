//! Reputation provider connectors.

pub mod censys;
pub mod mock;
pub mod virustotal;

pub use censys::{CensysConfig, CensysConnector};
pub use mock::{MockBehavior, MockProvider};
pub use virustotal::{VirusTotalConfig, VirusTotalConnector, VirusTotalLookup};

use crate::http::{HttpClient, RateLimitConfig};
use crate::traits::{ConnectorHealth, ConnectorResult};

/// Default per-request timeout for provider APIs.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Builds the HTTP client for a provider, attaching a rate limiter when asked.
pub(crate) fn build_client(
    connector: crate::traits::ConnectorConfig,
    requests_per_minute: Option<u32>,
) -> ConnectorResult<HttpClient> {
    let client = HttpClient::new(connector)?;
    match requests_per_minute {
        Some(rpm) => client.with_rate_limit(RateLimitConfig {
            requests_per_minute: rpm,
            burst_size: 1,
        }),
        None => Ok(client),
    }
}

/// Interprets the status of a single health probe.
pub(crate) fn health_from_probe(result: ConnectorResult<u16>) -> ConnectorHealth {
    match result {
        Ok(200) => ConnectorHealth::Healthy,
        Ok(429) => ConnectorHealth::Degraded("Rate limited".to_string()),
        Ok(401) | Ok(403) => ConnectorHealth::Unhealthy("Credentials rejected".to_string()),
        Ok(status) => ConnectorHealth::Unhealthy(format!("Unexpected status: {}", status)),
        Err(e) => ConnectorHealth::Unhealthy(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::ConnectorError;

    #[test]
    fn test_health_from_probe() {
        assert_eq!(health_from_probe(Ok(200)), ConnectorHealth::Healthy);
        assert!(matches!(
            health_from_probe(Ok(429)),
            ConnectorHealth::Degraded(_)
        ));
        assert!(matches!(
            health_from_probe(Ok(401)),
            ConnectorHealth::Unhealthy(_)
        ));
        assert!(matches!(
            health_from_probe(Err(ConnectorError::Timeout("slow".into()))),
            ConnectorHealth::Unhealthy(_)
        ));
    }
}
