//! HTTP utilities for connectors.
//!
//! [`HttpClient`] wraps an [`HttpTransport`] with authentication, optional
//! client-side rate limiting and the retry policy every provider shares:
//! transient failures (429/500/502/503/504 or a transport error) are retried
//! with exponential backoff, anything else fails immediately.

use crate::traits::{ConnectorConfig, ConnectorError, ConnectorResult};
use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorRateLimiter,
};
use reqwest::{Client, Url};
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, warn};

/// Type alias for the rate limiter.
type RateLimiterType = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// HTTP statuses treated as transient.
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Returns true if a response with this status should be retried.
pub fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUSES.contains(&status)
}

/// Status and body of one HTTP exchange.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// A single HTTP GET, without retries.
///
/// Network failures must be reported as `Timeout`, `ConnectionFailed` or
/// `RequestFailed` so the retry loop can recognise them.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &Url, headers: &[(String, String)])
        -> ConnectorResult<TransportResponse>;
}

/// Production transport backed by `reqwest`.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Builds a reqwest client honouring the connector's timeout and TLS settings.
    pub fn new(config: &ConnectorConfig) -> ConnectorResult<Self> {
        let verify_tls = if config.verify_tls {
            true
        } else if cfg!(debug_assertions) {
            warn!(
                connector_name = %config.name,
                base_url = %config.base_url,
                "TLS certificate verification DISABLED in development mode"
            );
            false
        } else {
            warn!(
                connector_name = %config.name,
                "Ignoring request to disable TLS verification in a release build"
            );
            true
        };

        let mut headers = reqwest::header::HeaderMap::new();
        for (key, value) in &config.headers {
            if let (Ok(name), Ok(val)) = (
                reqwest::header::HeaderName::try_from(key.as_str()),
                reqwest::header::HeaderValue::try_from(value.as_str()),
            ) {
                headers.insert(name, val);
            }
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!verify_tls)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .default_headers(headers)
            .build()
            .map_err(|e| ConnectorError::ConfigError(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(
        &self,
        url: &Url,
        headers: &[(String, String)],
    ) -> ConnectorResult<TransportResponse> {
        let mut request = self.client.get(url.clone());
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(classify_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(classify_reqwest_error)?
            .to_vec();

        Ok(TransportResponse { status, body })
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> ConnectorError {
    if e.is_timeout() {
        ConnectorError::Timeout(e.to_string())
    } else if e.is_connect() {
        ConnectorError::ConnectionFailed(e.to_string())
    } else {
        ConnectorError::RequestFailed(e.to_string())
    }
}

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts.
    pub retries: u32,
    /// Seconds multiplied by `2^attempt` to get each delay.
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            backoff_factor: 1.0,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &ConnectorConfig) -> Self {
        Self {
            retries: config.retries,
            backoff_factor: config.backoff_factor,
        }
    }

    /// Delay after a failed attempt (0-indexed): `backoff_factor * 2^attempt` seconds.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let secs = self.backoff_factor.max(0.0) * 2f64.powi(attempt as i32);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

/// Client-side rate limit configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per minute.
    pub requests_per_minute: u32,
    /// Maximum burst size.
    pub burst_size: u32,
}

/// HTTP client with auth, retry and rate limiting.
pub struct HttpClient {
    transport: Arc<dyn HttpTransport>,
    config: ConnectorConfig,
    retry: RetryPolicy,
    rate_limiter: Option<Arc<RateLimiterType>>,
}

impl HttpClient {
    /// Creates a client that talks to the network through reqwest.
    pub fn new(config: ConnectorConfig) -> ConnectorResult<Self> {
        let transport = Arc::new(ReqwestTransport::new(&config)?);
        Ok(Self::with_transport(config, transport))
    }

    /// Creates a client on top of an existing transport.
    pub fn with_transport(config: ConnectorConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let retry = RetryPolicy::from_config(&config);
        Self {
            transport,
            config,
            retry,
            rate_limiter: None,
        }
    }

    /// Enables client-side rate limiting.
    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> ConnectorResult<Self> {
        let per_minute = NonZeroU32::new(rate_limit.requests_per_minute).ok_or_else(|| {
            ConnectorError::ConfigError("requests_per_minute must be greater than zero".into())
        })?;
        let quota = Quota::per_minute(per_minute)
            .allow_burst(NonZeroU32::new(rate_limit.burst_size).unwrap_or(NonZeroU32::MIN));
        self.rate_limiter = Some(Arc::new(GovernorRateLimiter::direct(quota)));
        Ok(self)
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Builds a URL from a path relative to the base URL.
    pub fn build_url(&self, path: &str) -> ConnectorResult<Url> {
        let base = self.config.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Url::parse(&format!("{}/{}", base, path))
            .map_err(|e| ConnectorError::ConfigError(format!("invalid URL: {}", e)))
    }

    /// GETs `path` and returns the parsed JSON body, retrying transient failures.
    pub async fn get_json(&self, path: &str) -> ConnectorResult<Value> {
        let url = self.build_url(path)?;
        self.execute_with_retry(&url).await
    }

    /// Like [`get_json`](Self::get_json) with percent-encoded query parameters.
    pub async fn get_json_with_query(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> ConnectorResult<Value> {
        let mut url = self.build_url(path)?;
        url.query_pairs_mut().extend_pairs(query);
        self.execute_with_retry(&url).await
    }

    /// Sends one GET without retries and returns the status code.
    pub async fn probe(&self, path: &str) -> ConnectorResult<u16> {
        let url = self.build_url(path)?;
        self.wait_for_rate_limit().await;
        let response = self.transport.get(&url, &self.request_headers()).await?;
        Ok(response.status)
    }

    fn request_headers(&self) -> Vec<(String, String)> {
        self.config.auth.header().into_iter().collect()
    }

    async fn wait_for_rate_limit(&self) {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }
    }

    async fn execute_with_retry(&self, url: &Url) -> ConnectorResult<Value> {
        let headers = self.request_headers();
        let connector = self.config.name.as_str();
        let mut last_error = None;

        for attempt in 0..self.retry.retries {
            self.wait_for_rate_limit().await;
            metrics::counter!(
                "tl_provider_attempts_total",
                "provider" => connector.to_string()
            )
            .increment(1);

            match self.transport.get(url, &headers).await {
                Ok(response) if response.status == 200 => {
                    debug!(connector, %url, "Fetched enrichment data");
                    return parse_json_body(&response.body);
                }
                Ok(response) if is_retryable_status(response.status) => {
                    warn!(
                        connector,
                        attempt = attempt + 1,
                        status = response.status,
                        %url,
                        "Transient error, retrying after backoff"
                    );
                    last_error = Some(ConnectorError::HttpStatus(response.status));
                }
                Ok(response) => {
                    error!(
                        connector,
                        status = response.status,
                        %url,
                        "Permanent error, not retrying"
                    );
                    return Err(ConnectorError::from_status(response.status));
                }
                Err(e) if e.is_transport() => {
                    warn!(connector, attempt = attempt + 1, %url, "Network error: {}", e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }

            sleep(self.retry.delay_for(attempt)).await;
        }

        let last_error = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempts were made".to_string());
        error!(
            connector,
            attempts = self.retry.retries,
            %url,
            "Giving up after exhausting retries: {}",
            last_error
        );
        metrics::counter!(
            "tl_provider_retries_exhausted_total",
            "provider" => connector.to_string()
        )
        .increment(1);

        Err(ConnectorError::RetriesExhausted {
            attempts: self.retry.retries,
            last_error,
        })
    }
}

fn parse_json_body(body: &[u8]) -> ConnectorResult<Value> {
    serde_json::from_slice(body).map_err(|e| {
        let preview: String = String::from_utf8_lossy(body).chars().take(200).collect();
        ConnectorError::InvalidResponse(format!("{} - Body: {}", e, preview))
    })
}
