//! Connector trait definitions for ThreatLens.
//!
//! Every reputation provider implements [`EnrichmentProvider`], which gives
//! the pipeline a uniform way to look up one [`LookupKey`] and get back the
//! provider's raw JSON response.

use crate::secure_string::SecureString;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use thiserror::Error;

/// Errors that can occur in connectors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConnectorError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unexpected HTTP status {0}")]
    HttpStatus(u16),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConnectorError {
    /// Maps a non-success, non-retryable HTTP status to an error.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => ConnectorError::AuthenticationFailed("Unauthorized".into()),
            403 => ConnectorError::AuthorizationDenied("Forbidden".into()),
            404 => ConnectorError::NotFound("Resource not found".into()),
            other => ConnectorError::HttpStatus(other),
        }
    }

    /// Returns true for network-level failures that are worth retrying.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ConnectorError::ConnectionFailed(_)
                | ConnectorError::RequestFailed(_)
                | ConnectorError::Timeout(_)
        )
    }
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Health status of a connector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorHealth {
    /// Connector is healthy and operational.
    Healthy,
    /// Connector answers but is throttled or otherwise limited.
    Degraded(String),
    /// Connector is not usable.
    Unhealthy(String),
}

/// Configuration for a connector.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectorConfig {
    /// Connector name, used in logs and metrics.
    pub name: String,
    /// Base URL for the API.
    pub base_url: String,
    /// Authentication configuration.
    pub auth: AuthConfig,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Total number of attempts per lookup.
    pub retries: u32,
    /// Backoff multiplier in seconds; attempt `n` sleeps `backoff_factor * 2^n`.
    pub backoff_factor: f64,
    /// Whether to verify TLS certificates.
    pub verify_tls: bool,
    /// Additional headers to include.
    pub headers: HashMap<String, String>,
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    /// No authentication.
    None,
    /// API key sent in a named header (VirusTotal uses `x-apikey`).
    ApiKey {
        key: SecureString,
        header_name: String,
    },
    /// `Authorization: Bearer <token>`.
    BearerToken { token: SecureString },
}

impl AuthConfig {
    /// Returns the header this auth scheme adds to every request.
    pub fn header(&self) -> Option<(String, String)> {
        match self {
            AuthConfig::None => None,
            AuthConfig::ApiKey { key, header_name } => {
                Some((header_name.clone(), key.expose_secret().to_string()))
            }
            AuthConfig::BearerToken { token } => Some((
                "Authorization".to_string(),
                format!("Bearer {}", token.expose_secret()),
            )),
        }
    }
}

/// What a lookup key identifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupKind {
    /// An IPv4 or IPv6 address.
    Ip,
    /// A raw user-agent string.
    UserAgent,
}

impl LookupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LookupKind::Ip => "ip",
            LookupKind::UserAgent => "user_agent",
        }
    }
}

impl fmt::Display for LookupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized identifier used both as the provider query and the cache key.
///
/// A `LookupKey` is never empty. IP keys are stored in canonical form, so
/// `"::FFFF:1.2.3.4"`-style spellings of the same address collapse together.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LookupKey {
    kind: LookupKind,
    value: String,
}

impl LookupKey {
    /// Builds a key from a parsed IP address.
    pub fn ip(addr: IpAddr) -> Self {
        Self {
            kind: LookupKind::Ip,
            value: addr.to_string(),
        }
    }

    /// Parses an IP address string; returns `None` if it is not an address.
    pub fn parse_ip(raw: &str) -> Option<Self> {
        raw.trim().parse::<IpAddr>().ok().map(Self::ip)
    }

    /// Builds a user-agent key; returns `None` for blank input.
    pub fn user_agent(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self {
            kind: LookupKind::UserAgent,
            value: trimmed.to_string(),
        })
    }

    pub fn kind(&self) -> LookupKind {
        self.kind
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Base trait for all connectors.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Returns the connector name.
    fn name(&self) -> &str;

    /// Checks whether the remote API is reachable with the configured credentials.
    async fn health_check(&self) -> ConnectorResult<ConnectorHealth>;
}

/// A reputation/intelligence API that can enrich one lookup key.
#[async_trait]
pub trait EnrichmentProvider: Connector {
    /// Field name the result is stored under in an enriched record
    /// (for example `"virustotal"` or `"censys"`).
    fn provider_name(&self) -> &str;

    /// The kind of key this provider understands.
    fn lookup_kind(&self) -> LookupKind;

    /// Looks up one key and returns the provider's JSON body unmodified.
    async fn lookup(&self, key: &LookupKey) -> ConnectorResult<serde_json::Value>;
}
