//! # tl-connectors
//!
//! HTTP plumbing and reputation provider connectors for ThreatLens.
//!
//! This crate provides the provider trait, a retrying HTTP client with
//! exponential backoff, and the VirusTotal and Censys implementations.

pub mod http;
pub mod providers;
pub mod secure_string;
pub mod testing;
pub mod traits;

pub use http::{
    HttpClient, HttpTransport, RateLimitConfig, ReqwestTransport, RetryPolicy, TransportResponse,
};
pub use providers::{
    CensysConfig, CensysConnector, MockBehavior, MockProvider, VirusTotalConfig,
    VirusTotalConnector, VirusTotalLookup,
};
pub use secure_string::SecureString;
pub use traits::{
    AuthConfig, Connector, ConnectorConfig, ConnectorError, ConnectorHealth, ConnectorResult,
    EnrichmentProvider, LookupKey, LookupKind,
};
