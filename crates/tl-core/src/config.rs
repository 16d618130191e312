//! Pipeline configuration and provider credentials.
//!
//! The JSON config file carries one block per provider plus an optional
//! `pipeline` block:
//!
//! ```json
//! {
//!   "virustotal": { "api_key": "..." },
//!   "censys": { "api_token": "..." },
//!   "pipeline": { "max_concurrency": 32, "cache_ttl_secs": 3600 }
//! }
//! ```

use crate::record::RecordKind;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tl_connectors::{
    CensysConfig, CensysConnector, EnrichmentProvider, SecureString, VirusTotalConfig,
    VirusTotalConnector,
};
use tracing::info;

/// Errors raised while loading or validating configuration. Always fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Missing configuration value: {0}")]
    Missing(String),

    #[error("Invalid configuration value: {0}")]
    Invalid(String),
}

fn default_max_concurrency() -> usize {
    32
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

fn default_retries() -> u32 {
    3
}

fn default_backoff_factor() -> f64 {
    1.0
}

fn default_request_timeout_secs() -> u64 {
    10
}

/// Tuning for one pipeline run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Upper bound on records processed at once.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Result cache TTL; 0 disables expiry.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Total attempts per provider lookup.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Backoff multiplier in seconds.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Optional client-side rate limit applied to each provider.
    #[serde(default)]
    pub requests_per_minute: Option<u32>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            cache_ttl_secs: default_cache_ttl_secs(),
            retries: default_retries(),
            backoff_factor: default_backoff_factor(),
            request_timeout_secs: default_request_timeout_secs(),
            requests_per_minute: None,
        }
    }
}

impl PipelineConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.max_concurrency must be at least 1".into(),
            ));
        }
        if self.retries == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.retries must be at least 1".into(),
            ));
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 0.0 {
            return Err(ConfigError::Invalid(
                "pipeline.backoff_factor must be a non-negative number".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.request_timeout_secs must be at least 1".into(),
            ));
        }
        if self.requests_per_minute == Some(0) {
            return Err(ConfigError::Invalid(
                "pipeline.requests_per_minute must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// VirusTotal credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct VirusTotalCredentials {
    pub api_key: SecureString,
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Censys credentials (Search API v2 token).
#[derive(Debug, Clone, Deserialize)]
pub struct CensysCredentials {
    pub api_token: SecureString,
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Credentials for every provider, built once and injected into the pipeline.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderCredentials {
    #[serde(default)]
    pub virustotal: Option<VirusTotalCredentials>,
    #[serde(default)]
    pub censys: Option<CensysCredentials>,
}

impl ProviderCredentials {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.virustotal.is_none() && self.censys.is_none() {
            return Err(ConfigError::Missing(
                "at least one provider (virustotal or censys) must be configured".into(),
            ));
        }
        if let Some(vt) = &self.virustotal {
            if vt.api_key.is_empty() {
                return Err(ConfigError::Missing("virustotal.api_key".into()));
            }
        }
        if let Some(censys) = &self.censys {
            if censys.api_token.is_empty() {
                return Err(ConfigError::Missing("censys.api_token".into()));
            }
        }
        Ok(())
    }

    /// Names of the providers configured for `kind`, in output order.
    pub fn provider_names(&self, kind: RecordKind) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.virustotal.is_some() {
            names.push(tl_connectors::providers::virustotal::PROVIDER_NAME);
        }
        if kind == RecordKind::Event && self.censys.is_some() {
            names.push(tl_connectors::providers::censys::PROVIDER_NAME);
        }
        names
    }

    /// Builds the live connectors used for records of `kind`.
    ///
    /// Events are looked up by IP on VirusTotal and Censys; user agents are
    /// searched on VirusTotal.
    pub fn build_providers(
        &self,
        kind: RecordKind,
        pipeline: &PipelineConfig,
    ) -> Result<Vec<Arc<dyn EnrichmentProvider>>, ConfigError> {
        let mut providers: Vec<Arc<dyn EnrichmentProvider>> = Vec::new();

        if let Some(vt) = &self.virustotal {
            let mut config = VirusTotalConfig::new(vt.api_key.clone());
            if let Some(base_url) = &vt.base_url {
                config.connector.base_url = base_url.clone();
            }
            apply_pipeline(&mut config.connector, pipeline);
            config.requests_per_minute = pipeline.requests_per_minute;

            let connector = match kind {
                RecordKind::Event => VirusTotalConnector::ip_addresses(config),
                RecordKind::UserAgent => VirusTotalConnector::user_agent_search(config),
            }
            .map_err(|e| ConfigError::Invalid(format!("virustotal: {}", e)))?;
            providers.push(Arc::new(connector));
        }

        if let (RecordKind::Event, Some(censys)) = (kind, &self.censys) {
            let mut config = CensysConfig::new(censys.api_token.clone());
            if let Some(base_url) = &censys.base_url {
                config.connector.base_url = base_url.clone();
            }
            apply_pipeline(&mut config.connector, pipeline);
            config.requests_per_minute = pipeline.requests_per_minute;

            let connector = CensysConnector::new(config)
                .map_err(|e| ConfigError::Invalid(format!("censys: {}", e)))?;
            providers.push(Arc::new(connector));
        }

        if providers.is_empty() {
            return Err(ConfigError::Missing(format!(
                "no configured provider can enrich {:?} records",
                kind
            )));
        }

        info!(
            kind = ?kind,
            providers = ?providers.iter().map(|p| p.provider_name()).collect::<Vec<_>>(),
            "Providers configured"
        );
        Ok(providers)
    }
}

fn apply_pipeline(connector: &mut tl_connectors::ConnectorConfig, pipeline: &PipelineConfig) {
    connector.retries = pipeline.retries;
    connector.backoff_factor = pipeline.backoff_factor;
    connector.timeout_secs = pipeline.request_timeout_secs;
}

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(flatten)]
    pub credentials: ProviderCredentials,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    /// Loads and validates configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_json_str(&contents)?;
        info!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Parses and validates configuration from a JSON string.
    pub fn from_json_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.credentials.validate()?;
        self.pipeline.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_full_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "virustotal": {{"api_key": "vt-key"}},
                "censys": {{"api_token": "censys-token", "base_url": "https://censys.internal"}},
                "pipeline": {{"max_concurrency": 8, "retries": 5}}
            }}"#
        )
        .unwrap();

        let config = AppConfig::load(file.path()).unwrap();

        let vt = config.credentials.virustotal.as_ref().unwrap();
        assert_eq!(vt.api_key.expose_secret(), "vt-key");
        assert!(vt.base_url.is_none());
        let censys = config.credentials.censys.as_ref().unwrap();
        assert_eq!(censys.base_url.as_deref(), Some("https://censys.internal"));
        assert_eq!(config.pipeline.max_concurrency, 8);
        assert_eq!(config.pipeline.retries, 5);
        assert_eq!(config.pipeline.cache_ttl_secs, 3600);
        assert_eq!(config.pipeline.backoff_factor, 1.0);
    }

    #[test]
    fn test_pipeline_defaults() {
        let config = AppConfig::from_json_str(r#"{"virustotal": {"api_key": "k"}}"#).unwrap();
        assert_eq!(config.pipeline, PipelineConfig::default());
        assert_eq!(config.pipeline.max_concurrency, 32);
        assert_eq!(config.pipeline.cache_ttl(), Duration::from_secs(3600));
    }

    #[test]
    fn test_missing_file_is_error() {
        let err = AppConfig::load(Path::new("/nonexistent/threatlens.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_malformed_json_is_error() {
        let err = AppConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_api_key_is_error() {
        let err = AppConfig::from_json_str(r#"{"virustotal": {}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let err = AppConfig::from_json_str(r#"{"virustotal": {"api_key": "  "}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn test_no_provider_is_error() {
        let err = AppConfig::from_json_str("{}").unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn test_invalid_pipeline_values() {
        let err = AppConfig::from_json_str(
            r#"{"censys": {"api_token": "t"}, "pipeline": {"max_concurrency": 0}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = AppConfig::from_json_str(
            r#"{"censys": {"api_token": "t"}, "pipeline": {"backoff_factor": -1.0}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_provider_names_by_kind() {
        let config = AppConfig::from_json_str(
            r#"{"virustotal": {"api_key": "k"}, "censys": {"api_token": "t"}}"#,
        )
        .unwrap();
        assert_eq!(
            config.credentials.provider_names(RecordKind::Event),
            vec!["virustotal", "censys"]
        );
        assert_eq!(
            config.credentials.provider_names(RecordKind::UserAgent),
            vec!["virustotal"]
        );
    }

    #[test]
    fn test_censys_only_cannot_enrich_user_agents() {
        let config = AppConfig::from_json_str(r#"{"censys": {"api_token": "t"}}"#).unwrap();
        let result = config
            .credentials
            .build_providers(RecordKind::UserAgent, &config.pipeline);
        assert!(matches!(result, Err(ConfigError::Missing(_))));
    }

    #[test]
    fn test_secrets_redacted_in_debug() {
        let config = AppConfig::from_json_str(r#"{"virustotal": {"api_key": "hunter2"}}"#).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("REDACTED"));
    }
}
