//! Validate command - load the configuration and report what it enables.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use futures::future::join_all;
use std::path::Path;
use tl_connectors::{Connector, ConnectorHealth, ConnectorResult};
use tl_core::{AppConfig, RecordKind};

use super::OutputFormat;

struct ProbeReport {
    connector: String,
    outcome: ConnectorResult<ConnectorHealth>,
}

impl ProbeReport {
    fn is_healthy(&self) -> bool {
        matches!(self.outcome, Ok(ConnectorHealth::Healthy))
    }

    fn to_json(&self) -> serde_json::Value {
        match &self.outcome {
            Ok(health) => serde_json::json!({ "connector": self.connector, "health": health }),
            Err(e) => serde_json::json!({ "connector": self.connector, "error": e.to_string() }),
        }
    }
}

/// Loads the configuration at `config_path` and lists the providers per
/// record kind. With `check_health`, every connector is probed and any
/// unhealthy one fails the command.
pub async fn validate(config_path: &Path, check_health: bool, format: OutputFormat) -> Result<()> {
    let config = AppConfig::load(config_path)
        .with_context(|| format!("Configuration invalid: {}", config_path.display()))?;

    let events = config.credentials.provider_names(RecordKind::Event);
    let user_agents = config.credentials.provider_names(RecordKind::UserAgent);

    let probes = if check_health {
        probe_all(&config).await?
    } else {
        Vec::new()
    };

    if format == OutputFormat::Json {
        let report = serde_json::json!({
            "config": config_path.display().to_string(),
            "valid": true,
            "providers": { "events": events, "user_agents": user_agents },
            "pipeline": {
                "max_concurrency": config.pipeline.max_concurrency,
                "cache_ttl_secs": config.pipeline.cache_ttl_secs,
                "retries": config.pipeline.retries,
                "backoff_factor": config.pipeline.backoff_factor,
                "request_timeout_secs": config.pipeline.request_timeout_secs,
                "requests_per_minute": config.pipeline.requests_per_minute,
            },
            "health": probes.iter().map(ProbeReport::to_json).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_text(config_path, &config, &events, &user_agents, &probes);
    }

    let unhealthy = probes.iter().filter(|p| !p.is_healthy()).count();
    if unhealthy > 0 {
        bail!("{} connector(s) failed the health check", unhealthy);
    }
    Ok(())
}

// Events and user agents use different VirusTotal endpoints, so both kinds
// are probed.
async fn probe_all(config: &AppConfig) -> Result<Vec<ProbeReport>> {
    let mut providers = Vec::new();
    for kind in [RecordKind::Event, RecordKind::UserAgent] {
        if config.credentials.provider_names(kind).is_empty() {
            continue;
        }
        providers.extend(config.credentials.build_providers(kind, &config.pipeline)?);
    }

    let outcomes = join_all(providers.iter().map(|p| p.health_check())).await;

    Ok(providers
        .iter()
        .zip(outcomes)
        .map(|(provider, outcome)| ProbeReport {
            connector: provider.name().to_string(),
            outcome,
        })
        .collect())
}

fn print_text(
    config_path: &Path,
    config: &AppConfig,
    events: &[&str],
    user_agents: &[&str],
    probes: &[ProbeReport],
) {
    println!("{}", "Validating configuration...".cyan());
    println!("  {} Loaded {}", "✓".green(), config_path.display());

    println!();
    println!("{}", "Providers".bold());
    print_providers("events", events);
    print_providers("user agents", user_agents);

    println!();
    println!("{}", "Pipeline".bold());
    println!("  max_concurrency:      {}", config.pipeline.max_concurrency);
    println!("  cache_ttl_secs:       {}", config.pipeline.cache_ttl_secs);
    println!("  retries:              {}", config.pipeline.retries);
    println!("  backoff_factor:       {}", config.pipeline.backoff_factor);
    println!("  request_timeout_secs: {}", config.pipeline.request_timeout_secs);
    match config.pipeline.requests_per_minute {
        Some(rpm) => println!("  requests_per_minute:  {}", rpm),
        None => println!("  requests_per_minute:  unlimited"),
    }

    if probes.is_empty() {
        return;
    }
    println!();
    println!("{}", "Health".bold());
    for probe in probes {
        match &probe.outcome {
            Ok(ConnectorHealth::Healthy) => {
                println!("  {} {}", "✓".green(), probe.connector)
            }
            Ok(ConnectorHealth::Degraded(reason)) => {
                println!("  {} {}: {}", "⚠".yellow(), probe.connector, reason)
            }
            Ok(ConnectorHealth::Unhealthy(reason)) => {
                println!("  {} {}: {}", "✗".red(), probe.connector, reason)
            }
            Err(e) => println!("  {} {}: {}", "✗".red(), probe.connector, e),
        }
    }
}

fn print_providers(label: &str, names: &[&str]) {
    if names.is_empty() {
        println!("  {} {}: none configured", "⚠".yellow(), label);
    } else {
        println!("  {} {}: {}", "→".green(), label, names.join(", "));
    }
}
