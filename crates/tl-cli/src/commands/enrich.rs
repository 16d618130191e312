//! Enrich commands - run one batch through the pipeline.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use tl_core::{
    summarize, AppConfig, BatchSource, BatchSummary, CacheStats, EnrichedRecord,
    EnrichmentPipeline, JsonLinesSource, MemoryCache, RawRecord, RecordKind, TimeWindow,
    UserAgentListSource,
};

use super::{OutputFormat, RunOptions};

/// Enriches the events of `input` whose `event_time` falls inside `window`.
pub async fn enrich_events(
    config: &AppConfig,
    input: &Path,
    window: TimeWindow,
    options: &RunOptions,
) -> Result<()> {
    let batch = JsonLinesSource::new(input)
        .fetch(Some(&window))
        .await
        .context("Failed to read event export")?;
    run_batch(config, RecordKind::Event, batch, options).await
}

/// Enriches every line of `input` as a user-agent string.
pub async fn enrich_user_agents(
    config: &AppConfig,
    input: &Path,
    options: &RunOptions,
) -> Result<()> {
    let batch = UserAgentListSource::new(input)
        .fetch(None)
        .await
        .context("Failed to read user-agent list")?;
    run_batch(config, RecordKind::UserAgent, batch, options).await
}

async fn run_batch(
    config: &AppConfig,
    kind: RecordKind,
    batch: Vec<RawRecord>,
    options: &RunOptions,
) -> Result<()> {
    let providers = config
        .credentials
        .build_providers(kind, &config.pipeline)?;
    let pipeline =
        EnrichmentPipeline::new(&config.pipeline, providers, Arc::new(MemoryCache::new()));

    let records = pipeline.run_processing(batch).await;

    write_records(&records, options.output.as_deref())?;
    print_summary(&summarize(&records), &pipeline.cache_stats(), options)
}

/// Writes records as a pretty-printed JSON array to `output`, or stdout.
pub fn write_records(records: &[EnrichedRecord], output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(records)?;
    match output {
        Some(path) => std::fs::write(path, json + "\n")
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{}", json),
    }
    Ok(())
}

// Stdout may be carrying the records, so the summary goes to stderr.
fn print_summary(summary: &BatchSummary, cache: &CacheStats, options: &RunOptions) -> Result<()> {
    if options.format == OutputFormat::Json {
        let report = serde_json::json!({
            "summary": summary,
            "cache": {
                "hits": cache.hits,
                "misses": cache.misses,
                "hit_rate": cache.hit_rate,
            },
            "output": options.output.as_ref().map(|p| p.display().to_string()),
        });
        eprintln!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    eprintln!();
    eprintln!("{}", "Batch Summary".bold());
    eprintln!("─────────────");
    eprintln!("Records:      {}", summary.total);
    eprintln!("Enriched:     {}", summary.enriched.to_string().green());
    if summary.parse_failed > 0 {
        eprintln!("Parse failed: {}", summary.parse_failed.to_string().red());
    } else {
        eprintln!("Parse failed: 0");
    }
    for (provider, empty) in &summary.empty_results {
        let line = format!("  {} empty results: {}", provider, empty);
        if *empty > 0 {
            eprintln!("{}", line.yellow());
        } else {
            eprintln!("{}", line);
        }
    }
    eprintln!(
        "Cache:        {} hits, {} misses ({:.0}% hit rate)",
        cache.hits,
        cache.misses,
        cache.hit_rate * 100.0
    );
    if let Some(path) = &options.output {
        eprintln!("  {} Wrote {}", "✓".green(), path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    fn test_config() -> AppConfig {
        AppConfig::from_json_str(
            r#"{
                "virustotal": {"api_key": "vt-key", "base_url": "http://127.0.0.1:9"},
                "pipeline": {"retries": 1, "backoff_factor": 0.0, "request_timeout_secs": 1}
            }"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_blank_user_agents_make_no_requests() {
        let mut input = NamedTempFile::new().unwrap();
        writeln!(input).unwrap();
        writeln!(input, "   ").unwrap();

        let dir = tempdir().unwrap();
        let output = dir.path().join("enriched.json");
        let options = RunOptions {
            format: OutputFormat::Json,
            output: Some(output.clone()),
        };

        enrich_user_agents(&test_config(), input.path(), &options)
            .await
            .unwrap();

        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        let records = written.as_array().unwrap();
        assert_eq!(records.len(), 2);
        for record in records {
            assert_eq!(record["status"], "empty");
            assert_eq!(record["virustotal"], serde_json::json!({}));
        }
    }

    #[tokio::test]
    async fn test_censys_only_config_cannot_enrich_user_agents() {
        let config = AppConfig::from_json_str(r#"{"censys": {"api_token": "tok"}}"#).unwrap();
        let input = NamedTempFile::new().unwrap();
        let options = RunOptions {
            format: OutputFormat::Text,
            output: None,
        };

        assert!(enrich_user_agents(&config, input.path(), &options)
            .await
            .is_err());
    }

    #[test]
    fn test_write_records_to_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.json");

        write_records(&[], Some(&path)).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]\n");
    }
}
