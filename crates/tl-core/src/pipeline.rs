//! Fan-out batch orchestrator.
//!
//! Every record in a batch becomes its own task. A semaphore bounds how many
//! records are in flight, each record's providers are resolved concurrently
//! through the shared result cache, and results are collected back in input
//! order. Nothing a single record does can abort the batch.
//!
//! Per record: `RAW -> PARSED -> ENRICHING -> ENRICHED`, or
//! `RAW -> PARSE_FAILED` when the body cannot be parsed.

use crate::cache::{Cache, CacheStats};
use crate::config::PipelineConfig;
use crate::enrichment::{CachedProvider, EnrichmentResult, ResultCache, ResultCacheConfig};
use crate::parser::RecordParser;
use crate::record::{EnrichedRecord, RawRecord, RecordStatus};
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tl_connectors::EnrichmentProvider;
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tracing::{debug, error, info, instrument, warn};

/// Counts for one processed batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub enriched: usize,
    pub parse_failed: usize,
    /// Per provider, how many records ended up with `{}`.
    pub empty_results: BTreeMap<String, usize>,
}

/// Tallies a processed batch.
pub fn summarize(records: &[EnrichedRecord]) -> BatchSummary {
    let mut summary = BatchSummary {
        total: records.len(),
        ..Default::default()
    };

    for record in records {
        match record.record_status {
            RecordStatus::Enriched => summary.enriched += 1,
            RecordStatus::ParseFailed => summary.parse_failed += 1,
        }
        for (provider, result) in &record.enrichments {
            let empty = summary.empty_results.entry(provider.clone()).or_insert(0);
            if result.is_empty() {
                *empty += 1;
            }
        }
    }

    summary
}

#[derive(Clone)]
struct PipelineInner {
    providers: Vec<CachedProvider>,
    provider_names: Vec<String>,
    result_cache: Arc<ResultCache>,
    parser: RecordParser,
    semaphore: Arc<Semaphore>,
}

/// Enriches batches of raw records with provider data.
#[derive(Clone)]
pub struct EnrichmentPipeline {
    inner: Arc<PipelineInner>,
}

impl EnrichmentPipeline {
    /// Creates a pipeline over `providers`, all sharing `cache`.
    pub fn new(
        config: &PipelineConfig,
        providers: Vec<Arc<dyn EnrichmentProvider>>,
        cache: Arc<dyn Cache>,
    ) -> Self {
        let result_cache = Arc::new(ResultCache::new(
            cache,
            ResultCacheConfig {
                ttl: config.cache_ttl(),
            },
        ));

        let mut provider_names: Vec<String> = providers
            .iter()
            .map(|p| p.provider_name().to_string())
            .collect();
        provider_names.sort();
        provider_names.dedup();

        let providers = providers
            .into_iter()
            .map(|p| CachedProvider::new(p, Arc::clone(&result_cache)))
            .collect();

        Self {
            inner: Arc::new(PipelineInner {
                providers,
                provider_names,
                result_cache,
                parser: RecordParser::new(),
                semaphore: Arc::new(Semaphore::new(config.max_concurrency.max(1))),
            }),
        }
    }

    /// Replaces the record parser (for a pinned user-agent reference year).
    pub fn with_parser(self, parser: RecordParser) -> Self {
        let mut inner = (*self.inner).clone();
        inner.parser = parser;
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Names that appear as provider fields on every output record.
    pub fn provider_names(&self) -> &[String] {
        &self.inner.provider_names
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.inner.result_cache.stats()
    }

    /// Enriches `batch`, returning exactly one record per input, in order.
    #[instrument(skip(self, batch), fields(records = batch.len()))]
    pub async fn run_processing(&self, batch: Vec<RawRecord>) -> Vec<EnrichedRecord> {
        let started = Instant::now();

        let handles: Vec<_> = batch
            .into_iter()
            .enumerate()
            .map(|(index, raw)| {
                let kind = raw.kind();
                let inner = Arc::clone(&self.inner);
                let handle = tokio::spawn(async move {
                    let _permit = inner.semaphore.acquire().await.ok();
                    inner.process_record(index, raw).await
                });
                (index, kind, handle)
            })
            .collect();

        let mut records = Vec::with_capacity(handles.len());
        for (index, kind, handle) in handles {
            let record = match handle.await {
                Ok(record) => record,
                Err(e) => {
                    let message = panic_message(e);
                    error!(index, error = %message, "Record task failed");
                    metrics::counter!("tl_records_parse_failed_total").increment(1);
                    EnrichedRecord::parse_failed(
                        kind,
                        format!("record task failed: {}", message),
                        self.inner.provider_names.iter().map(String::as_str),
                    )
                }
            };
            records.push(record);
        }

        let elapsed = started.elapsed();
        metrics::histogram!("tl_batch_duration_seconds").record(elapsed.as_secs_f64());

        let summary = summarize(&records);
        info!(
            total = summary.total,
            enriched = summary.enriched,
            parse_failed = summary.parse_failed,
            empty_results = ?summary.empty_results,
            duration_ms = elapsed.as_millis() as u64,
            "Batch processed"
        );

        records
    }
}

impl PipelineInner {
    async fn process_record(&self, index: usize, raw: RawRecord) -> EnrichedRecord {
        let kind = raw.kind();

        let normalized = match self.parser.normalize(&raw) {
            Ok(normalized) => normalized,
            Err(e) => {
                warn!(index, error = %e, "Record failed to parse");
                metrics::counter!("tl_records_parse_failed_total").increment(1);
                return EnrichedRecord::parse_failed(
                    kind,
                    e.to_string(),
                    self.provider_names.iter().map(String::as_str),
                );
            }
        };
        debug!(index, has_key = normalized.key.is_some(), "Record parsed");

        let mut enrichments: BTreeMap<String, EnrichmentResult> = BTreeMap::new();

        if let Some(key) = &normalized.key {
            let applicable: Vec<&CachedProvider> = self
                .providers
                .iter()
                .filter(|p| p.lookup_kind() == key.kind())
                .collect();

            debug!(index, providers = applicable.len(), "Record enriching");
            let results = join_all(applicable.iter().map(|p| p.resolve(key))).await;

            for (provider, result) in applicable.into_iter().zip(results) {
                enrichments.insert(provider.provider_name().to_string(), result);
            }
        }

        for name in &self.provider_names {
            enrichments
                .entry(name.clone())
                .or_insert_with(EnrichmentResult::empty);
        }
        debug!(index, "Record enriched");

        EnrichedRecord {
            attributes: normalized.attributes,
            enrichments,
            record_status: RecordStatus::Enriched,
            record_error: None,
        }
    }
}

fn panic_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
