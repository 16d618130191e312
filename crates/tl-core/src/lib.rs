//! # tl-core
//!
//! Batch enrichment core for ThreatLens.
//!
//! This crate provides the result cache, record parsing, cached provider
//! lookups, and the fan-out orchestrator that turns a batch of raw records
//! into enriched records.

pub mod cache;
pub mod config;
pub mod enrichment;
pub mod parser;
pub mod pipeline;
pub mod record;
pub mod source;

pub use cache::{Cache, CacheError, CacheStats, MemoryCache};
pub use config::{AppConfig, ConfigError, PipelineConfig, ProviderCredentials};
pub use enrichment::{CachedProvider, EnrichmentResult, ResultCache};
pub use parser::{ParseError, RecordParser, UserAgentDetails, UserAgentStatus};
pub use pipeline::{summarize, BatchSummary, EnrichmentPipeline};
pub use record::{EnrichedRecord, RawRecord, RecordKind, RecordStatus};
pub use source::{BatchSource, JsonLinesSource, SourceError, TimeWindow, UserAgentListSource};
