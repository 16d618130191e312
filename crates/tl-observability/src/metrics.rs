//! Metric descriptions for ThreatLens.
//!
//! The connector and pipeline crates emit through the `metrics` facade; this
//! module describes those series once so an installed recorder can export
//! them with units and help text. Without a recorder every call is a no-op.

use metrics::{describe_counter, describe_histogram, Unit};

pub const CACHE_HITS: &str = "tl_cache_hits_total";
pub const CACHE_MISSES: &str = "tl_cache_misses_total";
pub const PROVIDER_REQUESTS: &str = "tl_provider_requests_total";
pub const PROVIDER_ATTEMPTS: &str = "tl_provider_attempts_total";
pub const PROVIDER_RETRIES_EXHAUSTED: &str = "tl_provider_retries_exhausted_total";
pub const RECORDS_PARSE_FAILED: &str = "tl_records_parse_failed_total";
pub const BATCH_DURATION: &str = "tl_batch_duration_seconds";

/// Every metric name emitted by the workspace.
pub const ALL_METRICS: [&str; 7] = [
    CACHE_HITS,
    CACHE_MISSES,
    PROVIDER_REQUESTS,
    PROVIDER_ATTEMPTS,
    PROVIDER_RETRIES_EXHAUSTED,
    RECORDS_PARSE_FAILED,
    BATCH_DURATION,
];

/// Registers metric descriptions.
pub fn register_metrics() {
    describe_counter!(CACHE_HITS, Unit::Count, "Result cache lookups served from cache");
    describe_counter!(CACHE_MISSES, Unit::Count, "Result cache lookups that missed");
    describe_counter!(
        PROVIDER_REQUESTS,
        Unit::Count,
        "Provider lookups issued after a cache miss, by provider"
    );
    describe_counter!(
        PROVIDER_ATTEMPTS,
        Unit::Count,
        "HTTP attempts made by provider clients, retries included"
    );
    describe_counter!(
        PROVIDER_RETRIES_EXHAUSTED,
        Unit::Count,
        "Provider requests that failed on every attempt, by connector"
    );
    describe_counter!(
        RECORDS_PARSE_FAILED,
        Unit::Count,
        "Records that could not be parsed or whose task failed"
    );
    describe_histogram!(
        BATCH_DURATION,
        Unit::Seconds,
        "Wall-clock time to enrich one batch"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_without_recorder_is_noop() {
        register_metrics();
        register_metrics();
    }

    #[test]
    fn test_metric_names_are_prefixed_and_unique() {
        let mut names = ALL_METRICS.to_vec();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), ALL_METRICS.len());
        assert!(ALL_METRICS.iter().all(|name| name.starts_with("tl_")));
    }
}
