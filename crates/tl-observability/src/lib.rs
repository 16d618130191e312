//! # tl-observability
//!
//! Logging and metrics infrastructure for ThreatLens.
//!
//! This crate sets up structured logging with tracing and describes the
//! metrics emitted by the connector and pipeline crates.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, init_logging_with_config, LoggingConfig};
pub use metrics::register_metrics;
