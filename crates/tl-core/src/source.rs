//! Batch sources.
//!
//! A [`BatchSource`] yields the raw records for one run. Event exports are
//! filtered to a half-open [`TimeWindow`]; user-agent lists are taken whole.

use crate::record::RawRecord;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised while reading a batch.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid timestamp {0:?}; expected YYYY-MM-DD or YYYY-MM-DD HH:MM:SS")]
    InvalidTimestamp(String),

    #[error("Invalid time window: {0}")]
    InvalidWindow(String),
}

/// A half-open time range `[start, end)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, SourceError> {
        if start >= end {
            return Err(SourceError::InvalidWindow(format!(
                "start {} is not before end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Parses both bounds with [`parse_timestamp`].
    pub fn parse(start: &str, end: &str) -> Result<Self, SourceError> {
        Self::new(parse_timestamp(start)?, parse_timestamp(end)?)
    }

    /// The 24 hours ending at `now`.
    pub fn last_day(now: DateTime<Utc>) -> Self {
        Self {
            start: now - Duration::days(1),
            end: now,
        }
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t < self.end
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.start.format("%Y-%m-%d %H:%M:%S"),
            self.end.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

/// Parses `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` (both read as UTC) or RFC 3339.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, SourceError> {
    let raw = raw.trim();

    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt.and_utc());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    Err(SourceError::InvalidTimestamp(raw.to_string()))
}

/// Where a run's raw records come from.
#[async_trait]
pub trait BatchSource: Send + Sync {
    /// Fetches the batch, restricted to `window` when the source is timed.
    async fn fetch(&self, window: Option<&TimeWindow>) -> Result<Vec<RawRecord>, SourceError>;
}

async fn read_file(path: &Path) -> Result<String, SourceError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// A JSON-lines event export.
///
/// Each row is an object with a `body` (JSON string or inline object) and an
/// `event_time`. Rows that cannot be read as such are skipped with a warning.
#[derive(Debug, Clone)]
pub struct JsonLinesSource {
    path: PathBuf,
}

impl JsonLinesSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn row_to_record(
        line_no: usize,
        line: &str,
        window: Option<&TimeWindow>,
    ) -> Option<RawRecord> {
        let row: Value = match serde_json::from_str(line) {
            Ok(row) => row,
            Err(e) => {
                warn!(line = line_no, error = %e, "Skipping unreadable export row");
                return None;
            }
        };

        if let Some(window) = window {
            let event_time = row
                .get("event_time")
                .and_then(Value::as_str)
                .map(parse_timestamp);
            match event_time {
                Some(Ok(t)) if window.contains(t) => {}
                Some(Ok(_)) => return None,
                _ => {
                    warn!(line = line_no, "Skipping row without a parsable event_time");
                    return None;
                }
            }
        }

        match row.get("body") {
            Some(Value::String(body)) => Some(RawRecord::event(body.clone())),
            Some(Value::Null) | None => {
                warn!(line = line_no, "Skipping row without a body");
                None
            }
            Some(inline) => Some(RawRecord::event(inline.to_string())),
        }
    }
}

#[async_trait]
impl BatchSource for JsonLinesSource {
    async fn fetch(&self, window: Option<&TimeWindow>) -> Result<Vec<RawRecord>, SourceError> {
        let contents = read_file(&self.path).await?;

        let mut total = 0usize;
        let records: Vec<RawRecord> = contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .filter_map(|(i, line)| {
                total += 1;
                Self::row_to_record(i + 1, line, window)
            })
            .collect();

        info!(
            path = %self.path.display(),
            window = ?window.map(ToString::to_string),
            rows = total,
            records = records.len(),
            "Loaded event batch"
        );
        Ok(records)
    }
}

/// A plain-text list with one user-agent string per line.
///
/// Blank lines become records with no user agent.
#[derive(Debug, Clone)]
pub struct UserAgentListSource {
    path: PathBuf,
}

impl UserAgentListSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl BatchSource for UserAgentListSource {
    async fn fetch(&self, window: Option<&TimeWindow>) -> Result<Vec<RawRecord>, SourceError> {
        if window.is_some() {
            debug!("User-agent lists are untimed, ignoring window");
        }
        let contents = read_file(&self.path).await?;

        let records: Vec<RawRecord> = contents
            .lines()
            .map(|line| {
                let trimmed = line.trim();
                RawRecord::UserAgent {
                    value: (!trimmed.is_empty()).then(|| trimmed.to_string()),
                }
            })
            .collect();

        info!(path = %self.path.display(), records = records.len(), "Loaded user-agent batch");
        Ok(records)
    }
}
