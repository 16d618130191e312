//! Record parsing and normalization.
//!
//! Turns a [`RawRecord`] into its fixed attributes plus the [`LookupKey`]
//! the providers are queried with. Records without a usable key still
//! produce attributes; only malformed event bodies are errors.

mod event;
mod user_agent;

pub use event::{parse_event, EventFields};
pub use user_agent::{
    parse_user_agent, ParsedUserAgent, UserAgentAge, UserAgentDetails, UserAgentStatus,
};

use crate::record::{RawRecord, RecordAttributes};
use chrono::{Datelike, Utc};
use thiserror::Error;
use tl_connectors::LookupKey;

/// Errors raised while parsing a record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid JSON in event body: {0}")]
    InvalidJson(String),

    #[error("Event body is a JSON {0}, expected an object")]
    NotAnObject(&'static str),
}

/// A parsed record ready for enrichment.
#[derive(Debug, Clone)]
pub struct NormalizedRecord {
    /// `None` when the record has nothing to look up.
    pub key: Option<LookupKey>,
    pub attributes: RecordAttributes,
}

/// Parses raw records. Holds the reference year for user-agent age.
#[derive(Debug, Clone, Copy)]
pub struct RecordParser {
    current_year: i32,
}

impl Default for RecordParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordParser {
    /// A parser using the current UTC year.
    pub fn new() -> Self {
        Self {
            current_year: Utc::now().year(),
        }
    }

    /// A parser pinned to `year`.
    pub fn with_year(year: i32) -> Self {
        Self { current_year: year }
    }

    pub fn current_year(&self) -> i32 {
        self.current_year
    }

    pub fn normalize(&self, raw: &RawRecord) -> Result<NormalizedRecord, ParseError> {
        match raw {
            RawRecord::Event { body } => {
                let fields = parse_event(body)?;
                Ok(NormalizedRecord {
                    key: fields.lookup_key(),
                    attributes: RecordAttributes::Event(Box::new(fields)),
                })
            }
            RawRecord::UserAgent { value } => {
                let parsed = parse_user_agent(value.as_deref(), self.current_year);
                Ok(NormalizedRecord {
                    key: parsed.key,
                    attributes: RecordAttributes::UserAgent(parsed.details),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tl_connectors::LookupKind;

    #[test]
    fn test_normalize_event() {
        let parser = RecordParser::with_year(2024);
        let record = parser
            .normalize(&RawRecord::event(r#"{"ip_address": "8.8.8.8"}"#))
            .unwrap();

        let key = record.key.unwrap();
        assert_eq!(key.kind(), LookupKind::Ip);
        assert_eq!(key.as_str(), "8.8.8.8");
        assert!(matches!(record.attributes, RecordAttributes::Event(_)));
    }

    #[test]
    fn test_normalize_malformed_event() {
        let parser = RecordParser::with_year(2024);
        let err = parser.normalize(&RawRecord::event("{oops")).unwrap_err();
        assert!(matches!(err, ParseError::InvalidJson(_)));
    }

    #[test]
    fn test_normalize_user_agent() {
        let parser = RecordParser::with_year(2024);
        let record = parser
            .normalize(&RawRecord::user_agent("curl/8.4.0"))
            .unwrap();
        assert_eq!(record.key.unwrap().kind(), LookupKind::UserAgent);

        let empty = parser
            .normalize(&RawRecord::UserAgent { value: None })
            .unwrap();
        assert!(empty.key.is_none());
        assert_eq!(
            empty.attributes,
            RecordAttributes::UserAgent(UserAgentDetails::empty())
        );
    }

    #[test]
    fn test_default_parser_uses_current_year() {
        assert!(RecordParser::new().current_year() >= 2024);
    }
}
