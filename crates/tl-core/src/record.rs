//! Raw and enriched record types.

use crate::enrichment::EnrichmentResult;
use crate::parser::{EventFields, UserAgentDetails};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// One unit of input, immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawRecord {
    /// A JSON-encoded event body as stored in the warehouse `body` column.
    Event { body: String },
    /// A raw user-agent string; `None` when the source had no value.
    UserAgent { value: Option<String> },
}

impl RawRecord {
    pub fn event(body: impl Into<String>) -> Self {
        Self::Event { body: body.into() }
    }

    pub fn user_agent(value: impl Into<String>) -> Self {
        Self::UserAgent {
            value: Some(value.into()),
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            RawRecord::Event { .. } => RecordKind::Event,
            RawRecord::UserAgent { .. } => RecordKind::UserAgent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Event,
    UserAgent,
}

/// Terminal state of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Enriched,
    ParseFailed,
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordStatus::Enriched => f.write_str("enriched"),
            RecordStatus::ParseFailed => f.write_str("parse_failed"),
        }
    }
}

/// The fixed attribute part of an enriched record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RecordAttributes {
    Event(Box<EventFields>),
    UserAgent(UserAgentDetails),
}

impl RecordAttributes {
    /// Attributes for a record that could not be parsed: every field null.
    pub fn blank(kind: RecordKind) -> Self {
        match kind {
            RecordKind::Event => RecordAttributes::Event(Box::default()),
            RecordKind::UserAgent => RecordAttributes::UserAgent(UserAgentDetails::unparsable()),
        }
    }
}

/// Output record: attributes plus one entry per configured provider,
/// serialized as a single flat JSON object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedRecord {
    #[serde(flatten)]
    pub attributes: RecordAttributes,
    #[serde(flatten)]
    pub enrichments: BTreeMap<String, EnrichmentResult>,
    pub record_status: RecordStatus,
    pub record_error: Option<String>,
}

impl EnrichedRecord {
    /// A `parse_failed` record carrying `{}` for every provider.
    pub fn parse_failed<'a>(
        kind: RecordKind,
        error: impl Into<String>,
        providers: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Self {
            attributes: RecordAttributes::blank(kind),
            enrichments: providers
                .into_iter()
                .map(|name| (name.to_string(), EnrichmentResult::empty()))
                .collect(),
            record_status: RecordStatus::ParseFailed,
            record_error: Some(error.into()),
        }
    }

    pub fn enrichment(&self, provider: &str) -> Option<&EnrichmentResult> {
        self.enrichments.get(provider)
    }

    pub fn is_parse_failed(&self) -> bool {
        self.record_status == RecordStatus::ParseFailed
    }

    pub fn event(&self) -> Option<&EventFields> {
        match &self.attributes {
            RecordAttributes::Event(fields) => Some(fields),
            RecordAttributes::UserAgent(_) => None,
        }
    }

    pub fn user_agent(&self) -> Option<&UserAgentDetails> {
        match &self.attributes {
            RecordAttributes::UserAgent(details) => Some(details),
            RecordAttributes::Event(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_failed_record_serializes_flat() {
        let record = EnrichedRecord::parse_failed(
            RecordKind::Event,
            "invalid JSON",
            ["censys", "virustotal"],
        );
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["record_status"], "parse_failed");
        assert_eq!(value["record_error"], "invalid JSON");
        assert_eq!(value["virustotal"], json!({}));
        assert_eq!(value["censys"], json!({}));
        assert!(value["ip_address"].is_null());
        assert!(value.as_object().unwrap().contains_key("charging_status"));
    }

    #[test]
    fn test_raw_record_kind() {
        assert_eq!(RawRecord::event("{}").kind(), RecordKind::Event);
        assert_eq!(
            RawRecord::UserAgent { value: None }.kind(),
            RecordKind::UserAgent
        );
    }
}
