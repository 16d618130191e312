//! Event body parsing.

use super::ParseError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tl_connectors::LookupKey;
use tracing::warn;

/// The fixed event schema. Every field is copied verbatim from the event
/// body and is `null` when absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventFields {
    pub event_id: Option<Value>,
    pub ip_address: Option<Value>,
    pub user_agent: Option<Value>,
    pub device_id: Option<Value>,
    pub location: Option<Value>,
    pub event_time: Option<Value>,
    pub risk_score: Option<Value>,
    pub account_id: Option<Value>,
    pub login_attempt: Option<Value>,
    pub session_id: Option<Value>,
    pub transaction_id: Option<Value>,
    pub device_os: Option<Value>,
    pub device_model: Option<Value>,
    pub device_type: Option<Value>,
    pub country: Option<Value>,
    pub region: Option<Value>,
    pub city: Option<Value>,
    pub zip_code: Option<Value>,
    pub latitude: Option<Value>,
    pub longitude: Option<Value>,
    pub confidence_score: Option<Value>,
    pub fraud_type: Option<Value>,
    pub identity_score: Option<Value>,
    pub email_domain: Option<Value>,
    pub phone_number: Option<Value>,
    pub payment_method: Option<Value>,
    pub proxy: Option<Value>,
    pub vpn: Option<Value>,
    pub tor: Option<Value>,
    pub bot: Option<Value>,
    pub malware: Option<Value>,
    pub phishevent: Option<Value>,
    pub account_creation: Option<Value>,
    pub account_takeover: Option<Value>,
    pub account_funding: Option<Value>,
    pub device_change: Option<Value>,
    pub password_reset: Option<Value>,
    pub profile_change: Option<Value>,
    pub withdrawal: Option<Value>,
    pub deposit: Option<Value>,
    pub purchase: Option<Value>,
    pub transfer: Option<Value>,
    pub refund: Option<Value>,
    pub login_success: Option<Value>,
    pub login_failure: Option<Value>,
    pub multi_factor_auth: Option<Value>,
    pub sms_verification: Option<Value>,
    pub email_verification: Option<Value>,
    pub phone_verification: Option<Value>,
    pub ip_reputation: Option<Value>,
    pub blacklist_status: Option<Value>,
    pub device_reputation: Option<Value>,
    pub behavioral_biometrics: Option<Value>,
    pub network_attributes: Option<Value>,
    pub geolocation: Option<Value>,
    pub risk_rules_triggered: Option<Value>,
    pub custom_attributes: Option<Value>,
    pub screen_resolution: Option<Value>,
    pub charging_status: Option<Value>,
}

impl EventFields {
    /// The lookup key derived from `ip_address`, if it holds a valid address.
    pub fn lookup_key(&self) -> Option<LookupKey> {
        match &self.ip_address {
            Some(Value::String(raw)) => {
                let key = LookupKey::parse_ip(raw);
                if key.is_none() {
                    warn!(ip_address = %raw, "Event carries an invalid IP address, skipping lookups");
                }
                key
            }
            Some(other) => {
                warn!(ip_address = %other, "Event ip_address is not a string, skipping lookups");
                None
            }
            None => {
                warn!("Event has no ip_address, skipping lookups");
                None
            }
        }
    }
}

/// Parses one event body into the fixed schema.
pub fn parse_event(body: &str) -> Result<EventFields, ParseError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

    if !value.is_object() {
        return Err(ParseError::NotAnObject(json_type(&value)));
    }

    serde_json::from_value(value).map_err(|e| ParseError::InvalidJson(e.to_string()))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_event_copies_known_fields() {
        let body = r#"{"event_id": "e-1", "ip_address": "8.8.8.8", "risk_score": 42,
                       "vpn": false, "unknown_field": "dropped"}"#;
        let fields = parse_event(body).unwrap();

        assert_eq!(fields.event_id, Some(json!("e-1")));
        assert_eq!(fields.risk_score, Some(json!(42)));
        assert_eq!(fields.vpn, Some(json!(false)));
        assert_eq!(fields.city, None);

        let out = serde_json::to_value(&fields).unwrap();
        assert!(out.get("unknown_field").is_none());
        assert!(out["city"].is_null());
        assert_eq!(out.as_object().unwrap().len(), 59);
    }

    #[test]
    fn test_lookup_key_from_ip() {
        let fields = parse_event(r#"{"ip_address": "1.1.1.1"}"#).unwrap();
        assert_eq!(fields.lookup_key().unwrap().as_str(), "1.1.1.1");

        let fields = parse_event(r#"{"ip_address": "invalid_ip"}"#).unwrap();
        assert!(fields.lookup_key().is_none());

        let fields = parse_event(r#"{"ip_address": 12345}"#).unwrap();
        assert!(fields.lookup_key().is_none());

        let fields = parse_event(r#"{"event_id": "no-ip"}"#).unwrap();
        assert!(fields.lookup_key().is_none());
    }

    #[test]
    fn test_malformed_bodies_are_errors() {
        assert!(matches!(
            parse_event("{not json"),
            Err(ParseError::InvalidJson(_))
        ));
        assert_eq!(
            parse_event("[1, 2]").unwrap_err(),
            ParseError::NotAnObject("array")
        );
        assert_eq!(
            parse_event("null").unwrap_err(),
            ParseError::NotAnObject("null")
        );
    }
}
