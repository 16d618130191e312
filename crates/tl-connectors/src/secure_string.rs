//! Zeroizing wrapper for provider credentials.
//!
//! API keys and bearer tokens are loaded once at startup and then live for
//! the whole process. `SecureString` keeps them out of `Debug`/`Display`
//! output and wipes the backing buffer when the value is dropped.

use serde::{Deserialize, Deserializer};
use std::fmt;
use zeroize::Zeroizing;

/// A credential string that is redacted when formatted and zeroized on drop.
///
/// ```
/// use tl_connectors::SecureString;
///
/// let key = SecureString::new("vt-api-key");
/// assert_eq!(key.expose_secret(), "vt-api-key");
/// assert_eq!(format!("{:?}", key), "SecureString([REDACTED])");
/// ```
#[derive(Clone, Default)]
pub struct SecureString(Zeroizing<String>);

impl SecureString {
    /// Wraps a credential.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(Zeroizing::new(secret.into()))
    }

    /// Returns the raw credential for placing into a request header.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// Returns true if no credential was supplied.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<String> for SecureString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecureString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecureString([REDACTED])")
    }
}

impl fmt::Display for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl PartialEq for SecureString {
    fn eq(&self, other: &Self) -> bool {
        use subtle::ConstantTimeEq;
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl Eq for SecureString {}

// Credentials are read from config files but never written back out, so
// there is deliberately no `Serialize` impl.
impl<'de> Deserialize<'de> for SecureString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecureString::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expose_secret() {
        let secret = SecureString::new("censys-token");
        assert_eq!(secret.expose_secret(), "censys-token");
    }

    #[test]
    fn test_formatting_is_redacted() {
        let secret = SecureString::from("do-not-log-me");
        assert!(!format!("{:?}", secret).contains("do-not-log-me"));
        assert_eq!(secret.to_string(), "[REDACTED]");
    }

    #[test]
    fn test_blank_secret_is_empty() {
        assert!(SecureString::default().is_empty());
        assert!(SecureString::new("   ").is_empty());
        assert!(!SecureString::new("k").is_empty());
    }

    #[test]
    fn test_deserialize_from_config_value() {
        let secret: SecureString = serde_json::from_str("\"abc123\"").unwrap();
        assert_eq!(secret, SecureString::new("abc123"));
    }
}
