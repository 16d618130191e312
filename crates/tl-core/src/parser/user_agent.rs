//! User-agent parsing.
//!
//! A small grammar of ordered regex tables in the uap-core style: the first
//! matching rule in each table (browser, OS, device) wins, and anything that
//! matches nothing falls back to `"Other"`.

use regex::{Captures, Regex};
use serde::{Serialize, Serializer};
use std::sync::OnceLock;
use tl_connectors::LookupKey;
use tracing::warn;

const OTHER: &str = "Other";

/// Classification of a user-agent string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UserAgentStatus {
    /// Missing or blank.
    Empty,
    /// Unrecognized (browser, OS and device all `"Other"`) or unparsable.
    Invalid,
    Valid,
}

/// Approximate age of a browser release, in years.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAgentAge {
    Years(i32),
    /// The computed age was zero or negative.
    Current,
}

impl UserAgentAge {
    pub fn from_major_version(current_year: i32, major_version: u32) -> Self {
        let age = i64::from(current_year) - i64::from(major_version);
        if age > 0 {
            UserAgentAge::Years(i32::try_from(age).unwrap_or(i32::MAX))
        } else {
            UserAgentAge::Current
        }
    }
}

impl Serialize for UserAgentAge {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            UserAgentAge::Years(years) => serializer.serialize_i32(*years),
            UserAgentAge::Current => serializer.serialize_str("current"),
        }
    }
}

/// Parsed user-agent attributes.
///
/// An `empty` result carries only `status`; so does an `invalid` result
/// produced when the grammar itself is unusable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserAgentDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    pub status: UserAgentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent_age: Option<UserAgentAge>,
}

impl UserAgentDetails {
    fn status_only(status: UserAgentStatus) -> Self {
        Self {
            browser: None,
            browser_version: None,
            os: None,
            os_version: None,
            device: None,
            status,
            user_agent_age: None,
        }
    }

    pub fn empty() -> Self {
        Self::status_only(UserAgentStatus::Empty)
    }

    pub fn unparsable() -> Self {
        Self::status_only(UserAgentStatus::Invalid)
    }
}

/// A user agent after parsing, with the key used for provider lookups.
#[derive(Debug, Clone)]
pub struct ParsedUserAgent {
    pub details: UserAgentDetails,
    pub key: Option<LookupKey>,
}

/// Parses `raw` against the grammar. `current_year` feeds `user_agent_age`.
pub fn parse_user_agent(raw: Option<&str>, current_year: i32) -> ParsedUserAgent {
    let Some(key) = raw.and_then(LookupKey::user_agent) else {
        return ParsedUserAgent {
            details: UserAgentDetails::empty(),
            key: None,
        };
    };

    let grammar = match grammar() {
        Ok(grammar) => grammar,
        Err(e) => {
            warn!(error = %e, "User-agent grammar unavailable");
            return ParsedUserAgent {
                details: UserAgentDetails::unparsable(),
                key: Some(key),
            };
        }
    };

    let ua = key.as_str();
    let browser = grammar.browser.first_match(ua);
    let os = grammar.os.first_match(ua);
    let device = grammar.device.first_match(ua);

    let status = if browser.family == OTHER && os.family == OTHER && device.family == OTHER {
        UserAgentStatus::Invalid
    } else {
        UserAgentStatus::Valid
    };
    let major = browser
        .version
        .first()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(0);

    ParsedUserAgent {
        details: UserAgentDetails {
            browser_version: Some(browser.version.join(".")),
            browser: Some(browser.family),
            os_version: Some(os.version.join(".")),
            os: Some(os.family),
            device: Some(device.family),
            status,
            user_agent_age: Some(UserAgentAge::from_major_version(current_year, major)),
        },
        key: Some(key),
    }
}

struct Grammar {
    browser: RuleTable,
    os: RuleTable,
    device: RuleTable,
}

static GRAMMAR: OnceLock<Result<Grammar, String>> = OnceLock::new();

fn grammar() -> Result<&'static Grammar, &'static str> {
    GRAMMAR
        .get_or_init(|| {
            Ok(Grammar {
                browser: RuleTable::compile(BROWSER_RULES)?,
                os: RuleTable::compile(OS_RULES)?,
                device: RuleTable::compile(DEVICE_RULES)?,
            })
        })
        .as_ref()
        .map_err(String::as_str)
}

/// How a rule names what it matched.
#[derive(Clone, Copy)]
enum Family {
    /// Capture group 1 is the family; version groups start at 2.
    Captured,
    /// A fixed name; version groups start at 1.
    Named(&'static str),
    /// A fixed name and a fixed version string.
    NamedVersion(&'static str, &'static str),
}

struct RuleDef {
    pattern: &'static str,
    family: Family,
}

const fn rule(pattern: &'static str, family: Family) -> RuleDef {
    RuleDef { pattern, family }
}

struct Rule {
    regex: Regex,
    family: Family,
}

struct Matched {
    family: String,
    version: Vec<String>,
}

struct RuleTable(Vec<Rule>);

impl RuleTable {
    fn compile(defs: &[RuleDef]) -> Result<Self, String> {
        defs.iter()
            .map(|def| {
                Regex::new(def.pattern)
                    .map(|regex| Rule {
                        regex,
                        family: def.family,
                    })
                    .map_err(|e| format!("bad pattern {:?}: {}", def.pattern, e))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(RuleTable)
    }

    fn first_match(&self, ua: &str) -> Matched {
        for rule in &self.0 {
            if let Some(caps) = rule.regex.captures(ua) {
                return rule.extract(&caps);
            }
        }
        Matched {
            family: OTHER.to_string(),
            version: Vec::new(),
        }
    }
}

impl Rule {
    fn extract(&self, caps: &Captures<'_>) -> Matched {
        let (family, first_version_group) = match self.family {
            Family::Captured => (
                caps.get(1).map_or(OTHER, |m| m.as_str()).to_string(),
                2,
            ),
            Family::Named(name) => (name.to_string(), 1),
            Family::NamedVersion(name, version) => {
                return Matched {
                    family: name.to_string(),
                    version: version.split('.').map(str::to_string).collect(),
                }
            }
        };

        // At most major.minor.patch, stopping at the first missing group.
        let version = (first_version_group..first_version_group + 3)
            .map_while(|i| caps.get(i))
            .map(|m| m.as_str().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Matched { family, version }
    }
}

macro_rules! versioned {
    ($prefix:literal) => {
        concat!($prefix, r"(\d+)(?:\.(\d+))?(?:\.(\d+))?")
    };
}

const BROWSER_RULES: &[RuleDef] = &[
    // Crawlers first: they often embed a browser token.
    rule(r"(Googlebot|bingbot|YandexBot|DuckDuckBot|Baiduspider|AhrefsBot|SemrushBot|Applebot|facebookexternalhit|Twitterbot)(?:/(\d+)(?:\.(\d+))?)?", Family::Captured),
    rule(versioned!(r"(?:Edge|Edg|EdgA|EdgiOS)/"), Family::Named("Edge")),
    rule(versioned!(r"(?:OPR|OPiOS)/"), Family::Named("Opera")),
    rule(versioned!(r"SamsungBrowser/"), Family::Named("Samsung Internet")),
    rule(versioned!(r"YaBrowser/"), Family::Named("Yandex Browser")),
    rule(versioned!(r"(Vivaldi)/"), Family::Captured),
    rule(versioned!(r"CriOS/"), Family::Named("Chrome Mobile iOS")),
    rule(versioned!(r"FxiOS/"), Family::Named("Firefox iOS")),
    rule(versioned!(r"Mobile.*Firefox/"), Family::Named("Firefox Mobile")),
    rule(versioned!(r"(Firefox)/"), Family::Captured),
    rule(versioned!(r"Android.*Chrome/"), Family::Named("Chrome Mobile")),
    rule(versioned!(r"(Chromium)/"), Family::Captured),
    rule(versioned!(r"(Chrome)/"), Family::Captured),
    rule(r"MSIE (\d+)\.(\d+)", Family::Named("IE")),
    rule(r"Trident/.*rv:(\d+)\.(\d+)", Family::Named("IE")),
    rule(r"Version/(\d+)\.(\d+)(?:\.(\d+))?.*Mobile/.*Safari/", Family::Named("Mobile Safari")),
    rule(r"Version/(\d+)\.(\d+)(?:\.(\d+))?.*Safari/", Family::Named("Safari")),
    rule(versioned!(r"(curl|Wget|python-requests|Go-http-client|okhttp|PostmanRuntime|Java)/"), Family::Captured),
];

const OS_RULES: &[RuleDef] = &[
    rule(r"Windows Phone (?:OS )?(\d+)\.(\d+)", Family::Named("Windows Phone")),
    rule(r"Windows NT 10\.0", Family::NamedVersion("Windows", "10")),
    rule(r"Windows NT 6\.3", Family::NamedVersion("Windows", "8.1")),
    rule(r"Windows NT 6\.2", Family::NamedVersion("Windows", "8")),
    rule(r"Windows NT 6\.1", Family::NamedVersion("Windows", "7")),
    rule(r"Windows NT 6\.0", Family::NamedVersion("Windows", "Vista")),
    rule(r"Windows NT 5\.[12]", Family::NamedVersion("Windows", "XP")),
    rule(r"Windows", Family::Named("Windows")),
    rule(r"(?:iPhone|iPad|iPod).*? OS (\d+)_(\d+)(?:_(\d+))?", Family::Named("iOS")),
    rule(r"CrOS [^ ]+ (\d+)\.(\d+)(?:\.(\d+))?", Family::Named("Chrome OS")),
    rule(r"Mac OS X (\d+)[_.](\d+)(?:[_.](\d+))?", Family::Named("Mac OS X")),
    rule(r"Mac OS X", Family::Named("Mac OS X")),
    rule(r"(Android)(?:[ /-](\d+)(?:\.(\d+))?(?:\.(\d+))?)?", Family::Captured),
    rule(r"(Ubuntu|Fedora|Debian)(?:[ /](\d+)(?:\.(\d+))?)?", Family::Captured),
    rule(r"Linux", Family::Named("Linux")),
];

const DEVICE_RULES: &[RuleDef] = &[
    rule(r"(?i)bot\b|spider|crawl|slurp|facebookexternalhit", Family::Named("Spider")),
    rule(r"iPad", Family::Named("iPad")),
    rule(r"iPod", Family::Named("iPod")),
    rule(r"iPhone", Family::Named("iPhone")),
    rule(r"Android[^;)]*; (?:[a-z]{2}[-_][a-zA-Z]{2}; )?([^;)]+?)(?: Build/[^;)]*)?\)", Family::Captured),
    rule(r"Android", Family::Named("Generic Smartphone")),
    rule(r"Macintosh", Family::Named("Mac")),
    rule(r"Windows NT|X11|CrOS", Family::Named("PC")),
];

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const YEAR: i32 = 2024;

    fn parse(ua: &str) -> UserAgentDetails {
        parse_user_agent(Some(ua), YEAR).details
    }

    #[test]
    fn test_grammar_compiles() {
        assert!(grammar().is_ok());
    }

    #[test]
    fn test_chrome_on_windows() {
        let details = parse(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.36",
        );
        assert_eq!(details.status, UserAgentStatus::Valid);
        assert_eq!(details.browser.as_deref(), Some("Chrome"));
        assert_eq!(details.browser_version.as_deref(), Some("58.0.3029"));
        assert_eq!(details.os.as_deref(), Some("Windows"));
        assert_eq!(details.os_version.as_deref(), Some("10"));
        assert_eq!(details.device.as_deref(), Some("PC"));
        assert_eq!(details.user_agent_age, Some(UserAgentAge::Years(YEAR - 58)));
    }

    #[test]
    fn test_safari_on_iphone() {
        let details = parse(
            "Mozilla/5.0 (iPhone; CPU iPhone OS 16_5 like Mac OS X) AppleWebKit/605.1.15 \
             (KHTML, like Gecko) Version/16.5 Mobile/15E148 Safari/604.1",
        );
        assert_eq!(details.browser.as_deref(), Some("Mobile Safari"));
        assert_eq!(details.browser_version.as_deref(), Some("16.5"));
        assert_eq!(details.os.as_deref(), Some("iOS"));
        assert_eq!(details.os_version.as_deref(), Some("16.5"));
        assert_eq!(details.device.as_deref(), Some("iPhone"));
    }

    #[test]
    fn test_firefox_on_mac() {
        let details = parse(
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:109.0) Gecko/20100101 Firefox/115.0",
        );
        assert_eq!(details.browser.as_deref(), Some("Firefox"));
        assert_eq!(details.os.as_deref(), Some("Mac OS X"));
        assert_eq!(details.os_version.as_deref(), Some("10.15"));
        assert_eq!(details.device.as_deref(), Some("Mac"));
    }

    #[test]
    fn test_edge_and_android_model() {
        let edge = parse(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
             Chrome/120.0.0.0 Safari/537.36 Edg/120.0.2210.91",
        );
        assert_eq!(edge.browser.as_deref(), Some("Edge"));
        assert_eq!(edge.browser_version.as_deref(), Some("120.0.2210"));

        let android = parse(
            "Mozilla/5.0 (Linux; Android 13; SM-S918B) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/116.0.0.0 Mobile Safari/537.36",
        );
        assert_eq!(android.browser.as_deref(), Some("Chrome Mobile"));
        assert_eq!(android.os.as_deref(), Some("Android"));
        assert_eq!(android.os_version.as_deref(), Some("13"));
        assert_eq!(android.device.as_deref(), Some("SM-S918B"));
    }

    #[test]
    fn test_crawler_is_spider() {
        let details = parse(
            "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)",
        );
        assert_eq!(details.browser.as_deref(), Some("Googlebot"));
        assert_eq!(details.browser_version.as_deref(), Some("2.1"));
        assert_eq!(details.device.as_deref(), Some("Spider"));
        assert_eq!(details.status, UserAgentStatus::Valid);
    }

    #[test]
    fn test_unrecognized_is_invalid() {
        let details = parse("invalid_user_agent");
        assert_eq!(details.status, UserAgentStatus::Invalid);
        assert_eq!(details.browser.as_deref(), Some("Other"));
        assert_eq!(details.os.as_deref(), Some("Other"));
        assert_eq!(details.device.as_deref(), Some("Other"));
        assert_eq!(details.browser_version.as_deref(), Some(""));
        assert_eq!(details.user_agent_age, Some(UserAgentAge::Years(YEAR)));
    }

    #[test]
    fn test_empty_and_blank() {
        let parsed = parse_user_agent(None, YEAR);
        assert_eq!(parsed.details, UserAgentDetails::empty());
        assert!(parsed.key.is_none());

        let parsed = parse_user_agent(Some("   "), YEAR);
        assert_eq!(parsed.details.status, UserAgentStatus::Empty);
        assert!(parsed.key.is_none());
        assert_eq!(
            serde_json::to_value(&parsed.details).unwrap(),
            json!({"status": "empty"})
        );
    }

    #[test]
    fn test_age_serialization() {
        assert_eq!(UserAgentAge::from_major_version(2024, 2024), UserAgentAge::Current);
        assert_eq!(UserAgentAge::from_major_version(2024, 3000), UserAgentAge::Current);
        assert_eq!(UserAgentAge::from_major_version(2024, 120), UserAgentAge::Years(1904));
        assert_eq!(serde_json::to_value(UserAgentAge::Current).unwrap(), json!("current"));
        assert_eq!(serde_json::to_value(UserAgentAge::Years(5)).unwrap(), json!(5));
    }

    #[test]
    fn test_key_is_trimmed_user_agent() {
        let parsed = parse_user_agent(Some(" curl/8.4.0 "), YEAR);
        let key = parsed.key.unwrap();
        assert_eq!(key.as_str(), "curl/8.4.0");
        assert_eq!(parsed.details.browser.as_deref(), Some("curl"));
        assert_eq!(parsed.details.browser_version.as_deref(), Some("8.4.0"));
    }
}
