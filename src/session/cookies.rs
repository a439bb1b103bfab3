//! Cookie-header parsing
//!
//! Operators paste the value of a browser's `Cookie:` header. Each
//! `;`-separated segment is split at its first `=` only, so base64
//! padding and other `=` characters inside a value survive.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// Cookie name used when a bare session identifier is pasted
pub const BARE_SESSION_COOKIE: &str = "PHPSESSID";

/// Shortest bare value accepted as a session identifier
const MIN_BARE_SESSION_LEN: usize = 16;

/// A name/value pair extracted from a raw cookie string
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Credential {
    pub name: String,
    pub value: String,
}

impl Credential {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    /// Parse a single `name=value` pair, splitting at the first `=`
    pub fn parse(pair: &str) -> Result<Self, InputError> {
        let pair = pair.trim();
        let (name, value) = pair.split_once('=').ok_or_else(|| InputError::MalformedCookie {
            segment: pair.to_string(),
        })?;

        let name = name.trim();
        if name.is_empty() {
            return Err(InputError::EmptyCookieName {
                segment: pair.to_string(),
            });
        }

        Ok(Self::new(name, value.trim()))
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Normalized set of credentials, keyed by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSet {
    entries: BTreeMap<String, String>,
}

impl CredentialSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a credential; a later value for the same name wins
    pub fn insert(&mut self, credential: Credential) {
        self.entries.insert(credential.name, credential.value);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(|v| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(|k| k.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = Credential> + '_ {
        self.entries.iter().map(|(k, v)| Credential::new(k, v))
    }

    /// Render in cookie-header syntax (`a=1; b=2`)
    pub fn to_header(&self) -> String {
        self.iter().map(|c| c.to_string()).collect::<Vec<_>>().join("; ")
    }

    /// Build from a header a cookie store produced; segments that are
    /// not `name=value` are skipped instead of reported
    pub fn from_header_lenient(header: &str) -> Self {
        let mut set = Self::new();
        for segment in header.split(';') {
            if let Ok(credential) = Credential::parse(segment) {
                set.insert(credential);
            }
        }
        set
    }
}

impl FromIterator<Credential> for CredentialSet {
    fn from_iter<I: IntoIterator<Item = Credential>>(iter: I) -> Self {
        let mut set = Self::new();
        for credential in iter {
            set.insert(credential);
        }
        set
    }
}

/// Outcome of parsing an operator-supplied cookie string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCookies {
    pub credentials: CredentialSet,
    /// Set when a bare identifier was wrapped as `PHPSESSID=<value>`
    pub auto_wrapped: bool,
}

/// Parse a raw cookie-header string into a credential set.
///
/// Accepts an optional `Cookie:` prefix. Empty segments (a trailing
/// `;`) are ignored; any other segment without `=` is an error, except
/// a lone opaque identifier, which is wrapped as a `PHPSESSID` cookie.
pub fn parse_cookie_string(raw: &str) -> Result<ParsedCookies, InputError> {
    let cleaned = strip_header_name(raw.trim());

    let segments: Vec<&str> = cleaned
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if segments.is_empty() {
        return Err(InputError::EmptyCookieString);
    }

    if let [single] = segments.as_slice() {
        if looks_like_session_id(single) {
            tracing::warn!(
                cookie = BARE_SESSION_COOKIE,
                "Cookie string has no name, treating it as a {} value",
                BARE_SESSION_COOKIE
            );
            let mut credentials = CredentialSet::new();
            credentials.insert(Credential::new(BARE_SESSION_COOKIE, single));
            return Ok(ParsedCookies {
                credentials,
                auto_wrapped: true,
            });
        }
    }

    let mut credentials = CredentialSet::new();
    for segment in segments {
        credentials.insert(Credential::parse(segment)?);
    }

    Ok(ParsedCookies {
        credentials,
        auto_wrapped: false,
    })
}

fn strip_header_name(raw: &str) -> &str {
    const PREFIX: &str = "cookie:";
    match raw.get(..PREFIX.len()) {
        Some(head) if head.eq_ignore_ascii_case(PREFIX) => raw[PREFIX.len()..].trim_start(),
        _ => raw,
    }
}

fn looks_like_session_id(segment: &str) -> bool {
    segment.len() >= MIN_BARE_SESSION_LEN
        && !segment.contains('=')
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == ',' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parses_simple_pairs() {
        let parsed = parse_cookie_string("sessionid=abc123; role=guest").unwrap();
        assert!(!parsed.auto_wrapped);
        assert_eq!(parsed.credentials.len(), 2);
        assert_eq!(parsed.credentials.get("sessionid"), Some("abc123"));
        assert_eq!(parsed.credentials.get("role"), Some("guest"));
    }

    #[test]
    fn test_value_keeps_equals_signs() {
        let parsed = parse_cookie_string("Cookie: auth=dGVzdA==; theme=dark").unwrap();
        assert_eq!(parsed.credentials.get("auth"), Some("dGVzdA=="));
        assert_eq!(parsed.credentials.get("theme"), Some("dark"));
    }

    #[test]
    fn test_header_prefix_is_case_insensitive() {
        let parsed = parse_cookie_string("cookie:wordpress_logged_in_abc=admin%7C1700").unwrap();
        assert_eq!(parsed.credentials.get("wordpress_logged_in_abc"), Some("admin%7C1700"));
    }

    #[test]
    fn test_segment_without_equals_is_reported() {
        let err = parse_cookie_string("a=1; garbage; b=2").unwrap_err();
        assert_eq!(
            err,
            InputError::MalformedCookie {
                segment: "garbage".to_string()
            }
        );
    }

    #[test]
    fn test_empty_name_is_reported() {
        let err = parse_cookie_string("=value").unwrap_err();
        assert!(matches!(err, InputError::EmptyCookieName { .. }));
    }

    #[test]
    fn test_empty_input_is_reported() {
        assert_eq!(parse_cookie_string("  ; ").unwrap_err(), InputError::EmptyCookieString);
        assert_eq!(parse_cookie_string("Cookie: ").unwrap_err(), InputError::EmptyCookieString);
    }

    #[test]
    fn test_bare_session_id_is_wrapped() {
        let parsed = parse_cookie_string("8f14e45fceea167a5a36dedd4bea2543").unwrap();
        assert!(parsed.auto_wrapped);
        assert_eq!(
            parsed.credentials.get(BARE_SESSION_COOKIE),
            Some("8f14e45fceea167a5a36dedd4bea2543")
        );
    }

    #[test]
    fn test_short_bare_value_is_not_wrapped() {
        let err = parse_cookie_string("abc").unwrap_err();
        assert!(matches!(err, InputError::MalformedCookie { .. }));
    }

    #[test]
    fn test_trailing_separator_is_ignored() {
        let parsed = parse_cookie_string("a=1;").unwrap();
        assert_eq!(parsed.credentials.to_header(), "a=1");
    }

    #[test]
    fn test_lenient_header_skips_invalid() {
        let set = CredentialSet::from_header_lenient("a=1; junk; b=x=y");
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("b"), Some("x=y"));
    }

    proptest! {
        #[test]
        fn prop_parse_is_idempotent(
            pairs in proptest::collection::vec(("[A-Za-z_][A-Za-z0-9_]{0,12}", "[A-Za-z0-9=%+/_.-]{0,24}"), 1..6)
        ) {
            let raw = pairs
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("; ");

            let first = parse_cookie_string(&raw).unwrap().credentials;
            let second = parse_cookie_string(&first.to_header()).unwrap().credentials;
            prop_assert_eq!(first, second);
        }
    }
}
