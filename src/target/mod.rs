//! Audit target description
//!
//! A [`TargetConfig`] is built once per run from operator input and is
//! read-only afterwards. It owns the base URL every request path is
//! resolved against, the application variant whose markers drive
//! classification, and the client identity.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{HttpError, InputError};

/// Default client identity, a desktop Chrome build
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Application family the target runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetVariant {
    WordPress,
    PrestaShop,
    Generic,
}

impl TargetVariant {
    pub fn all() -> &'static [TargetVariant] {
        &[
            TargetVariant::WordPress,
            TargetVariant::PrestaShop,
            TargetVariant::Generic,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            TargetVariant::WordPress => "wordpress",
            TargetVariant::PrestaShop => "prestashop",
            TargetVariant::Generic => "generic",
        }
    }

    /// Candidate administrative paths used when the operator supplies none
    pub fn default_paths(&self) -> Vec<String> {
        let paths: &[&str] = match self {
            TargetVariant::WordPress => &["wp-admin/", "wp-admin/index.php", "wp-admin/profile.php"],
            TargetVariant::PrestaShop => &[
                "admin",
                "backoffice",
                "dashboard",
                "adm",
                "administrador",
                "admin-dev/",
            ],
            TargetVariant::Generic => &["admin", "dashboard"],
        };
        paths.iter().map(|p| p.to_string()).collect()
    }

    /// Built-in classification markers for this variant
    pub fn default_markers(&self) -> MarkerSet {
        match self {
            TargetVariant::WordPress => MarkerSet {
                positive_body: strings(&[
                    "wp-admin-bar",
                    "Howdy",
                    "Log Out",
                    "Cerrar sesión",
                    "Escritorio",
                    "Dashboard",
                ]),
                positive_url: strings(&["wp-admin"]),
                negative_body: strings(&[
                    "Page not found",
                    "Página no encontrada",
                    "Nothing Found",
                    "wp-die-message",
                ]),
                login_url: strings(&["wp-login.php"]),
            },
            TargetVariant::PrestaShop => MarkerSet {
                positive_body: strings(&[
                    "employee_box",
                    "logout",
                    "Cerrar sesión",
                    "Avatar",
                    "class=\"bootstrap\"",
                ]),
                positive_url: Vec::new(),
                negative_body: strings(&[
                    "Page not found",
                    "Página no encontrada",
                    "The page you are looking for was not found",
                ]),
                login_url: strings(&["login"]),
            },
            TargetVariant::Generic => MarkerSet {
                positive_body: strings(&["logout", "Log out", "Sign out"]),
                positive_url: Vec::new(),
                negative_body: strings(&["Page not found", "404 Not Found", "does not exist"]),
                login_url: strings(&["login", "signin"]),
            },
        }
    }
}

impl fmt::Display for TargetVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TargetVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "wordpress" | "wp" => Ok(TargetVariant::WordPress),
            "prestashop" | "ps" => Ok(TargetVariant::PrestaShop),
            "generic" => Ok(TargetVariant::Generic),
            other => Err(format!("unknown target variant: {}", other)),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Keyword sets that drive soft-404 aware classification
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerSet {
    /// Body fragments that only appear inside an authenticated area
    pub positive_body: Vec<String>,
    /// Final-URL fragments that indicate the privileged area was reached
    pub positive_url: Vec<String>,
    /// Body fragments of "not found" and error pages served with 200
    pub negative_body: Vec<String>,
    /// Final-URL fragments of the login form (redirect bounce)
    pub login_url: Vec<String>,
}

/// Immutable description of the audit target
#[derive(Debug, Clone)]
pub struct TargetConfig {
    base_url: Url,
    variant: TargetVariant,
    user_agent: String,
    timeout: Duration,
}

impl TargetConfig {
    /// Build a target from a raw address such as `example.com` or
    /// `https://example.com/shop`
    pub fn new(raw: &str, variant: TargetVariant) -> Result<Self, InputError> {
        let base_url = normalize_base_url(raw)?;
        Ok(Self {
            base_url,
            variant,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(20),
        })
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn variant(&self) -> TargetVariant {
        self.variant
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Host the session cookies are scoped to
    pub fn domain(&self) -> &str {
        self.base_url.host_str().unwrap_or_default()
    }

    /// Resolve a caller path against the base URL.
    ///
    /// Relative and rooted paths both land under the base path. An
    /// absolute URL already under the base path keeps its path; any
    /// other absolute URL is reduced to its path and query first. The
    /// result always shares the base URL's origin.
    pub fn resolve(&self, path: &str) -> Result<Url, HttpError> {
        let trimmed = path.trim();
        let invalid = |reason: String| HttpError::InvalidUrl(format!("{}: {}", trimmed, reason));

        let relative = match Url::parse(trimmed) {
            Ok(absolute) if absolute.scheme() == "http" || absolute.scheme() == "https" => {
                if absolute.path().starts_with(self.base_url.path()) {
                    let mut url = self.base_url.clone();
                    url.set_path(absolute.path());
                    url.set_query(absolute.query());
                    return Ok(url);
                }
                match absolute.query() {
                    Some(q) => format!("{}?{}", absolute.path(), q),
                    None => absolute.path().to_string(),
                }
            }
            Ok(other) => return Err(invalid(format!("unsupported scheme '{}'", other.scheme()))),
            Err(_) => trimmed.to_string(),
        };

        let url = self
            .base_url
            .join(relative.trim_start_matches(['/', '\\']))
            .map_err(|e| invalid(e.to_string()))?;
        if url.origin() != self.base_url.origin() {
            return Err(invalid(format!("leaves target origin {}", self.base_url.origin().ascii_serialization())));
        }
        Ok(url)
    }
}

fn normalize_base_url(raw: &str) -> Result<Url, InputError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(InputError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: "empty address".to_string(),
        });
    }

    let mut candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{}", raw)
    };
    if !candidate.ends_with('/') {
        candidate.push('/');
    }

    let url = Url::parse(&candidate).map_err(|e| InputError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(InputError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    if url.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(InputError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: "missing host".to_string(),
        });
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_scheme_and_trailing_slash() {
        let target = TargetConfig::new("example.com/shop", TargetVariant::PrestaShop).unwrap();
        assert_eq!(target.base_url().as_str(), "http://example.com/shop/");
        assert_eq!(target.domain(), "example.com");
    }

    #[test]
    fn test_rejects_unsupported_scheme() {
        let err = TargetConfig::new("ftp://example.com", TargetVariant::Generic).unwrap_err();
        assert!(matches!(err, InputError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn test_resolve_relative_rooted_and_absolute() {
        let target = TargetConfig::new("https://example.com/blog/", TargetVariant::WordPress).unwrap();

        assert_eq!(
            target.resolve("wp-admin/").unwrap().as_str(),
            "https://example.com/blog/wp-admin/"
        );
        assert_eq!(
            target.resolve("/wp-admin/profile.php").unwrap().as_str(),
            "https://example.com/blog/wp-admin/profile.php"
        );
        assert_eq!(
            target.resolve("https://example.com/wp-admin/?page=1").unwrap().as_str(),
            "https://example.com/blog/wp-admin/?page=1"
        );
        assert_eq!(
            target.resolve("http://example.com/blog/wp-admin/user-new.php").unwrap().as_str(),
            "https://example.com/blog/wp-admin/user-new.php"
        );
    }

    #[test]
    fn test_resolve_never_leaves_the_target_host() {
        let target = TargetConfig::new("http://shop.test/", TargetVariant::Generic).unwrap();

        let upper = target.resolve("HTTP://evil.test/steal").unwrap();
        assert_eq!(upper.host_str(), Some("shop.test"));
        assert_eq!(upper.path(), "/steal");

        let backslashes = target.resolve("\\\\evil.test/steal").unwrap();
        assert_eq!(backslashes.host_str(), Some("shop.test"));

        let mixed = target.resolve("/\\evil.test/steal").unwrap();
        assert_eq!(mixed.host_str(), Some("shop.test"));

        assert!(matches!(target.resolve("javascript:alert(1)"), Err(HttpError::InvalidUrl(_))));
    }

    #[test]
    fn test_variant_parsing() {
        assert_eq!("WP".parse::<TargetVariant>().unwrap(), TargetVariant::WordPress);
        assert_eq!("prestashop".parse::<TargetVariant>().unwrap(), TargetVariant::PrestaShop);
        assert!("drupal".parse::<TargetVariant>().is_err());
    }

    #[test]
    fn test_every_variant_has_paths_and_markers() {
        for variant in TargetVariant::all() {
            assert!(!variant.default_paths().is_empty());
            assert!(!variant.default_markers().negative_body.is_empty());
        }
    }
}
