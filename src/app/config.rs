//! Engine configuration management

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::combinators::RetryPolicy;
use crate::error::ConfigError;
use crate::target::{MarkerSet, TargetVariant, DEFAULT_USER_AGENT};

/// Main engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Config {
    /// HTTP conversation settings
    pub session: SessionConfig,

    /// Endpoint discovery settings
    pub prober: ProberConfig,

    /// Token mutation settings
    pub forge: ForgeConfig,

    /// Replay settings
    pub attack: AttackConfig,

    /// Retry policy for login attempts
    pub retry: RetryPolicy,

    /// Classification markers per application variant
    pub markers: MarkersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// User agent string
    pub user_agent: String,

    /// Maximum redirect depth
    pub max_redirects: usize,

    /// Accept self-signed or otherwise invalid TLS certificates
    pub accept_invalid_certs: bool,

    /// Cookie the bearer token is mirrored into
    pub token_cookie_name: String,

    /// Mirror the bearer token into `token_cookie_name`
    pub token_cookie_sync: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProberConfig {
    /// Maximum simultaneous probe requests
    pub max_concurrent: usize,

    /// Body bytes kept as evidence per probe
    pub max_evidence_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    /// Algorithm values tried by the downgrade attack, in order
    pub downgrade_algorithms: Vec<String>,

    /// Candidate HMAC secrets
    pub wordlist: Vec<String>,

    /// Claims merged into every forged payload
    pub claim_overrides: serde_json::Map<String, serde_json::Value>,

    /// Emit the null-key `kid` traversal variant
    pub kid_traversal: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackConfig {
    /// Stop the replay loop at the first bypass
    pub stop_on_first_success: bool,
}

/// Per-variant markers. A list left out of `[markers.<variant>]` keeps
/// the variant's built-in value.
#[derive(Debug, Clone, Serialize)]
pub struct MarkersConfig {
    pub wordpress: MarkerSet,
    pub prestashop: MarkerSet,
    pub generic: MarkerSet,
}

/// Marker lists as written in the file; absent lists are `None`
#[derive(Debug, Default, Deserialize)]
struct MarkerOverrides {
    positive_body: Option<Vec<String>>,
    positive_url: Option<Vec<String>>,
    negative_body: Option<Vec<String>>,
    login_url: Option<Vec<String>>,
}

impl MarkerOverrides {
    fn apply_to(self, variant: TargetVariant) -> MarkerSet {
        let defaults = variant.default_markers();
        MarkerSet {
            positive_body: self.positive_body.unwrap_or(defaults.positive_body),
            positive_url: self.positive_url.unwrap_or(defaults.positive_url),
            negative_body: self.negative_body.unwrap_or(defaults.negative_body),
            login_url: self.login_url.unwrap_or(defaults.login_url),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MarkersFile {
    wordpress: MarkerOverrides,
    prestashop: MarkerOverrides,
    generic: MarkerOverrides,
}

impl<'de> Deserialize<'de> for MarkersConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let file = MarkersFile::deserialize(deserializer)?;
        Ok(Self {
            wordpress: file.wordpress.apply_to(TargetVariant::WordPress),
            prestashop: file.prestashop.apply_to(TargetVariant::PrestaShop),
            generic: file.generic.apply_to(TargetVariant::Generic),
        })
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_redirects: 10,
            accept_invalid_certs: false,
            token_cookie_name: "token".to_string(),
            token_cookie_sync: true,
        }
    }
}

impl SessionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ProberConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 20,
            max_evidence_bytes: 64 * 1024,
        }
    }
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            downgrade_algorithms: vec!["None".to_string(), "none".to_string(), "NONE".to_string()],
            wordlist: default_wordlist(),
            claim_overrides: serde_json::Map::new(),
            kid_traversal: true,
        }
    }
}

/// Common weak HMAC secrets
fn default_wordlist() -> Vec<String> {
    [
        "secret",
        "password",
        "123456",
        "jwt",
        "key",
        "private",
        "test",
        "admin",
        "root",
        "changeme",
        "letmein",
        "qwerty",
        "abc123",
        "password123",
        "supersecret",
        "mysecret",
        "secretkey",
        "jwt-secret",
        "your-256-bit-secret",
        "",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            stop_on_first_success: false,
        }
    }
}

impl Default for MarkersConfig {
    fn default() -> Self {
        Self {
            wordpress: TargetVariant::WordPress.default_markers(),
            prestashop: TargetVariant::PrestaShop.default_markers(),
            generic: TargetVariant::Generic.default_markers(),
        }
    }
}

impl MarkersConfig {
    pub fn for_variant(&self, variant: TargetVariant) -> &MarkerSet {
        match variant {
            TargetVariant::WordPress => &self.wordpress,
            TargetVariant::PrestaShop => &self.prestashop,
            TargetVariant::Generic => &self.generic,
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults when the
    /// file does not exist
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(p) => PathBuf::from(p),
            None => match Self::default_config_path() {
                Ok(p) => p,
                Err(e) => {
                    tracing::debug!("No config directory available: {}", e);
                    return Ok(Self::default());
                }
            },
        };

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(|source| ConfigError::ReadError {
                path: config_path.display().to_string(),
                source,
            })?;

            let config: Config =
                toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

            tracing::info!("Loaded configuration from {:?}", config_path);
            Ok(config)
        } else {
            tracing::info!("No configuration file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prober.max_concurrent == 0 {
            return Err(invalid("prober.max_concurrent", "must be greater than 0"));
        }
        if self.session.timeout_secs == 0 {
            return Err(invalid("session.timeout_secs", "must be greater than 0"));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts", "must be greater than 0"));
        }
        if self.session.token_cookie_name.trim().is_empty() {
            return Err(invalid("session.token_cookie_name", "must not be empty"));
        }
        Ok(())
    }

    /// Render as TOML
    pub fn to_toml(&self) -> anyhow::Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    /// Get default configuration file path
    fn default_config_path() -> anyhow::Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("io", "gatecrash", "gatecrash")
            .context("Failed to determine config directory")?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get data directory path
    pub fn data_dir() -> anyhow::Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("io", "gatecrash", "gatecrash")
            .context("Failed to determine data directory")?;

        Ok(dirs.data_dir().to_path_buf())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
