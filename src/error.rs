//! Custom error types for Gatecrash
//!
//! Transport failures and malformed operator input are kept apart:
//! the first kind is recorded per request and never stops a run, the
//! second kind aborts only the call that received the bad input.

use thiserror::Error;

/// Main error type for Gatecrash operations
#[derive(Error, Debug)]
pub enum GatecrashError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    /// Malformed operator input (cookie strings, tokens, URLs)
    #[error("Input error: {0}")]
    Input(#[from] InputError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {path}")]
    ReadError { path: String, source: std::io::Error },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration value: {field} - {reason}")]
    ValidationError { field: String, reason: String },
}

/// HTTP transport errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("TLS error: {0}")]
    TlsError(String),
}

impl HttpError {
    /// Classify a reqwest error into the transport taxonomy
    pub fn from_reqwest(err: &reqwest::Error, timeout_ms: u64) -> Self {
        if err.is_timeout() {
            HttpError::Timeout(timeout_ms)
        } else if err.is_connect() {
            let text = err.to_string();
            if text.to_lowercase().contains("certificate") || text.to_lowercase().contains("tls") {
                HttpError::TlsError(text)
            } else {
                HttpError::ConnectionError(text)
            }
        } else if err.is_builder() {
            HttpError::InvalidUrl(err.to_string())
        } else {
            HttpError::RequestFailed(err.to_string())
        }
    }

    /// Whether retrying the same request could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, HttpError::Timeout(_) | HttpError::ConnectionError(_))
    }
}

/// Malformed input errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("Cookie string is empty")]
    EmptyCookieString,

    #[error("Cookie segment '{segment}' has no '=' separator")]
    MalformedCookie { segment: String },

    #[error("Cookie segment '{segment}' has an empty name")]
    EmptyCookieName { segment: String },

    #[error("Token must have 3 dot-separated segments, got {segments}")]
    MalformedToken { segments: usize },

    #[error("Token segment {index} is invalid: {reason}")]
    InvalidSegment { index: usize, reason: String },

    #[error("Invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

impl GatecrashError {
    /// Create an error with additional context
    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        GatecrashError::WithContext {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            GatecrashError::Config(e) => format!("Configuration problem: {}", e.user_hint()),
            GatecrashError::Http(e) => format!("Network issue: {}", e.user_hint()),
            GatecrashError::Input(e) => format!("Input problem: {}", e.user_hint()),
            GatecrashError::Io(e) => format!("File system issue: {}", e),
            GatecrashError::WithContext { context, source } => {
                format!("{}: {}", context, source)
            }
        }
    }
}

/// Trait for providing user-friendly hints
pub trait UserHint {
    fn user_hint(&self) -> String;
}

impl UserHint for ConfigError {
    fn user_hint(&self) -> String {
        match self {
            ConfigError::ReadError { path, .. } => {
                format!("Could not read '{}'. Check if the file exists and you have read permissions.", path)
            }
            ConfigError::ParseError(_) => {
                "The configuration file has invalid syntax. Check for TOML formatting errors.".into()
            }
            ConfigError::ValidationError { field, reason } => {
                format!("Invalid value for '{}': {}", field, reason)
            }
        }
    }
}

impl UserHint for HttpError {
    fn user_hint(&self) -> String {
        match self {
            HttpError::ConnectionError(_) => {
                "Could not connect to the target. Check if it's running and accessible.".into()
            }
            HttpError::Timeout(ms) => {
                format!("Request timed out after {}ms. The target may be slow or rate limiting.", ms)
            }
            HttpError::InvalidUrl(url) => {
                format!("'{}' is not a valid URL. Check the format.", url)
            }
            HttpError::TlsError(_) => {
                "TLS connection failed. Set session.accept_invalid_certs for self-signed targets.".into()
            }
            _ => self.to_string(),
        }
    }
}

impl UserHint for InputError {
    fn user_hint(&self) -> String {
        match self {
            InputError::MalformedCookie { segment } => {
                format!("'{}' is not a name=value pair. Paste the full Cookie header value.", segment)
            }
            InputError::MalformedToken { segments } => {
                format!("Expected a header.payload.signature token, found {} segment(s).", segments)
            }
            InputError::InvalidBaseUrl { url, .. } => {
                format!("'{}' is not a usable target. Use http(s)://host/.", url)
            }
            _ => self.to_string(),
        }
    }
}

/// Extension trait for adding context to Result types
pub trait ResultExt<T, E> {
    fn with_context<C>(self, context: C) -> Result<T, GatecrashError>
    where
        C: Into<String>;
}

impl<T, E> ResultExt<T, E> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn with_context<C>(self, context: C) -> Result<T, GatecrashError>
    where
        C: Into<String>,
    {
        self.map_err(|e| GatecrashError::with_context(context, e))
    }
}
