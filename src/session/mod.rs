//! Session state and artifacts
//!
//! A session carries at most one active authentication mode. Cookies
//! live in the client's cookie jar; the bearer token, when present, is
//! held here and mirrored onto every request by the client.

mod cookies;
mod injector;

pub use cookies::{parse_cookie_string, Credential, CredentialSet, ParsedCookies, BARE_SESSION_COOKIE};
pub use injector::ArtifactInjector;

use serde::{Deserialize, Serialize};

/// Category of session artifact currently active for a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    #[default]
    None,
    Token,
    Cookie,
}

impl AuthMode {
    pub fn name(&self) -> &'static str {
        match self {
            AuthMode::None => "none",
            AuthMode::Token => "token",
            AuthMode::Cookie => "cookie",
        }
    }
}

impl std::fmt::Display for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Mutable session state, owned by the session client
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    mode: AuthMode,
    bearer_token: Option<String>,
}

impl SessionState {
    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    pub fn bearer_token(&self) -> Option<&str> {
        self.bearer_token.as_deref()
    }

    /// Switch to cookie mode; any bearer token is dropped
    pub(crate) fn use_cookies(&mut self) {
        self.mode = AuthMode::Cookie;
        self.bearer_token = None;
    }

    pub(crate) fn use_token(&mut self, token: &str) {
        self.mode = AuthMode::Token;
        self.bearer_token = Some(token.to_string());
    }

    pub(crate) fn clear_token(&mut self) {
        self.bearer_token = None;
        if self.mode == AuthMode::Token {
            self.mode = AuthMode::None;
        }
    }
}

/// Outcome of a login attempt
///
/// A failed result always carries an empty artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResult {
    mode: AuthMode,
    artifact: String,
    success: bool,
}

impl AuthResult {
    /// A bearer token was issued
    pub fn token(token: &str) -> Self {
        Self {
            mode: AuthMode::Token,
            artifact: token.to_string(),
            success: true,
        }
    }

    /// The server established a cookie session
    pub fn cookie() -> Self {
        Self {
            mode: AuthMode::Cookie,
            artifact: "session".to_string(),
            success: true,
        }
    }

    pub fn failure() -> Self {
        Self {
            mode: AuthMode::None,
            artifact: String::new(),
            success: false,
        }
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    pub fn artifact(&self) -> &str {
        &self.artifact
    }

    pub fn success(&self) -> bool {
        self.success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_has_empty_artifact() {
        let result = AuthResult::failure();
        assert!(!result.success());
        assert!(result.artifact().is_empty());
        assert_eq!(result.mode(), AuthMode::None);
    }

    #[test]
    fn test_single_active_mode() {
        let mut state = SessionState::default();
        state.use_token("a.b.c");
        assert_eq!(state.mode(), AuthMode::Token);

        state.use_cookies();
        assert_eq!(state.mode(), AuthMode::Cookie);
        assert_eq!(state.bearer_token(), None);

        state.clear_token();
        assert_eq!(state.mode(), AuthMode::Cookie);
    }
}
