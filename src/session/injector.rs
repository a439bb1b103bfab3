//! Loading operator-supplied artifacts into a session

use crate::error::InputError;
use crate::forge::Token;
use crate::http::SessionClient;

use super::cookies::{parse_cookie_string, ParsedCookies};

/// Loads pasted cookie strings and bearer tokens into a session
pub struct ArtifactInjector;

impl ArtifactInjector {
    /// Parse a cookie-header string and store every credential in the
    /// client's jar, switching the session to cookie mode.
    ///
    /// Nothing is stored when any segment is malformed.
    pub fn inject_cookies(client: &mut SessionClient, raw: &str) -> Result<ParsedCookies, InputError> {
        let parsed = parse_cookie_string(raw)?;

        for credential in parsed.credentials.iter() {
            client.add_cookie(&credential);
        }
        client.use_cookie_session();

        tracing::info!(
            count = parsed.credentials.len(),
            names = ?parsed.credentials.names(),
            domain = client.target().domain(),
            "Injected session cookies"
        );
        Ok(parsed)
    }

    /// Validate a bearer token's structure and make it the session artifact
    pub fn inject_token(client: &mut SessionClient, raw: &str) -> Result<Token, InputError> {
        let raw = raw.trim();
        let raw = raw
            .strip_prefix("Bearer ")
            .or_else(|| raw.strip_prefix("bearer "))
            .unwrap_or(raw);
        let token = Token::parse(raw)?;

        client.set_bearer_token(token.raw());
        tracing::info!(alg = token.algorithm().unwrap_or("?"), "Injected bearer token");
        Ok(token)
    }
}
