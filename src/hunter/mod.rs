//! Login-flow credential hunting
//!
//! When no artifact is supplied, the hunter submits the operator's
//! credentials to a login endpoint and looks for whatever the server
//! hands back. Structured bodies are tried before form bodies: a
//! JSON-only API often answers a form POST with a generic 4xx that
//! would hide the token the JSON path returns.

use std::sync::OnceLock;

use regex::Regex;

use crate::combinators::{retry_with_backoff, timed, RetryPolicy};
use crate::forge::decode_segment;
use crate::http::{BodyEncoding, Response, SessionClient};
use crate::session::{AuthMode, AuthResult};

/// Three base64url runs joined by dots
fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9_-]{2,}\.[A-Za-z0-9_-]{2,}\.[A-Za-z0-9_-]*").expect("Invalid token regex")
    })
}

/// Find the first bearer-token candidate in `text` whose header segment
/// decodes to a JSON object. A rejected candidate is rescanned from just
/// past its first dot, so a dotted prefix glued to a token (`v1.<token>`)
/// does not hide it.
pub fn find_token(text: &str) -> Option<String> {
    let re = token_regex();
    let mut start = 0;
    while let Some(candidate) = re.find_at(text, start) {
        if has_json_header(candidate.as_str()) {
            return Some(candidate.as_str().to_string());
        }
        start = match candidate.as_str().find('.') {
            Some(dot) => candidate.start() + dot + 1,
            None => candidate.end(),
        };
    }
    None
}

fn has_json_header(candidate: &str) -> bool {
    candidate
        .split('.')
        .next()
        .and_then(|header| decode_segment(header).ok())
        .and_then(|bytes| serde_json::from_slice::<serde_json::Value>(&bytes).ok())
        .map(|value| value.is_object())
        .unwrap_or(false)
}

/// Look for an issued token in the body, then the `Authorization`
/// header, then the `Set-Cookie` values
fn token_in_response(response: &Response) -> Option<String> {
    find_token(&response.body_text())
        .or_else(|| response.header("authorization").and_then(find_token))
        .or_else(|| response.set_cookies.iter().find_map(|c| find_token(c)))
}

/// Drives the login flow across body encodings
#[derive(Debug, Clone, Default)]
pub struct CredentialHunter {
    retry: RetryPolicy,
}

impl CredentialHunter {
    pub fn new(retry: RetryPolicy) -> Self {
        Self { retry }
    }

    /// Submit `credentials` to `login_path`, JSON first then form data,
    /// stopping at the first strategy that yields an artifact.
    ///
    /// On success the session is switched to the discovered mode.
    pub async fn hunt(
        &self,
        client: &mut SessionClient,
        login_path: &str,
        credentials: &[(String, String)],
    ) -> AuthResult {
        let result = timed("hunt", self.run_strategies(client, login_path, credentials)).await;

        match result.mode() {
            AuthMode::Token => client.set_bearer_token(result.artifact()),
            AuthMode::Cookie => client.use_cookie_session(),
            AuthMode::None => {
                tracing::warn!(login_path, "No session artifact issued by any login strategy")
            }
        }
        result
    }

    async fn run_strategies(
        &self,
        client: &SessionClient,
        login_path: &str,
        credentials: &[(String, String)],
    ) -> AuthResult {
        for encoding in [BodyEncoding::Json, BodyEncoding::Form] {
            let outcome = retry_with_backoff(&self.retry, "login", move || {
                client.post(login_path, credentials, encoding)
            })
            .await;

            match outcome {
                Ok(response) => {
                    tracing::debug!(
                        encoding = encoding.content_type(),
                        status = response.status,
                        "Login attempt answered"
                    );
                    if let Some(token) = token_in_response(&response) {
                        tracing::info!(encoding = encoding.content_type(), "Bearer token issued");
                        return AuthResult::token(&token);
                    }
                }
                Err(e) => {
                    tracing::warn!(encoding = encoding.content_type(), error = %e, "Login attempt failed");
                }
            }

            let cookies = client.cookies();
            if !cookies.is_empty() {
                tracing::info!(
                    encoding = encoding.content_type(),
                    names = ?cookies.names(),
                    "Session cookie issued"
                );
                return AuthResult::cookie();
            }
        }

        AuthResult::failure()
    }
}
