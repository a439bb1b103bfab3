//! Session-bound HTTP client

use std::sync::Arc;

use parking_lot::Mutex;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderValue;
use url::Url;

use super::request::{BodyEncoding, Request};
use super::response::Response;
use super::transport::{ReqwestTransport, Transport};
use crate::app::SessionConfig;
use crate::error::HttpError;
use crate::session::{Credential, CredentialSet, SessionState};
use crate::target::TargetConfig;

/// One long-lived HTTP conversation with the target.
///
/// Paths are resolved against the target's base URL. Cookies persist in
/// a jar shared with the pooled transport; the bearer token, user agent
/// and referer chain are applied to every outgoing request. Dropping the
/// client releases its connection pool.
pub struct SessionClient {
    target: TargetConfig,
    transport: Arc<dyn Transport>,
    jar: Arc<Jar>,
    state: SessionState,
    /// URL of the previous request, sent as `Referer`
    referer: Mutex<Url>,
    /// Cookie the bearer token is mirrored into, if any
    token_cookie: Option<String>,
}

impl SessionClient {
    /// Open a session over a pooled reqwest transport
    pub fn open(target: TargetConfig, config: &SessionConfig) -> Result<Self, HttpError> {
        let jar = Arc::new(Jar::default());
        let transport = ReqwestTransport::new(config, jar.clone())?;
        Ok(Self::build(target, config, Arc::new(transport), jar))
    }

    /// Open a session over a caller-provided transport
    pub fn with_transport(target: TargetConfig, config: &SessionConfig, transport: Arc<dyn Transport>) -> Self {
        Self::build(target, config, transport, Arc::new(Jar::default()))
    }

    fn build(target: TargetConfig, config: &SessionConfig, transport: Arc<dyn Transport>, jar: Arc<Jar>) -> Self {
        tracing::debug!(base_url = %target.base_url(), variant = %target.variant(), "Opening session");
        let referer = Mutex::new(target.base_url().clone());
        Self {
            target,
            transport,
            jar,
            state: SessionState::default(),
            referer,
            token_cookie: config.token_cookie_sync.then(|| config.token_cookie_name.clone()),
        }
    }

    pub fn target(&self) -> &TargetConfig {
        &self.target
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// GET a path, with optional extra headers
    pub async fn get(&self, path: &str, headers: &[(&str, &str)]) -> Result<Response, HttpError> {
        let mut request = Request::get(self.target.resolve(path)?);
        for (key, value) in headers {
            request = request.header(key, value);
        }
        self.send(request).await
    }

    /// POST name/value fields in the given encoding
    pub async fn post(
        &self,
        path: &str,
        fields: &[(String, String)],
        encoding: BodyEncoding,
    ) -> Result<Response, HttpError> {
        let request = Request::post(self.target.resolve(path)?).body(fields, encoding);
        self.send(request).await
    }

    async fn send(&self, request: Request) -> Result<Response, HttpError> {
        let url = request.url.clone();
        let previous = std::mem::replace(&mut *self.referer.lock(), url.clone());

        let mut request = request
            .header("User-Agent", self.target.user_agent())
            .header("Referer", previous.as_str())
            .timeout(self.target.timeout());
        if let Some(token) = self.state.bearer_token() {
            request = request.header("Authorization", &format!("Bearer {}", token));
        }

        tracing::debug!(method = request.method.as_str(), url = %url, "Sending request");
        let response = self.transport.send(request).await?;
        tracing::debug!(
            url = %url,
            status = response.status,
            duration_ms = response.duration_ms,
            "Received response"
        );

        self.store_cookies(&response, &url);
        Ok(response)
    }

    /// Persist `Set-Cookie` values against the URL that issued them
    fn store_cookies(&self, response: &Response, request_url: &Url) {
        if response.set_cookies.is_empty() {
            return;
        }
        let url = Url::parse(&response.final_url).unwrap_or_else(|_| request_url.clone());
        let values: Vec<HeaderValue> = response
            .set_cookies
            .iter()
            .filter_map(|c| HeaderValue::from_str(c).ok())
            .collect();
        self.jar.set_cookies(&mut values.iter(), &url);
    }

    /// Cookies the jar would send to the target
    pub fn cookies(&self) -> CredentialSet {
        self.jar
            .cookies(self.target.base_url())
            .and_then(|header| header.to_str().map(CredentialSet::from_header_lenient).ok())
            .unwrap_or_default()
    }

    /// Store a cookie for the target's domain
    pub fn add_cookie(&self, credential: &Credential) {
        let cookie = format!("{}={}; Path=/", credential.name, credential.value);
        self.jar.add_cookie_str(&cookie, self.target.base_url());
    }

    /// Flip the session into cookie mode
    pub fn use_cookie_session(&mut self) {
        self.state.use_cookies();
    }

    /// Send `token` as a bearer header and as the token cookie from now on
    pub fn set_bearer_token(&mut self, token: &str) {
        if let Some(name) = &self.token_cookie {
            self.add_cookie(&Credential::new(name, token));
        }
        self.state.use_token(token);
    }

    pub fn clear_bearer_token(&mut self) {
        self.state.clear_token();
    }

    /// End the conversation and release pooled connections
    pub fn close(self) {
        tracing::debug!(base_url = %self.target.base_url(), mode = %self.state.mode(), "Closing session");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::transport::stub::{reply, StubTransport};
    use crate::session::AuthMode;
    use crate::target::TargetVariant;

    fn client_with(stub: Arc<StubTransport>) -> SessionClient {
        let target = TargetConfig::new("http://shop.test/", TargetVariant::Generic).unwrap();
        SessionClient::with_transport(target, &SessionConfig::default(), stub)
    }

    #[tokio::test]
    async fn test_referer_chains_previous_url() {
        let stub = Arc::new(StubTransport::new(|req| Ok(reply(req, 200, "ok"))));
        let client = client_with(stub.clone());

        client.get("first", &[]).await.unwrap();
        client.get("/second", &[("X-Probe", "1")]).await.unwrap();

        let requests = stub.requests();
        assert_eq!(requests[0].header_value("Referer"), Some("http://shop.test/"));
        assert_eq!(requests[1].header_value("Referer"), Some("http://shop.test/first"));
        assert_eq!(requests[1].header_value("X-Probe"), Some("1"));
        assert!(requests[1].header_value("User-Agent").unwrap().contains("Mozilla"));
    }

    #[tokio::test]
    async fn test_bearer_token_header_and_cookie_stay_in_sync() {
        let stub = Arc::new(StubTransport::new(|req| Ok(reply(req, 200, "ok"))));
        let mut client = client_with(stub.clone());

        client.set_bearer_token("aaa.bbb.ccc");
        client.set_bearer_token("xxx.yyy.");
        client.get("api/me", &[]).await.unwrap();

        assert_eq!(client.state().mode(), AuthMode::Token);
        assert_eq!(stub.requests()[0].header_value("Authorization"), Some("Bearer xxx.yyy."));
        assert_eq!(client.cookies().get("token"), Some("xxx.yyy."));

        client.clear_bearer_token();
        client.get("api/me", &[]).await.unwrap();
        assert_eq!(stub.requests()[1].header_value("Authorization"), None);
    }

    #[test]
    fn test_token_cookie_sync_can_be_disabled() {
        let stub = Arc::new(StubTransport::new(|req| Ok(reply(req, 200, "ok"))));
        let target = TargetConfig::new("http://shop.test/", TargetVariant::Generic).unwrap();
        let config = SessionConfig {
            token_cookie_sync: false,
            ..SessionConfig::default()
        };
        let mut client = SessionClient::with_transport(target, &config, stub);

        client.set_bearer_token("aaa.bbb.ccc");
        assert_eq!(client.state().bearer_token(), Some("aaa.bbb.ccc"));
        assert!(client.cookies().is_empty());
    }

    #[tokio::test]
    async fn test_set_cookie_values_are_persisted() {
        let stub = Arc::new(StubTransport::new(|req| {
            let mut response = reply(req, 200, "welcome");
            response.set_cookies = vec!["PHPSESSID=deadbeef; Path=/; HttpOnly".to_string()];
            Ok(response)
        }));
        let client = client_with(stub);

        assert!(client.cookies().is_empty());
        client.get("login", &[]).await.unwrap();
        assert_eq!(client.cookies().get("PHPSESSID"), Some("deadbeef"));
    }

    #[tokio::test]
    async fn test_transport_error_is_returned_not_raised() {
        let stub = Arc::new(StubTransport::new(|_| Err(HttpError::Timeout(20_000))));
        let client = client_with(stub);
        let err = client.get("slow", &[]).await.unwrap_err();
        assert_eq!(err, HttpError::Timeout(20_000));
    }
}
