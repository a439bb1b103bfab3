//! Wire transport
//!
//! [`Transport`] is the single seam between the engine and the network.
//! The production implementation wraps a pooled `reqwest::Client` whose
//! cookie store is shared with the owning [`SessionClient`].
//!
//! [`SessionClient`]: super::SessionClient

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, SET_COOKIE};

use super::request::{Method, Request};
use super::response::Response;
use crate::app::SessionConfig;
use crate::error::HttpError;

/// Sends one fully resolved request
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> Result<Response, HttpError>;
}

/// reqwest-backed transport with connection pooling
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout_ms: u64,
}

impl ReqwestTransport {
    /// Build a pooled client that persists cookies into `jar`
    pub fn new(config: &SessionConfig, jar: Arc<Jar>) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .cookie_provider(jar)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| HttpError::RequestFailed(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            timeout_ms: config.timeout().as_millis() as u64,
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: Request) -> Result<Response, HttpError> {
        let start = Instant::now();

        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };
        let timeout_ms = request
            .timeout
            .map(|t| t.as_millis() as u64)
            .unwrap_or(self.timeout_ms);

        let mut builder = self.client.request(method, request.url.clone());

        let mut headers = HeaderMap::new();
        for (key, value) in &request.headers {
            if let (Ok(name), Ok(val)) = (HeaderName::from_str(key), HeaderValue::from_str(value)) {
                headers.insert(name, val);
            } else {
                tracing::debug!(header = %key, "Skipping header that is not valid on the wire");
            }
        }
        builder = builder.headers(headers);

        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| HttpError::from_reqwest(&e, timeout_ms))?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();

        let set_cookies: Vec<String> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(|v| v.to_string())
            .collect();

        let mut header_map = HashMap::new();
        for (key, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                header_map.insert(key.as_str().to_lowercase(), v.to_string());
            }
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| HttpError::from_reqwest(&e, timeout_ms))?;

        Ok(Response {
            status,
            final_url,
            headers: header_map,
            set_cookies,
            body: body.to_vec(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// Scriptable in-memory transport for unit tests
#[cfg(test)]
pub(crate) mod stub {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;

    type Handler = Box<dyn Fn(&Request) -> Result<Response, HttpError> + Send + Sync>;

    /// Records every request and tracks how many are outstanding at once
    pub struct StubTransport {
        handler: Handler,
        delay: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        requests: Mutex<Vec<Request>>,
    }

    impl StubTransport {
        pub fn new<F>(handler: F) -> Self
        where
            F: Fn(&Request) -> Result<Response, HttpError> + Send + Sync + 'static,
        {
            Self {
                handler: Box::new(handler),
                delay: Duration::ZERO,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            }
        }

        /// Hold every request open for `delay` before answering
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn max_in_flight(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }

        pub fn requests(&self) -> Vec<Request> {
            self.requests.lock().clone()
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().len()
        }
    }

    /// Canned response whose final URL is the request URL
    pub fn reply(request: &Request, status: u16, body: &str) -> Response {
        Response {
            status,
            final_url: request.url.to_string(),
            body: body.as_bytes().to_vec(),
            ..Response::default()
        }
    }

    #[async_trait]
    impl Transport for StubTransport {
        async fn send(&self, request: Request) -> Result<Response, HttpError> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            self.requests.lock().push(request.clone());

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            let result = (self.handler)(&request);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }
}
