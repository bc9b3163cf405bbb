//! BReact HTTP transport adapter.
//!
//! Implements the [`protocol::Transport`] trait over [`reqwest`]: base URL
//! resolution, the static JSON and API-key headers, per-request timeout
//! selection, and normalisation of every `reqwest` failure into
//! [`BReactError::Client`]. The orchestration layer in `sdk` sees only
//! [`protocol::Transport`].
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Connection pooling and TLS are delegated to `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use protocol::{ApiPath, BReactError, HttpMethod, TimeoutClass, Transport, TransportRequest};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

/// Header that carries the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Settings for a [`ReqwestTransport`].
#[derive(Clone)]
pub struct HttpTransportConfig {
    /// Base URL every request path is appended to (e.g. `https://api-os.breact.ai`).
    pub base_url: Url,
    /// Sent in the [`API_KEY_HEADER`] header when present.
    pub api_key: Option<String>,
    /// Timeout for [`TimeoutClass::Request`] calls (submissions, listings).
    pub request_timeout: Duration,
    /// Timeout for [`TimeoutClass::Poll`] calls.
    pub poll_timeout: Duration,
}

impl std::fmt::Debug for HttpTransportConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransportConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("request_timeout", &self.request_timeout)
            .field("poll_timeout", &self.poll_timeout)
            .finish()
    }
}

/// A [`reqwest`]-backed implementation of [`Transport`].
///
/// The underlying client (and its connection pool) is shared by every
/// concurrent request and dropped by [`Transport::close`].
#[derive(Debug)]
pub struct ReqwestTransport {
    base_url: Url,
    request_timeout: Duration,
    poll_timeout: Duration,
    client: RwLock<Option<reqwest::Client>>,
}

impl ReqwestTransport {
    /// Builds the transport and its connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`BReactError::Configuration`] if the API key is not a valid
    /// header value or the HTTP client cannot be constructed.
    pub fn new(config: HttpTransportConfig) -> Result<Self, BReactError> {
        let headers = default_headers(config.api_key.as_deref())?;
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| BReactError::configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.base_url,
            request_timeout: config.request_timeout,
            poll_timeout: config.poll_timeout,
            client: RwLock::new(Some(client)),
        })
    }

    /// Returns the full URL for `path`, with every segment percent-encoded.
    fn url(&self, path: &ApiPath) -> Result<Url, BReactError> {
        path.resolve(&self.base_url)
    }

    fn timeout_for(&self, class: TimeoutClass) -> Duration {
        match class {
            TimeoutClass::Request => self.request_timeout,
            TimeoutClass::Poll => self.poll_timeout,
            TimeoutClass::Override(timeout) => timeout,
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn request(&self, request: TransportRequest) -> Result<Value, BReactError> {
        let client = self
            .client
            .read()
            .await
            .clone()
            .ok_or_else(|| BReactError::client("transport is closed"))?;

        let mut builder = client
            .request(to_reqwest_method(request.method), self.url(&request.path)?)
            .timeout(self.timeout_for(request.timeout));
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(method = %request.method, path = %request.path, "sending request");

        let response = builder.send().await.map_err(normalise)?;
        let response = response.error_for_status().map_err(|e| {
            warn!(method = %request.method, path = %request.path, status = ?e.status(), "request rejected");
            normalise(e)
        })?;
        response.json::<Value>().await.map_err(normalise)
    }

    async fn close(&self) {
        if self.client.write().await.take().is_some() {
            info!(base_url = %self.base_url, "HTTP transport closed");
        }
    }
}

fn default_headers(api_key: Option<&str>) -> Result<HeaderMap, BReactError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(key) = api_key {
        let mut value = HeaderValue::from_str(key)
            .map_err(|_| BReactError::configuration("API key is not a valid header value"))?;
        value.set_sensitive(true);
        headers.insert(API_KEY_HEADER, value);
    }
    Ok(headers)
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

/// Converts a `reqwest` failure into [`BReactError::Client`].
///
/// The URL is stripped first: poll URLs carry the access token.
fn normalise(err: reqwest::Error) -> BReactError {
    let err = err.without_url();
    if err.is_timeout() {
        BReactError::client(format!("Request timed out: {err}"))
    } else {
        BReactError::client(format!("HTTP request failed: {err}"))
    }
}
