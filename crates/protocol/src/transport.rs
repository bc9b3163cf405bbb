//! The transport port.
//!
//! Every network call the client makes goes through [`Transport`]. The
//! `http-transport` crate provides the `reqwest` implementation; tests supply
//! in-memory implementations.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::{ApiPath, BReactError};

/// HTTP method of a [`TransportRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    /// Returns the method name in upper case.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which timeout applies to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutClass {
    /// The long timeout configured for submissions and listings.
    Request,
    /// The short timeout configured for result polls.
    Poll,
    /// An explicit per-call timeout.
    Override(Duration),
}

/// One HTTP call, relative to the transport's base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: HttpMethod,
    /// Path appended to the base URL.
    pub path: ApiPath,
    /// Query parameters, appended in order.
    pub query: Vec<(String, String)>,
    /// JSON request body.
    pub body: Option<Value>,
    pub timeout: TimeoutClass,
}

impl TransportRequest {
    /// A `GET` with the long request timeout.
    pub fn get(path: impl Into<ApiPath>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
            timeout: TimeoutClass::Request,
        }
    }

    /// A `POST` of `body` with the long request timeout.
    pub fn post(path: impl Into<ApiPath>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
            timeout: TimeoutClass::Request,
        }
    }

    /// Appends a query parameter.
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Replaces the timeout class.
    pub fn with_timeout(mut self, timeout: TimeoutClass) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Issues single HTTP requests against the BReact API.
///
/// Implementations apply the base URL, the static headers (including the API
/// key), and the timeout selected by [`TransportRequest::timeout`]. Any
/// failure — non-2xx status, connection error, timeout, or a body that is not
/// JSON — is reported as [`BReactError::Client`].
///
/// Implementations must tolerate concurrent calls to [`Transport::request`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request` and returns the parsed JSON response body.
    async fn request(&self, request: TransportRequest) -> Result<Value, BReactError>;

    /// Releases pooled connections.
    ///
    /// Idempotent: calling it again is a no-op. Requests issued after close
    /// fail with [`BReactError::Client`].
    async fn close(&self);
}
