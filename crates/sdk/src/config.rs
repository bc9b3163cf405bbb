//! Client configuration.
//!
//! [`ClientConfig`] is constructed explicitly and handed to the client; there
//! is no process-wide default instance. Values are resolved from three
//! sources:
//!
//! | Setting | Precedence |
//! |---------|------------|
//! | `api_key` | `BREACT_API_KEY`, then the explicit value. Required. |
//! | `base_url` | explicit, then `BREACT_BASE_URL`, then [`DEFAULT_BASE_URL`] |
//! | `api_version` | explicit, then `BREACT_API_VERSION`, then [`DEFAULT_API_VERSION`] |
//! | timeouts / interval | explicit, then `BREACT_REQUEST_TIMEOUT` / `BREACT_POLL_INTERVAL` / `BREACT_POLL_TIMEOUT` (seconds), then defaults |

use std::time::Duration;

use protocol::BReactError;
use url::Url;

pub const API_KEY_ENV: &str = "BREACT_API_KEY";
pub const BASE_URL_ENV: &str = "BREACT_BASE_URL";
pub const API_VERSION_ENV: &str = "BREACT_API_VERSION";
pub const REQUEST_TIMEOUT_ENV: &str = "BREACT_REQUEST_TIMEOUT";
pub const POLL_INTERVAL_ENV: &str = "BREACT_POLL_INTERVAL";
pub const POLL_TIMEOUT_ENV: &str = "BREACT_POLL_TIMEOUT";

pub const DEFAULT_BASE_URL: &str = "https://api-os.breact.ai";
pub const DEFAULT_API_VERSION: &str = "v1";
/// Timeout for submissions and listings; generation requests can be slow.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(180);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
/// Timeout for a single result poll.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolved, validated client settings.
#[derive(Clone, PartialEq)]
pub struct ClientConfig {
    base_url: Url,
    api_version: String,
    api_key: String,
    request_timeout: Duration,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl ClientConfig {
    /// Starts a builder with nothing set explicitly.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Resolves every setting from the process environment and defaults.
    ///
    /// # Errors
    ///
    /// Returns [`BReactError::Configuration`] if `BREACT_API_KEY` is unset or
    /// any environment value is invalid.
    pub fn from_env() -> Result<Self, BReactError> {
        Self::builder().build()
    }

    /// The parsed base URL; request paths are appended to its path.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn poll_timeout(&self) -> Duration {
        self.poll_timeout
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_version", &self.api_version)
            .field("api_key", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .field("poll_interval", &self.poll_interval)
            .field("poll_timeout", &self.poll_timeout)
            .finish()
    }
}

/// Collects explicit settings before resolution.
#[derive(Clone, Default)]
pub struct ClientConfigBuilder {
    base_url: Option<String>,
    api_version: Option<String>,
    api_key: Option<String>,
    request_timeout: Option<Duration>,
    poll_interval: Option<Duration>,
    poll_timeout: Option<Duration>,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = Some(api_version.into());
        self
    }

    /// Sets the fallback API key. `BREACT_API_KEY` still takes precedence.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = Some(timeout);
        self
    }

    /// Resolves against the process environment.
    ///
    /// # Errors
    ///
    /// See [`ClientConfigBuilder::resolve_with`].
    pub fn build(self) -> Result<ClientConfig, BReactError> {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Resolves against `lookup` instead of the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`BReactError::Configuration`] when no API key is available,
    /// the base URL is not an absolute `http(s)` URL, an environment duration
    /// is not a positive number of seconds, or a timeout or the poll interval
    /// is zero.
    pub fn resolve_with<F>(self, lookup: F) -> Result<ClientConfig, BReactError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_key = env(API_KEY_ENV)
            .or(self.api_key.filter(|k| !k.trim().is_empty()))
            .ok_or_else(|| {
                BReactError::configuration(format!(
                    "API key must be provided either through the {API_KEY_ENV} environment variable or explicitly"
                ))
            })?;

        let base_url = parse_base_url(
            &self
                .base_url
                .or_else(|| env(BASE_URL_ENV))
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        )?;

        let api_version = self
            .api_version
            .or_else(|| env(API_VERSION_ENV))
            .unwrap_or_else(|| DEFAULT_API_VERSION.to_string());

        let request_timeout = resolve_duration(
            self.request_timeout,
            env(REQUEST_TIMEOUT_ENV),
            REQUEST_TIMEOUT_ENV,
            DEFAULT_REQUEST_TIMEOUT,
        )?;
        let poll_interval = resolve_duration(
            self.poll_interval,
            env(POLL_INTERVAL_ENV),
            POLL_INTERVAL_ENV,
            DEFAULT_POLL_INTERVAL,
        )?;
        let poll_timeout = resolve_duration(
            self.poll_timeout,
            env(POLL_TIMEOUT_ENV),
            POLL_TIMEOUT_ENV,
            DEFAULT_POLL_TIMEOUT,
        )?;

        if request_timeout.is_zero() || poll_timeout.is_zero() {
            return Err(BReactError::configuration("timeouts must be greater than zero"));
        }
        if poll_interval.is_zero() {
            return Err(BReactError::configuration("poll interval must be greater than zero"));
        }

        Ok(ClientConfig {
            base_url,
            api_version,
            api_key,
            request_timeout,
            poll_interval,
            poll_timeout,
        })
    }
}

fn parse_base_url(raw: &str) -> Result<Url, BReactError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| BReactError::configuration(format!("base URL '{raw}' is invalid: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(BReactError::configuration(format!(
            "base URL '{raw}' must be an absolute http(s) URL"
        )));
    }
    Ok(url)
}

fn resolve_duration(
    explicit: Option<Duration>,
    from_env: Option<String>,
    name: &str,
    default: Duration,
) -> Result<Duration, BReactError> {
    if let Some(value) = explicit {
        return Ok(value);
    }
    let Some(raw) = from_env else {
        return Ok(default);
    };
    match raw.trim().parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs > 0.0 => Ok(Duration::from_secs_f64(secs)),
        _ => Err(BReactError::configuration(format!(
            "{name} must be a positive number of seconds, got '{raw}'"
        ))),
    }
}
