//! Composition of the API paths the client calls.
//!
//! All paths share the `/api/{version}` prefix and are resolved against the
//! configured base URL by the transport. Paths are kept as segments so that
//! IDs containing `/`, `?`, or spaces are percent-encoded instead of changing
//! the route.

use url::Url;

use crate::{BReactError, EndpointName, ProcessId, ServiceId};

/// Query parameter that carries the access token on result polls.
pub const ACCESS_TOKEN_PARAM: &str = "access_token";

/// A request path, held as unencoded segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ApiPath {
    segments: Vec<String>,
}

impl ApiPath {
    /// Builds a path from raw segments. Each segment is encoded on resolution.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Appends this path to the path of `base`, percent-encoding every
    /// segment. Any query or fragment on `base` is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`BReactError::Configuration`] if `base` cannot carry a path
    /// (e.g. a `mailto:` URL).
    pub fn resolve(&self, base: &Url) -> Result<Url, BReactError> {
        let mut url = base.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|()| {
                BReactError::configuration(format!("base URL '{base}' cannot carry a path"))
            })?
            .pop_if_empty()
            .extend(&self.segments);
        Ok(url)
    }
}

/// Splits on `/`, ignoring empty segments. Use [`ApiPath::from_segments`]
/// when a segment may itself contain `/`.
impl From<&str> for ApiPath {
    fn from(path: &str) -> Self {
        Self::from_segments(path.split('/').filter(|s| !s.is_empty()))
    }
}

impl From<String> for ApiPath {
    fn from(path: String) -> Self {
        Self::from(path.as_str())
    }
}

/// Renders the unencoded path, for logs and route matching.
impl std::fmt::Display for ApiPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl PartialEq<str> for ApiPath {
    fn eq(&self, other: &str) -> bool {
        self.to_string() == other
    }
}

impl PartialEq<&str> for ApiPath {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

/// Builds request paths for one API version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiPaths {
    prefix: Vec<String>,
}

impl ApiPaths {
    /// Creates the path builder for `api_version` (e.g. `"v1"`).
    pub fn new(api_version: &str) -> Self {
        let mut prefix = vec!["api".to_string()];
        prefix.extend(
            api_version
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
        Self { prefix }
    }

    fn under_prefix<'a>(&self, rest: impl IntoIterator<Item = &'a str>) -> ApiPath {
        ApiPath::from_segments(
            self.prefix
                .iter()
                .cloned()
                .chain(rest.into_iter().map(str::to_string)),
        )
    }

    /// `GET` — the services listing.
    pub fn services(&self) -> ApiPath {
        self.under_prefix(["services"])
    }

    /// `POST` — submits a call to `endpoint` of `service_id`.
    pub fn submit(&self, service_id: &ServiceId, endpoint: &EndpointName) -> ApiPath {
        self.under_prefix(["services", service_id.as_str(), endpoint.as_str()])
    }

    /// `GET` — the result of `process_id`.
    pub fn result(&self, process_id: &ProcessId) -> ApiPath {
        self.under_prefix(["services", "result", process_id.as_str()])
    }
}

impl Default for ApiPaths {
    fn default() -> Self {
        Self::new("v1")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(url: &str) -> Url {
        Url::parse(url).unwrap()
    }

    #[test]
    fn paths_share_the_versioned_prefix() {
        let paths = ApiPaths::default();
        let service = ServiceId::new("summarizer").unwrap();
        let endpoint = EndpointName::new("summarize").unwrap();
        let process = ProcessId::new("p1").unwrap();

        assert_eq!(paths.services(), "/api/v1/services");
        assert_eq!(
            paths.submit(&service, &endpoint),
            "/api/v1/services/summarizer/summarize"
        );
        assert_eq!(paths.result(&process), "/api/v1/services/result/p1");
    }

    #[test]
    fn version_slashes_are_trimmed() {
        assert_eq!(ApiPaths::new("/v2/").services(), "/api/v2/services");
    }

    #[test]
    fn segments_are_percent_encoded_on_resolution() {
        let paths = ApiPaths::default();
        let service = ServiceId::new("a/b?c").unwrap();
        let endpoint = EndpointName::new("run now").unwrap();

        let url = paths
            .submit(&service, &endpoint)
            .resolve(&base("http://localhost:8000"))
            .unwrap();

        assert_eq!(url.path(), "/api/v1/services/a%2Fb%3Fc/run%20now");
        assert_eq!(url.query(), None);
    }

    #[test]
    fn base_path_prefix_is_kept() {
        let url = ApiPaths::default()
            .services()
            .resolve(&base("https://gateway.example/breact/?debug=1"))
            .unwrap();
        assert_eq!(url.as_str(), "https://gateway.example/breact/api/v1/services");
    }

    #[test]
    fn string_paths_split_on_slashes() {
        let path = ApiPath::from("/api/v1//services/");
        assert_eq!(path.segments(), ["api", "v1", "services"]);
        assert_eq!(path, "/api/v1/services");
    }

    #[test]
    fn opaque_base_is_a_configuration_error() {
        let err = ApiPaths::default()
            .services()
            .resolve(&base("mailto:ops@breact.ai"))
            .unwrap_err();
        assert!(matches!(err, BReactError::Configuration { .. }));
    }
}
