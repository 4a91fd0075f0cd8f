use std::time::Duration;

use url::Url;

use crate::error::Error;
use crate::types::Provider;

const DEFAULT_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_API_PATH: &str = "/api/auth";
const DEFAULT_AUTHORIZATION_PATH: &str = "/oauth2/authorization";

/// Identity service endpoints and transport settings.
///
/// The base URL is the only required field. Paths are joined onto it, so a
/// base with a path prefix (`https://example.com/app/`) keeps that prefix.
///
/// ```rust,ignore
/// use auth_session::ClientConfig;
///
/// let config = ClientConfig::new("https://id.example.com".parse()?)?
///     .with_request_timeout(std::time::Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ClientConfig {
    pub(crate) base_url: Url,
    pub(crate) api_path: String,
    pub(crate) authorization_path: String,
    pub(crate) request_timeout: Option<Duration>,
}

impl ClientConfig {
    /// Create a configuration rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] unless `base_url` is an `http` or `https` URL.
    pub fn new(base_url: Url) -> Result<Self, Error> {
        if !matches!(base_url.scheme(), "http" | "https") || base_url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "base URL must be an http(s) URL, got {base_url}"
            )));
        }
        Ok(Self {
            base_url,
            api_path: DEFAULT_API_PATH.into(),
            authorization_path: DEFAULT_AUTHORIZATION_PATH.into(),
            request_timeout: None,
        })
    }

    /// Create a configuration from environment variables.
    ///
    /// # Optional env vars
    /// - `AUTH_API_BASE`: identity service base URL (default `http://localhost:8080`)
    /// - `AUTH_API_PATH`: auth endpoint prefix (default `/api/auth`)
    /// - `AUTH_AUTHORIZATION_PATH`: federated login prefix (default `/oauth2/authorization`)
    /// - `AUTH_REQUEST_TIMEOUT_SECS`: per-request timeout; unset means no timeout
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable is set but malformed.
    pub fn from_env() -> Result<Self, Error> {
        let base = std::env::var("AUTH_API_BASE").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        let base_url: Url = base
            .parse()
            .map_err(|e| Error::Config(format!("AUTH_API_BASE: {e}")))?;

        let mut config = Self::new(base_url)?;

        if let Ok(path) = std::env::var("AUTH_API_PATH") {
            config = config.with_api_path(path);
        }
        if let Ok(path) = std::env::var("AUTH_AUTHORIZATION_PATH") {
            config = config.with_authorization_path(path);
        }
        if let Ok(secs) = std::env::var("AUTH_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("AUTH_REQUEST_TIMEOUT_SECS: {e}")))?;
            config = config.with_request_timeout(Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// Override the auth endpoint prefix (default: `/api/auth`).
    #[must_use]
    pub fn with_api_path(mut self, path: impl Into<String>) -> Self {
        self.api_path = path.into();
        self
    }

    /// Override the federated login prefix (default: `/oauth2/authorization`).
    #[must_use]
    pub fn with_authorization_path(mut self, path: impl Into<String>) -> Self {
        self.authorization_path = path.into();
        self
    }

    /// Bound every request by `timeout`. Without it a hung request stays
    /// pending until the caller drops the future.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    /// URL of an auth endpoint, e.g. `endpoint("me")`.
    #[must_use]
    pub fn endpoint(&self, name: &str) -> Url {
        join_segments(&self.base_url, &self.api_path, name)
    }

    /// Authorization URL that starts a federated login with `provider`.
    #[must_use]
    pub fn authorization_url(&self, provider: &Provider) -> Url {
        join_segments(&self.base_url, &self.authorization_path, provider.as_str())
    }
}

fn join_segments(base: &Url, prefix: &str, leaf: &str) -> Url {
    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);
    // Cannot fail: `ClientConfig::new` rejects cannot-be-a-base URLs.
    if let Ok(mut segments) = url.path_segments_mut() {
        segments
            .pop_if_empty()
            .extend(prefix.split('/').filter(|s| !s.is_empty()))
            .push(leaf);
    }
    url
}
