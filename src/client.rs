use reqwest::StatusCode;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{self, Error};
use crate::traits::AuthApi;
use crate::types::{AccessToken, Credentials, Provider, Registration, Session, SessionState};

/// HTTP client for the identity service's session endpoints.
///
/// Holds no auth state of its own. The session cookie lives in the
/// underlying `reqwest` cookie store, which attaches it to every request and
/// applies whatever the service sets or clears.
#[derive(Debug, Clone)]
pub struct SessionClient {
    config: ClientConfig,
    http: reqwest::Client,
}

impl SessionClient {
    /// Create a client with its own cookie-storing HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built (e.g. the
    /// TLS backend fails to initialize).
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder().cookie_store(true).build()?;
        Ok(Self { config, http })
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    ///
    /// The client must have a cookie store enabled, otherwise the session
    /// cookie set at login is lost and every session fetch reads as
    /// [`SessionState::NoSession`]. The configured request timeout still
    /// applies, on top of any timeout `client` was built with.
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Create an account.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Registration`] if the service rejects the request, or
    /// [`Error::Http`] if the request could not complete.
    pub async fn register(&self, registration: &Registration) -> Result<(), Error> {
        let response = self
            .bounded(self.http.post(self.config.endpoint("register")))
            .json(registration)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(status = status.as_u16(), "registration accepted");
            return Ok(());
        }
        let message = Self::failure_message(response, "registration").await;
        Err(Error::Registration {
            status: status.as_u16(),
            message,
        })
    }

    /// Exchange credentials for an access token bundle. On success the
    /// service also sets the session cookie.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Login`] if the service rejects the credentials, or
    /// [`Error::Http`] if the request could not complete.
    pub async fn login(&self, credentials: &Credentials) -> Result<AccessToken, Error> {
        let response = self
            .bounded(self.http.post(self.config.endpoint("login")))
            .json(credentials)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = Self::failure_message(response, "login").await;
            return Err(Error::Login {
                status: status.as_u16(),
                message,
            });
        }
        let body = response.bytes().await.unwrap_or_default();
        Ok(AccessToken::from_body(&body))
    }

    /// Ask the service to clear the session cookie. Never fails: problems are
    /// logged and dropped.
    pub async fn logout(&self) {
        let request = self.bounded(self.http.post(self.config.endpoint("logout")));
        match request.send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!("remote logout acknowledged");
            }
            Ok(response) => {
                tracing::warn!(status = response.status().as_u16(), "remote logout rejected");
            }
            Err(e) => {
                tracing::warn!(error = %e, "remote logout failed");
            }
        }
    }

    /// Fetch the current session.
    ///
    /// `401 Unauthorized` is the normal "not logged in" answer and maps to
    /// [`SessionState::NoSession`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Session`] for any other non-success status, or
    /// [`Error::Http`] on network failure or an unreadable session body.
    pub async fn fetch_session(&self) -> Result<SessionState, Error> {
        let response = self
            .bounded(self.http.get(self.config.endpoint("me")))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Ok(SessionState::NoSession);
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Session {
                status: status.as_u16(),
                detail,
            });
        }
        let session = response.json::<Session>().await?;
        Ok(SessionState::Active(session))
    }

    /// Authorization URL that hands the browser to `provider`.
    #[must_use]
    pub fn authorization_url(&self, provider: &Provider) -> Url {
        self.config.authorization_url(provider)
    }

    /// Applies the configured request timeout, if any.
    fn bounded(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.request_timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        }
    }

    /// Reads a failed response body into a user-facing message. A body that
    /// cannot be read counts as empty.
    async fn failure_message(response: reqwest::Response, operation: &'static str) -> String {
        let status = response.status().as_u16();
        let body = response.bytes().await.unwrap_or_default();
        let message = error::service_message(operation, status, &body);
        tracing::debug!(operation, status, message = %message, "identity service rejected request");
        message
    }
}

impl AuthApi for SessionClient {
    async fn register(&self, registration: &Registration) -> Result<(), Error> {
        SessionClient::register(self, registration).await
    }

    async fn login(&self, credentials: &Credentials) -> Result<AccessToken, Error> {
        SessionClient::login(self, credentials).await
    }

    async fn logout(&self) {
        SessionClient::logout(self).await;
    }

    async fn fetch_session(&self) -> Result<SessionState, Error> {
        SessionClient::fetch_session(self).await
    }

    fn authorization_url(&self, provider: &Provider) -> Url {
        SessionClient::authorization_url(self, provider)
    }
}
