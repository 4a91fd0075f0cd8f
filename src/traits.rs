use std::future::Future;

use url::Url;

use crate::error::Error;
use crate::types::{AccessToken, Credentials, Provider, Registration, SessionState};

/// Remote identity service operations the flow controller sequences.
///
/// [`SessionClient`](crate::SessionClient) is the HTTP implementation. The
/// session cookie is the implementation's business: every call except
/// [`authorization_url`](AuthApi::authorization_url) is expected to carry it
/// and to honour cookies the service sets or clears.
///
/// # Example
///
/// ```rust,ignore
/// impl AuthApi for ScriptedService {
///     async fn register(&self, _: &Registration) -> Result<(), Error> { Ok(()) }
///     async fn login(&self, _: &Credentials) -> Result<AccessToken, Error> {
///         Ok(AccessToken::default())
///     }
///     async fn logout(&self) {}
///     async fn fetch_session(&self) -> Result<SessionState, Error> {
///         Ok(SessionState::NoSession)
///     }
///     fn authorization_url(&self, provider: &Provider) -> Url {
///         format!("https://id.test/oauth2/authorization/{provider}").parse().unwrap()
///     }
/// }
/// ```
pub trait AuthApi: Send + Sync + 'static {
    /// Create an account. Does not authenticate.
    fn register(
        &self,
        registration: &Registration,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// Exchange credentials; the service sets the session cookie on success.
    fn login(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<AccessToken, Error>> + Send;

    /// Ask the service to clear the session cookie. Best-effort: failures are
    /// the implementation's to log, never the caller's to handle.
    fn logout(&self) -> impl Future<Output = ()> + Send;

    /// Current session, or [`SessionState::NoSession`] when unauthenticated.
    fn fetch_session(&self) -> impl Future<Output = Result<SessionState, Error>> + Send;

    /// Where to send the browser to start a federated login.
    fn authorization_url(&self, provider: &Provider) -> Url;
}

/// Hands a URL to whatever owns top-level navigation (browser, webview, shell).
///
/// Navigation is one-way: once called, the current process instance is not
/// expected to observe the outcome.
pub trait Navigator: Send + Sync {
    fn navigate(&self, url: &Url);
}

impl<F> Navigator for F
where
    F: Fn(&Url) + Send + Sync,
{
    fn navigate(&self, url: &Url) {
        self(url);
    }
}
