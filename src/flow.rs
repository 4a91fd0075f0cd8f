use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;
use url::Url;

use crate::error::Error;
use crate::store::SessionStore;
use crate::traits::{AuthApi, Navigator};
use crate::types::{Credentials, Provider, Registration, SessionState};

/// Record of a federated login handoff.
///
/// Returned by [`FlowController::start_federated_login`]. The outcome of the
/// login is never threaded back through it: after the provider redirects
/// back, a new controller picks the session up in [`FlowController::initialize`].
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Handoff {
    pub provider: Provider,
    pub url: Url,
}

/// Sequences user actions into identity service calls and store writes.
///
/// The controller is the only writer of its [`SessionStore`]. Operations that
/// change auth state run one at a time: a login or registration submitted
/// while another operation is in flight is rejected with [`Error::Busy`],
/// while startup, refresh and logout wait their turn.
///
/// Every operation takes `&self`, so the controller can be shared behind an
/// `Arc` by the handlers that drive it. Once
/// [`start_federated_login`](Self::start_federated_login) has run the
/// controller is handed off: later operations fail with
/// [`Error::HandedOff`] and only [`logout`](Self::logout) still clears the
/// local session.
///
/// ```rust,ignore
/// let client = SessionClient::new(ClientConfig::from_env()?)?;
/// let flow = FlowController::new(client, |url: &Url| open_in_browser(url));
///
/// flow.initialize().await?;
/// if !flow.store().snapshot().session.is_authenticated() {
///     flow.submit_login(&Credentials::new("a@x.com", "p1")).await?;
/// }
/// ```
pub struct FlowController<A, N> {
    api: A,
    navigator: N,
    store: SessionStore,
    in_flight: Mutex<()>,
    handed_off: AtomicBool,
}

impl<A: AuthApi, N: Navigator> FlowController<A, N> {
    #[must_use]
    pub fn new(api: A, navigator: N) -> Self {
        Self {
            api,
            navigator,
            store: SessionStore::new(),
            in_flight: Mutex::new(()),
            handed_off: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Startup sequence: fetch the current session and seed the store.
    ///
    /// A failed startup fetch still ends the loading state: the store is left
    /// at [`SessionState::NoSession`] with the failure in `last_error`. Once
    /// startup has completed, this behaves like [`refresh`](Self::refresh).
    ///
    /// # Errors
    ///
    /// Returns the session fetch error, if any, or [`Error::HandedOff`].
    pub async fn initialize(&self) -> Result<SessionState, Error> {
        let _guard = self.in_flight.lock().await;
        self.ensure_not_handed_off()?;
        self.reconcile().await
    }

    /// Re-fetch the session and write it into the store without entering the
    /// loading state.
    ///
    /// # Errors
    ///
    /// Returns the session fetch error; the stored session is left as it was.
    /// Returns [`Error::HandedOff`] after a federated login has started.
    pub async fn refresh(&self) -> Result<SessionState, Error> {
        let _guard = self.in_flight.lock().await;
        self.ensure_not_handed_off()?;
        self.reconcile().await
    }

    /// Register a new account. Success does not log the user in.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] if another auth operation is in flight,
    /// [`Error::HandedOff`] after a federated login has started, or the
    /// registration failure (also recorded in `last_error`).
    pub async fn submit_registration(&self, registration: &Registration) -> Result<(), Error> {
        let _guard = self.try_begin("registration")?;
        self.store.clear_error();

        if let Err(e) = self.api.register(registration).await {
            tracing::info!(error = %e, "registration rejected");
            self.store.set_error(e.to_string());
            return Err(e);
        }
        tracing::info!("registration accepted");
        Ok(())
    }

    /// Log in with email and password, then re-fetch the session.
    ///
    /// The store is written only from the re-fetch, never from the login
    /// response.
    ///
    /// Dropping the returned future cancels the operation, but a drop that
    /// lands after the service accepted the login and before the re-fetch
    /// completes leaves the session cookie set while the store still holds
    /// the previous state. The next [`refresh`](Self::refresh) or
    /// [`initialize`](Self::initialize) reconciles it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] if another auth operation is in flight,
    /// [`Error::HandedOff`] after a federated login has started, or the login
    /// or re-fetch failure (also recorded in `last_error`). The stored session
    /// is untouched on failure.
    pub async fn submit_login(&self, credentials: &Credentials) -> Result<SessionState, Error> {
        let _guard = self.try_begin("login")?;
        self.store.clear_error();

        match self.api.login(credentials).await {
            Ok(token) => {
                tracing::info!(expires_in = ?token.expires_in, "login accepted, fetching session");
            }
            Err(e) => {
                tracing::info!(error = %e, "login rejected");
                self.store.set_error(e.to_string());
                return Err(e);
            }
        }
        self.reconcile().await
    }

    /// Log out remotely (best-effort), then clear the local session
    /// regardless of how the remote call went. Runs even after a federated
    /// handoff.
    pub async fn logout(&self) {
        let _guard = self.in_flight.lock().await;
        self.api.logout().await;
        self.store.clear_session();
        tracing::info!("logged out");
    }

    /// Hand navigation to the federated `provider`.
    ///
    /// Terminal for this controller: every later operation except
    /// [`logout`](Self::logout) fails with [`Error::HandedOff`]. The login
    /// result is only observable from a fresh controller's
    /// [`initialize`](Self::initialize) once the browser comes back.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] if another auth operation is in flight, or
    /// [`Error::HandedOff`] if a federated login was already started. The
    /// navigator is not called in either case.
    pub fn start_federated_login(&self, provider: &Provider) -> Result<Handoff, Error> {
        let _guard = self.try_begin("federated login")?;
        self.handed_off.store(true, Ordering::SeqCst);

        let url = self.api.authorization_url(provider);
        tracing::info!(provider = %provider, url = %url, "starting federated login");
        self.navigator.navigate(&url);
        Ok(Handoff {
            provider: provider.clone(),
            url,
        })
    }

    fn try_begin(&self, operation: &'static str) -> Result<tokio::sync::MutexGuard<'_, ()>, Error> {
        let guard = self.in_flight.try_lock().map_err(|_| {
            tracing::debug!(operation, "auth operation already in flight, ignoring");
            Error::Busy
        })?;
        self.ensure_not_handed_off()?;
        Ok(guard)
    }

    fn ensure_not_handed_off(&self) -> Result<(), Error> {
        if self.handed_off.load(Ordering::SeqCst) {
            tracing::debug!("federated login already started, ignoring");
            return Err(Error::HandedOff);
        }
        Ok(())
    }

    /// Fetch the session and write the result. The first call completes the
    /// startup sequence; later calls never touch `initializing`.
    async fn reconcile(&self) -> Result<SessionState, Error> {
        let starting = self.store.is_initializing();
        match self.api.fetch_session().await {
            Ok(session) => {
                if starting {
                    self.store.finish_initialization(session.clone(), None);
                } else {
                    self.store.set_session(session.clone());
                }
                Ok(session)
            }
            Err(e) => {
                tracing::error!(error = %e, starting, "session fetch failed");
                if starting {
                    self.store
                        .finish_initialization(SessionState::NoSession, Some(e.to_string()));
                } else {
                    self.store.set_error(e.to_string());
                }
                Err(e)
            }
        }
    }
}
