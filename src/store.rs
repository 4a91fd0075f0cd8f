use tokio::sync::watch;

use crate::types::{Session, SessionState};

/// Everything the presentation layer renders about authentication.
///
/// Each transition publishes a fresh snapshot; a snapshot never changes after
/// it is published.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct AuthSnapshot {
    pub session: SessionState,
    /// True only while the startup session fetch is outstanding.
    pub initializing: bool,
    /// Latest user-facing error message, if any.
    pub last_error: Option<String>,
}

impl AuthSnapshot {
    fn starting() -> Self {
        Self {
            session: SessionState::NoSession,
            initializing: true,
            last_error: None,
        }
    }

    #[must_use]
    pub fn current_session(&self) -> Option<&Session> {
        self.session.session()
    }
}

/// In-memory record of who is logged in.
///
/// Readers take [`snapshot`](Self::snapshot)s or [`subscribe`](Self::subscribe)
/// to changes. Writes are crate-private: only the flow controller moves the
/// state, so every value here traces back to a session fetch or a logout.
#[derive(Debug)]
pub struct SessionStore {
    tx: watch::Sender<AuthSnapshot>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// Fresh store in the startup state: no session, initializing.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(AuthSnapshot::starting());
        Self { tx }
    }

    #[must_use]
    pub fn snapshot(&self) -> AuthSnapshot {
        self.tx.borrow().clone()
    }

    /// Receiver that observes every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.tx.subscribe()
    }

    #[must_use]
    pub fn is_initializing(&self) -> bool {
        self.tx.borrow().initializing
    }

    /// Completes the startup sequence. Later calls leave `initializing` false.
    pub(crate) fn finish_initialization(&self, session: SessionState, error: Option<String>) {
        self.transition(|prev| AuthSnapshot {
            session,
            initializing: false,
            last_error: error.or_else(|| prev.last_error.clone()),
        });
    }

    /// Records a session fetch result outside of startup.
    pub(crate) fn set_session(&self, session: SessionState) {
        self.transition(|prev| AuthSnapshot {
            session,
            initializing: prev.initializing,
            last_error: prev.last_error.clone(),
        });
    }

    pub(crate) fn clear_session(&self) {
        self.set_session(SessionState::NoSession);
    }

    pub(crate) fn set_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.transition(|prev| AuthSnapshot {
            session: prev.session.clone(),
            initializing: prev.initializing,
            last_error: Some(message),
        });
    }

    pub(crate) fn clear_error(&self) {
        if self.tx.borrow().last_error.is_none() {
            return;
        }
        self.transition(|prev| AuthSnapshot {
            session: prev.session.clone(),
            initializing: prev.initializing,
            last_error: None,
        });
    }

    fn transition(&self, next: impl FnOnce(&AuthSnapshot) -> AuthSnapshot) {
        let snapshot = next(&*self.tx.borrow());
        tracing::trace!(
            authenticated = snapshot.session.is_authenticated(),
            initializing = snapshot.initializing,
            has_error = snapshot.last_error.is_some(),
            "auth state transition"
        );
        self.tx.send_replace(snapshot);
    }
}
