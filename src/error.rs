use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The identity service rejected a registration.
    #[error("{message}")]
    Registration { status: u16, message: String },

    /// The identity service rejected a login.
    #[error("{message}")]
    Login { status: u16, message: String },

    /// The current-session endpoint failed with something other than `401`.
    #[error("session request failed with status {status}")]
    Session { status: u16, detail: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Another state-mutating auth operation is still in flight.
    #[error("another authentication request is already in progress")]
    Busy,

    /// The controller has handed navigation to a federated provider and
    /// accepts no further auth operations.
    #[error("federated login already started")]
    HandedOff,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("invalid provider name: {0:?}")]
    InvalidProvider(String),
}

impl Error {
    /// HTTP status reported by the identity service, if the failure carried one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Registration { status, .. }
            | Self::Login { status, .. }
            | Self::Session { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Structured error body: `{"error": "..."}`. Anything else reads as empty.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

/// Picks the user-facing message out of a failed response body.
///
/// Falls back to `"{operation} failed with status {status}"` when the body is
/// absent, not JSON, or carries no usable `error` field.
pub(crate) fn service_message(operation: &str, status: u16, body: &[u8]) -> String {
    serde_json::from_slice::<ErrorBody>(body)
        .unwrap_or_default()
        .error
        .map(|m| m.trim().to_owned())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("{operation} failed with status {status}"))
}
