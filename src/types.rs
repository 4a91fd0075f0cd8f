use std::fmt;

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

/// Opaque user identifier assigned by the identity service.
///
/// Services send it as either a JSON number or a string; both normalize to
/// the textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(from = "RawId")]
pub struct UserId(pub String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(serde_json::Number),
    Text(String),
}

impl From<RawId> for UserId {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Number(n) => Self(n.to_string()),
            RawId::Text(s) => Self(s),
        }
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Server-confirmed identity as returned by the current-session endpoint.
///
/// The identifier is read from `id`, or from `sub` when the service speaks
/// in token claims. Every field the service returns beyond `id`, `name` and
/// `email` is kept verbatim in `profile`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
#[non_exhaustive]
pub struct Session {
    pub id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

impl Session {
    /// Create a session with only the identifier set.
    #[must_use]
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            name: None,
            email: None,
            profile: Map::new(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set a profile field.
    ///
    /// `id`, `name` and `email` go to the typed fields, read the same way as
    /// a session body: an identifier that is neither a number nor a
    /// non-empty string is ignored, and a non-string name or email stays in
    /// the profile.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        let value = value.into();
        match key.as_str() {
            "id" => match value {
                Value::Number(n) => self.id = UserId(n.to_string()),
                Value::String(s) if !s.is_empty() => self.id = UserId(s),
                _ => {}
            },
            "name" => self.name = string_or_profile(&mut self.profile, "name", value),
            "email" => self.email = string_or_profile(&mut self.profile, "email", value),
            _ => {
                self.profile.insert(key, value);
            }
        }
        self
    }

    /// Best label for the user: name, then email, then the raw identifier.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(self.id.0.as_str())
    }

    /// Look up an additional server-defined profile field.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.profile.get(key)
    }
}

impl TryFrom<Map<String, Value>> for Session {
    type Error = &'static str;

    fn try_from(mut fields: Map<String, Value>) -> Result<Self, Self::Error> {
        // `id` wins; a `sub` claim alongside it stays in the profile.
        let raw_id = match fields.remove("id") {
            Some(id) => id,
            None => fields.remove("sub").ok_or("session body has no `id` or `sub`")?,
        };
        let id = match raw_id {
            Value::Number(n) => UserId(n.to_string()),
            Value::String(s) if !s.is_empty() => UserId(s),
            _ => return Err("session identifier must be a non-empty string or a number"),
        };
        let name = take_string(&mut fields, "name");
        let email = take_string(&mut fields, "email");

        Ok(Self {
            id,
            name,
            email,
            profile: fields,
        })
    }
}

fn take_string(fields: &mut Map<String, Value>, key: &str) -> Option<String> {
    match fields.remove(key) {
        Some(Value::String(s)) => Some(s),
        Some(Value::Null) | None => None,
        Some(other) => {
            fields.insert(key.to_owned(), other);
            None
        }
    }
}

fn string_or_profile(profile: &mut Map<String, Value>, key: &str, value: Value) -> Option<String> {
    profile.remove(key);
    match value {
        Value::String(s) => Some(s),
        Value::Null => None,
        other => {
            profile.insert(key.to_owned(), other);
            None
        }
    }
}

/// Who is logged in, as last confirmed by the identity service.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    /// Not authenticated. A normal outcome, never an error.
    #[default]
    NoSession,
    Active(Session),
}

impl SessionState {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::Active(session) => Some(session),
            Self::NoSession => None,
        }
    }
}

impl From<Option<Session>> for SessionState {
    fn from(session: Option<Session>) -> Self {
        session.map_or(Self::NoSession, Self::Active)
    }
}

/// Access token bundle from a successful login.
///
/// Advisory only: the session cookie set alongside it is what authenticates
/// later requests, and session state always comes from a fresh session fetch.
#[derive(Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct AccessToken {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl AccessToken {
    /// Parse a login response body; an absent or malformed body yields an
    /// empty bundle.
    #[must_use]
    pub fn from_body(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_default()
    }

    /// Token scheme, `Bearer` unless the service says otherwise.
    #[must_use]
    pub fn token_type(&self) -> &str {
        self.token_type.as_deref().unwrap_or("Bearer")
    }

    #[must_use]
    pub fn lifetime(&self) -> Option<time::Duration> {
        self.expires_in
            .and_then(|secs| i64::try_from(secs).ok())
            .map(time::Duration::seconds)
    }

    /// Expiry instant relative to `issued_at`.
    #[must_use]
    pub fn expires_at(&self, issued_at: time::OffsetDateTime) -> Option<time::OffsetDateTime> {
        self.lifetime().and_then(|d| issued_at.checked_add(d))
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &self.access_token.as_ref().map(|_| "[redacted]"))
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Sign-up form input. Lives only for the duration of the register call.
#[derive(Clone, Serialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl Registration {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"[redacted]")
            .finish()
    }
}

/// Email/password login input. Lives only for the duration of the login call.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[redacted]")
            .finish()
    }
}

/// Federated identity provider registered with the identity service.
///
/// Guaranteed valid by construction: lowercase ASCII letters, digits, `-`
/// and `_`. Use `"google".parse::<Provider>()` or [`Provider::google`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(try_from = "String", into = "String")]
pub struct Provider(String);

impl Provider {
    #[must_use]
    pub fn google() -> Self {
        Self("google".into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Provider {
    fn default() -> Self {
        Self::google()
    }
}

impl std::str::FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_owned())
    }
}

impl TryFrom<String> for Provider {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let valid = !s.is_empty()
            && s
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_');
        if valid {
            Ok(Self(s))
        } else {
            Err(Error::InvalidProvider(s))
        }
    }
}

impl From<Provider> for String {
    fn from(p: Provider) -> Self {
        p.0
    }
}
