/*!
 * Session-specific models.
 *
 * These structures describe the session issued by the provider, the state
 * machine of the manager, and the data an external persistence layer may
 * keep between runs.
 */

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::signer::{ApplicationCredentials, SignedRequest};
use crate::transport::HttpMethod;

/// Session issued by the provider
///
/// Only the token is required. Every other field the provider assigns is kept
/// verbatim in `extra`; the typed accessors read from it and return `None`
/// when a field is absent or has an unexpected shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Token authorizing subsequent API calls
    pub token: String,
    /// Provider-assigned fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Session {
    /// Session carrying only a token
    pub fn from_token(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            extra: Map::new(),
        }
    }

    /// Look up a provider-assigned field
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }

    /// Provider record id (`_id`, or `id` when no `_id` is present)
    pub fn id(&self) -> Option<String> {
        self.text_field("_id").or_else(|| self.text_field("id"))
    }

    pub fn application_id(&self) -> Option<String> {
        self.text_field("application_id")
    }

    /// User bound to the session, if any
    pub fn user_id(&self) -> Option<u64> {
        match self.field("user_id")? {
            Value::Number(number) => number.as_u64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn nonce(&self) -> Option<u64> {
        match self.field("nonce")? {
            Value::Number(number) => number.as_u64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn ts(&self) -> Option<i64> {
        match self.field("ts")? {
            Value::Number(number) => number.as_i64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn created_at(&self) -> Option<String> {
        self.text_field("created_at")
    }

    pub fn updated_at(&self) -> Option<String> {
        self.text_field("updated_at")
    }

    /// Short token prefix, safe for logs
    pub fn token_hint(&self) -> &str {
        token_hint(&self.token)
    }

    // Strings as-is, numbers in their JSON form
    fn text_field(&self, name: &str) -> Option<String> {
        match self.field(name)? {
            Value::String(text) => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        }
    }
}

/// First characters of a token, safe for logs
pub(crate) fn token_hint(token: &str) -> &str {
    let end = token
        .char_indices()
        .nth(8)
        .map(|(index, _)| index)
        .unwrap_or(token.len());
    &token[..end]
}

/// Success body of the session endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct SessionResponse {
    pub session: Session,
}

/// Lifecycle state of a session manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Nothing attempted yet, or destroyed
    #[default]
    Uninitialized,
    /// A creation attempt is in flight
    Creating,
    /// The last attempt succeeded
    Created,
    /// The last attempt failed
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Creating => "creating",
            Self::Created => "created",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// User login parameters, kept for a later user-session upgrade
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCredentials {
    pub login: String,
    pub password: String,
}

impl UserCredentials {
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for UserCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserCredentials")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The most recent request issued by a manager
#[derive(Debug, Clone, PartialEq)]
pub struct LastRequest {
    pub method: HttpMethod,
    pub url: String,
    pub params: SignedRequest,
    pub sent_at: DateTime<Utc>,
}

/// What an external persistence layer needs to reuse a session later
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub application_id: String,
    pub token: String,
    pub saved_at: DateTime<Utc>,
}

impl PersistedSession {
    pub fn new(application_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            application_id: application_id.into(),
            token: token.into(),
            saved_at: Utc::now(),
        }
    }

    /// Whether the saved token is older than `max_age`
    pub fn is_expired(&self, max_age: Duration) -> bool {
        self.is_expired_at(max_age, Utc::now())
    }

    pub fn is_expired_at(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        now - self.saved_at >= max_age
    }

    /// Whether the saved token was issued to the given application
    pub fn matches(&self, credentials: &ApplicationCredentials) -> bool {
        self.application_id == credentials.application_id
    }
}
