/*!
 * Request signing for the session endpoint.
 *
 * The provider authenticates a session request without ever receiving the
 * application secret: the client sends its public parameters together with a
 * nonce, a timestamp and an HMAC-SHA1 signature computed over the canonical
 * form of those parameters.
 */

use std::fmt;

use hmac::{Hmac, Mac};
use log::trace;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha1::Sha1;

use crate::errors::SessionError;

type HmacSha1 = Hmac<Sha1>;

/// Upper bound (exclusive) of nonces drawn by [`NonceStrategy::Compat`]
pub const COMPAT_NONCE_BOUND: u64 = 10_000;

/// Application credentials issued by the provider
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ApplicationCredentials {
    /// Application identifier
    pub application_id: String,
    /// Public authorization key
    pub auth_key: String,
    /// Shared secret, used only as the HMAC key
    pub auth_secret: String,
}

impl ApplicationCredentials {
    pub fn new(
        application_id: impl Into<String>,
        auth_key: impl Into<String>,
        auth_secret: impl Into<String>,
    ) -> Self {
        Self {
            application_id: application_id.into(),
            auth_key: auth_key.into(),
            auth_secret: auth_secret.into(),
        }
    }

    /// Check that every field required for signing is present
    pub fn validate(&self) -> Result<(), SessionError> {
        let missing: Vec<&str> = [
            ("application_id", &self.application_id),
            ("auth_key", &self.auth_key),
            ("auth_secret", &self.auth_secret),
        ]
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(SessionError::InvalidCredentials(format!(
                "missing {}",
                missing.join(", ")
            )))
        }
    }
}

// The secret must never end up in logs
impl fmt::Debug for ApplicationCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationCredentials")
            .field("application_id", &self.application_id)
            .field("auth_key", &self.auth_key)
            .field("auth_secret", &"<redacted>")
            .finish()
    }
}

/// Signed parameters sent as the body of a session request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedRequest {
    pub application_id: String,
    pub auth_key: String,
    pub nonce: u64,
    pub timestamp: i64,
    /// Lowercase hex HMAC-SHA1 of the canonical parameter string
    pub signature: String,
}

/// How nonces are drawn
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NonceStrategy {
    /// Uniform in `[0, 10000)`, the range the provider's reference SDK uses
    #[default]
    Compat,
    /// Uniform over the full `u32` range
    Wide,
}

impl NonceStrategy {
    pub fn draw(&self) -> u64 {
        let mut rng = rand::rng();
        match self {
            Self::Compat => rng.random_range(0..COMPAT_NONCE_BOUND),
            Self::Wide => u64::from(rng.random::<u32>()),
        }
    }
}

/// Render `key=value` pairs, sort them by the whole pair string and join with `&`
///
/// Sorting on the rendered pair rather than on the key alone matches what the
/// provider computes on its side.
pub fn canonicalize<K, V, I>(params: I) -> String
where
    K: AsRef<str>,
    V: fmt::Display,
    I: IntoIterator<Item = (K, V)>,
{
    let mut pairs: Vec<String> = params
        .into_iter()
        .map(|(key, value)| format!("{}={}", key.as_ref(), value))
        .collect();
    pairs.sort();
    pairs.join("&")
}

/// Hex-encoded HMAC-SHA1 of `message` keyed with `secret`
pub fn hmac_sha1_hex(message: &str, secret: &str) -> String {
    // HMAC accepts keys of any length
    let mut mac = HmacSha1::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC-SHA1 accepts keys of any length"));
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Produces signed session request parameters
#[derive(Debug, Clone, Default)]
pub struct RequestSigner {
    nonce_strategy: NonceStrategy,
}

impl RequestSigner {
    pub fn new(nonce_strategy: NonceStrategy) -> Self {
        Self { nonce_strategy }
    }

    pub fn nonce_strategy(&self) -> NonceStrategy {
        self.nonce_strategy
    }

    /// Sign `credentials` with a fresh nonce and the current unix time
    pub fn sign(&self, credentials: &ApplicationCredentials) -> Result<SignedRequest, SessionError> {
        credentials.validate()?;
        let nonce = self.nonce_strategy.draw();
        let timestamp = chrono::Utc::now().timestamp();
        self.sign_at(credentials, nonce, timestamp)
    }

    /// Sign `credentials` with an explicit nonce and timestamp
    ///
    /// Pure: identical inputs always produce the identical signature.
    pub fn sign_at(
        &self,
        credentials: &ApplicationCredentials,
        nonce: u64,
        timestamp: i64,
    ) -> Result<SignedRequest, SessionError> {
        credentials.validate()?;

        let canonical = canonicalize([
            ("application_id", credentials.application_id.clone()),
            ("auth_key", credentials.auth_key.clone()),
            ("nonce", nonce.to_string()),
            ("timestamp", timestamp.to_string()),
        ]);
        trace!("Canonical session request: {}", canonical);

        let signature = hmac_sha1_hex(&canonical, &credentials.auth_secret);

        Ok(SignedRequest {
            application_id: credentials.application_id.clone(),
            auth_key: credentials.auth_key.clone(),
            nonce,
            timestamp,
            signature,
        })
    }
}
