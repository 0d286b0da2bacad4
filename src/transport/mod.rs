/*!
 * Transport layer used by the session manager.
 *
 * The manager never picks an HTTP client on its own; it is handed an
 * implementation of [`Transport`] at construction time:
 * - `http`: reqwest-backed client for the real endpoint
 * - `mock`: scripted transport for tests
 */

use async_trait::async_trait;
use serde_json::Value;
use std::fmt::{self, Debug};

use crate::errors::TransportError;

/// HTTP method of a transport request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw response handed back by a transport
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body, undecoded
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Canonical reason phrase for the status, if any
    pub fn reason(&self) -> Option<&'static str> {
        reqwest::StatusCode::from_u16(self.status)
            .ok()
            .and_then(|status| status.canonical_reason())
    }
}

/// Asynchronous request/response transport
///
/// Network-level failures are reported as `Err`; any HTTP status, including
/// error statuses, comes back as `Ok` so the caller can interpret the body.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Send one request
    ///
    /// # Arguments
    /// * `method` - HTTP method
    /// * `url` - Absolute URL
    /// * `body` - Parameters, encoded as the implementation sees fit
    async fn request(
        &self,
        method: HttpMethod,
        url: &str,
        body: &Value,
    ) -> Result<TransportResponse, TransportError>;
}

pub mod http;
pub mod mock;

pub use http::{BodyEncoding, HttpTransport};
pub use mock::{MockBehavior, MockTransport};
