/*!
 * Mock transport for testing.
 *
 * This module provides a transport that simulates the session endpoint:
 * - `MockTransport::working(token)` - Always creates a session with `token`
 * - `MockTransport::rejecting(status, message)` - Answers with an error status
 * - `MockTransport::malformed(body)` - Success status with an arbitrary body
 * - `MockTransport::failing()` - Fails at the network level
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{HttpMethod, Transport, TransportResponse};
use crate::errors::TransportError;

/// A request observed by the mock
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: HttpMethod,
    pub url: String,
    pub body: Value,
}

/// Behavior mode for the mock transport
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Always creates a session with the given token
    Working { token: String },
    /// Creates a session whose token is `token-<n>`, n counting from 1
    Numbered,
    /// Answers with an error status and a provider-style `errors` body
    Rejecting { status_code: u16, message: String },
    /// Answers with the given status and raw body
    Raw { status_code: u16, body: String },
    /// Fails with a connection error
    Failing,
    /// Waits before creating a session with the given token
    Slow { delay_ms: u64, token: String },
}

/// Mock transport for testing session behavior
#[derive(Debug, Clone)]
pub struct MockTransport {
    /// Behavior mode
    behavior: MockBehavior,
    /// Number of requests received
    request_count: Arc<AtomicUsize>,
    /// Most recent request
    last_request: Arc<Mutex<Option<RecordedRequest>>>,
}

impl MockTransport {
    /// Create a new mock transport with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    pub fn working(token: impl Into<String>) -> Self {
        Self::new(MockBehavior::Working {
            token: token.into(),
        })
    }

    pub fn numbered() -> Self {
        Self::new(MockBehavior::Numbered)
    }

    pub fn rejecting(status_code: u16, message: impl Into<String>) -> Self {
        Self::new(MockBehavior::Rejecting {
            status_code,
            message: message.into(),
        })
    }

    /// Success status (201) with an arbitrary body
    pub fn malformed(body: impl Into<String>) -> Self {
        Self::raw(201, body)
    }

    pub fn raw(status_code: u16, body: impl Into<String>) -> Self {
        Self::new(MockBehavior::Raw {
            status_code,
            body: body.into(),
        })
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn slow(delay_ms: u64, token: impl Into<String>) -> Self {
        Self::new(MockBehavior::Slow {
            delay_ms,
            token: token.into(),
        })
    }

    /// Number of requests received so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// The most recent request, if any
    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.last_request.lock().clone()
    }

    /// Body of a successful session response, shaped like the provider's
    pub fn session_body(token: &str, body: &Value) -> String {
        json!({
            "session": {
                "_id": "5d2d7b6ba28f9a1d8b3e0f1c",
                "id": 1,
                "application_id": body.get("application_id").cloned().unwrap_or(Value::Null),
                "nonce": body.get("nonce").cloned().unwrap_or(Value::Null),
                "ts": body.get("timestamp").cloned().unwrap_or(Value::Null),
                "token": token,
                "user_id": 0,
                "created_at": "2026-01-01T00:00:00Z",
                "updated_at": "2026-01-01T00:00:00Z"
            }
        })
        .to_string()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(
        &self,
        method: HttpMethod,
        url: &str,
        body: &Value,
    ) -> Result<TransportResponse, TransportError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_request.lock() = Some(RecordedRequest {
            method,
            url: url.to_string(),
            body: body.clone(),
        });

        match &self.behavior {
            MockBehavior::Working { token } => {
                Ok(TransportResponse::new(201, Self::session_body(token, body)))
            }
            MockBehavior::Numbered => Ok(TransportResponse::new(
                201,
                Self::session_body(&format!("token-{}", count), body),
            )),
            MockBehavior::Rejecting {
                status_code,
                message,
            } => Ok(TransportResponse::new(
                *status_code,
                json!({ "errors": { "base": [message] } }).to_string(),
            )),
            MockBehavior::Raw { status_code, body } => {
                Ok(TransportResponse::new(*status_code, body.clone()))
            }
            MockBehavior::Failing => Err(TransportError::ConnectionError(
                "Connection refused".to_string(),
            )),
            MockBehavior::Slow { delay_ms, token } => {
                tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                Ok(TransportResponse::new(201, Self::session_body(token, body)))
            }
        }
    }
}
