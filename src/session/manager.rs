/*!
 * Session manager for the application session lifecycle.
 *
 * This module handles:
 * - Signing and sending session creation requests
 * - Tracking the session state machine and the issued token
 * - Serializing overlapping creation attempts
 * - Reestablishment for higher-level recovery flows
 */

use anyhow::{Context, Result};
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::app_config::Config;
use crate::errors::SessionError;
use crate::signer::{ApplicationCredentials, RequestSigner, SignedRequest};
use crate::transport::{HttpMethod, HttpTransport, Transport, TransportResponse};

use super::models::{
    LastRequest, PersistedSession, Session, SessionResponse, SessionState, UserCredentials,
    token_hint,
};

/// Callback notified when a session cannot be reestablished
pub type ErrorHook = Arc<dyn Fn(&SessionError) + Send + Sync>;

/// Longest provider error body echoed back in an error message
const MAX_ERROR_BODY_CHARS: usize = 200;

struct ManagerState {
    state: SessionState,
    session: Option<Session>,
    last_request: Option<LastRequest>,
    user_params: Option<UserCredentials>,
    on_error: Option<ErrorHook>,
    /// Completed creation attempts
    attempts: u64,
    /// Outcome of the most recent completed attempt
    last_outcome: Option<Result<String, SessionError>>,
}

impl Default for ManagerState {
    fn default() -> Self {
        Self {
            state: SessionState::Uninitialized,
            session: None,
            last_request: None,
            user_params: None,
            on_error: None,
            attempts: 0,
            last_outcome: None,
        }
    }
}

/// Session manager for one application session
pub struct SessionManager {
    app_params: ApplicationCredentials,
    signer: RequestSigner,
    transport: Arc<dyn Transport>,
    session_url: String,
    inner: Mutex<ManagerState>,
    /// Held for the whole duration of a creation attempt
    creation: tokio::sync::Mutex<()>,
    reestablishing: AtomicBool,
}

/// Puts the state back if an attempt is dropped before it completes
struct CreatingGuard<'a> {
    inner: &'a Mutex<ManagerState>,
    previous: SessionState,
    armed: bool,
}

impl Drop for CreatingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut inner = self.inner.lock();
            if inner.state == SessionState::Creating {
                inner.state = self.previous;
            }
        }
    }
}

/// Clears the reestablishment flag when the attempt ends
struct ReestablishFlag<'a>(&'a AtomicBool);

impl Drop for ReestablishFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SessionManager {
    /// Create a new session manager. No request is sent.
    pub fn new(
        app_params: ApplicationCredentials,
        transport: Arc<dyn Transport>,
        session_url: impl Into<String>,
    ) -> Self {
        Self {
            app_params,
            signer: RequestSigner::default(),
            transport,
            session_url: session_url.into(),
            inner: Mutex::new(ManagerState::default()),
            creation: tokio::sync::Mutex::new(()),
            reestablishing: AtomicBool::new(false),
        }
    }

    /// Create a session manager talking to the endpoint described by `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate().context("Invalid session configuration")?;

        let transport = HttpTransport::new(Duration::from_secs(config.api.timeout_secs))
            .encoding(config.api.body_encoding)
            .api_version(config.api.api_version.clone());

        let manager = Self::new(
            config.credentials.clone(),
            Arc::new(transport),
            config.session_url()?,
        )
        .with_signer(RequestSigner::new(config.signing.nonce_strategy));

        Ok(manager)
    }

    /// Replace the request signer
    pub fn with_signer(mut self, signer: RequestSigner) -> Self {
        self.signer = signer;
        self
    }

    /// Install the error hook at construction time
    pub fn with_on_error(self, hook: ErrorHook) -> Self {
        self.set_on_error(hook);
        self
    }

    // =========================================================================
    // Session Creation
    // =========================================================================

    /// Create a new application session and return its token
    ///
    /// Overlapping calls are serialized: a caller that waited while another
    /// attempt completed receives that attempt's outcome.
    ///
    /// Dropping the returned future cancels the attempt: the in-flight
    /// request is dropped with it, the state goes back to what it was before
    /// the attempt, and only the last request stays recorded. Callers that
    /// need the request to run to completion should drive the future to the
    /// end, for instance in a spawned task.
    pub async fn create_session(&self) -> Result<String, SessionError> {
        let observed = self.inner.lock().attempts;
        let _creation = self.creation.lock().await;

        {
            let inner = self.inner.lock();
            if inner.attempts != observed {
                if let Some(outcome) = &inner.last_outcome {
                    debug!("Sharing the outcome of the session attempt that just completed");
                    return outcome.clone();
                }
            }
        }

        let outcome = self.attempt_creation().await;

        let mut inner = self.inner.lock();
        inner.attempts += 1;
        inner.last_outcome = Some(outcome.clone());
        outcome
    }

    async fn attempt_creation(&self) -> Result<String, SessionError> {
        let params = match self.signer.sign(&self.app_params) {
            Ok(params) => params,
            Err(e) => {
                warn!("Cannot sign session request: {}", e);
                self.record_failure();
                return Err(e);
            }
        };

        let body = signed_body(&params);

        let mut guard = {
            let mut inner = self.inner.lock();
            let previous = inner.state;
            inner.state = SessionState::Creating;
            inner.last_request = Some(LastRequest {
                method: HttpMethod::Post,
                url: self.session_url.clone(),
                params,
                sent_at: chrono::Utc::now(),
            });
            CreatingGuard {
                inner: &self.inner,
                previous,
                armed: true,
            }
        };

        info!(
            "Creating session for application {}",
            self.app_params.application_id
        );

        let result = match self
            .transport
            .request(HttpMethod::Post, &self.session_url, &body)
            .await
        {
            Ok(response) => parse_session_response(&response),
            Err(e) => Err(SessionError::from(e)),
        };

        guard.armed = false;

        match result {
            Ok(session) => {
                let token = session.token.clone();
                debug!("Session created (token {}...)", session.token_hint());

                let mut inner = self.inner.lock();
                inner.session = Some(session);
                inner.state = SessionState::Created;
                Ok(token)
            }
            Err(e) => {
                warn!("Session creation failed: {}", e);
                self.record_failure();
                Err(e)
            }
        }
    }

    fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.session = None;
        inner.state = SessionState::Failed;
    }

    /// Create the session again on behalf of a recovery flow
    ///
    /// Fails immediately if a reestablishment is already running. When the
    /// new attempt fails the error hook is notified before the error is
    /// returned.
    pub async fn reestablish_session(&self) -> Result<String, SessionError> {
        if self.reestablishing.swap(true, Ordering::SeqCst) {
            return Err(SessionError::ReestablishInProgress);
        }
        let _flag = ReestablishFlag(&self.reestablishing);

        info!(
            "Reestablishing session for application {}",
            self.app_params.application_id
        );

        let result = self.create_session().await;
        if let Err(e) = &result {
            self.notify_error(e);
        }
        result
    }

    pub fn is_reestablishing(&self) -> bool {
        self.reestablishing.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Error Hook
    // =========================================================================

    /// Set the callback notified when a session cannot be recovered
    pub fn set_on_error(&self, hook: ErrorHook) {
        self.inner.lock().on_error = Some(hook);
    }

    pub fn has_on_error(&self) -> bool {
        self.inner.lock().on_error.is_some()
    }

    /// Invoke the error hook, if one is set
    pub fn notify_error(&self, error: &SessionError) {
        // Never call user code with the state lock held
        let hook = self.inner.lock().on_error.clone();
        if let Some(hook) = hook {
            hook(error);
        }
    }

    // =========================================================================
    // State Accessors
    // =========================================================================

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    /// True iff a session is held and the last attempt succeeded
    pub fn is_session_created(&self) -> bool {
        let inner = self.inner.lock();
        inner.state == SessionState::Created && inner.session.is_some()
    }

    pub fn session(&self) -> Option<Session> {
        self.inner.lock().session.clone()
    }

    pub fn token(&self) -> Option<String> {
        self.inner.lock().session.as_ref().map(|s| s.token.clone())
    }

    pub fn last_request(&self) -> Option<LastRequest> {
        self.inner.lock().last_request.clone()
    }

    pub fn credentials(&self) -> &ApplicationCredentials {
        &self.app_params
    }

    pub fn session_url(&self) -> &str {
        &self.session_url
    }

    pub fn set_user_params(&self, params: UserCredentials) {
        self.inner.lock().user_params = Some(params);
    }

    pub fn user_params(&self) -> Option<UserCredentials> {
        self.inner.lock().user_params.clone()
    }

    /// Data an external persistence layer can store to reuse the token
    pub fn snapshot(&self) -> Option<PersistedSession> {
        let inner = self.inner.lock();
        match (&inner.state, &inner.session) {
            (SessionState::Created, Some(session)) => Some(PersistedSession::new(
                self.app_params.application_id.clone(),
                session.token.clone(),
            )),
            _ => None,
        }
    }

    /// Forget the session, the last request, user params and the error hook
    pub fn destroy(&self) {
        let mut inner = self.inner.lock();
        if let Some(session) = &inner.session {
            info!("Destroying session {}...", token_hint(&session.token));
        }
        let attempts = inner.attempts;
        *inner = ManagerState {
            attempts,
            ..ManagerState::default()
        };
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("app_params", &self.app_params)
            .field("session_url", &self.session_url)
            .field("state", &self.state())
            .finish()
    }
}

/// Request body for a signed session request
fn signed_body(params: &SignedRequest) -> Value {
    json!({
        "application_id": params.application_id,
        "auth_key": params.auth_key,
        "nonce": params.nonce,
        "timestamp": params.timestamp,
        "signature": params.signature,
    })
}

/// Interpret a session endpoint response
pub fn parse_session_response(response: &TransportResponse) -> Result<Session, SessionError> {
    if !response.is_success() {
        let message = extract_error_message(&response.body)
            .or_else(|| response.reason().map(str::to_string))
            .unwrap_or_else(|| format!("HTTP {}", response.status));
        return Err(SessionError::AuthenticationRejected {
            status_code: response.status,
            message,
        });
    }

    let body: Value = serde_json::from_str(&response.body)
        .map_err(|e| SessionError::MalformedResponse(format!("body is not JSON: {}", e)))?;

    match body.get("session") {
        Some(value) if value.is_object() => {}
        Some(_) => {
            return Err(SessionError::MalformedResponse(
                "`session` is not an object".to_string(),
            ));
        }
        None => {
            return Err(SessionError::MalformedResponse(
                "missing `session` object".to_string(),
            ));
        }
    }

    let SessionResponse { session } = serde_json::from_value(body)
        .map_err(|e| SessionError::MalformedResponse(format!("invalid session: {}", e)))?;

    if session.token.is_empty() {
        return Err(SessionError::MalformedResponse("empty session token".to_string()));
    }

    Ok(session)
}

/// Pull a readable message out of a provider error body
///
/// The provider answers with `{"errors": [...]}` or
/// `{"errors": {"field": [...]}}`; `base` errors are not prefixed.
fn extract_error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let value: Value = match serde_json::from_str(trimmed) {
        Ok(value) => value,
        Err(_) => return Some(trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect()),
    };

    let mut messages = Vec::new();
    match value.get("errors") {
        Some(Value::Array(items)) => messages.extend(items.iter().map(value_text)),
        Some(Value::Object(fields)) => {
            for (field, errors) in fields {
                let texts: Vec<String> = match errors {
                    Value::Array(items) => items.iter().map(value_text).collect(),
                    other => vec![value_text(other)],
                };
                for text in texts {
                    if field == "base" {
                        messages.push(text);
                    } else {
                        messages.push(format!("{} {}", field, text));
                    }
                }
            }
        }
        Some(other) => messages.push(value_text(other)),
        None => {
            if let Some(Value::String(message)) = value.get("message") {
                messages.push(message.clone());
            }
        }
    }

    if messages.is_empty() {
        None
    } else {
        Some(messages.join("; "))
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
