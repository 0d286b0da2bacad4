/*!
 * Tests for the session manager state machine using the mock transport
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use qbsession::errors::{SessionError, TransportError};
use qbsession::session::SessionState;
use qbsession::transport::MockTransport;

use crate::common::{TEST_SESSION_URL, manager_with, test_credentials};

#[tokio::test]
async fn test_new_shouldNotSendAnything() {
    let transport = MockTransport::working("abc");
    let manager = manager_with(transport.clone());

    assert_eq!(transport.request_count(), 0);
    assert_eq!(manager.state(), SessionState::Uninitialized);
    assert!(!manager.is_session_created());
    assert!(manager.session().is_none());
    assert_eq!(manager.session_url(), TEST_SESSION_URL);
    assert_eq!(manager.credentials(), &test_credentials());
}

#[tokio::test]
async fn test_createSession_withSessionBody_shouldResolveToken() {
    let manager = manager_with(MockTransport::raw(201, r#"{"session":{"token":"abc"}}"#));

    let token = manager.create_session().await.unwrap();

    assert_eq!(token, "abc");
    assert!(manager.is_session_created());
    assert_eq!(manager.session().unwrap().token, "abc");
}

#[tokio::test]
async fn test_createSession_shouldStoreSessionVerbatim() {
    let manager = manager_with(MockTransport::working("abc"));

    manager.create_session().await.unwrap();
    let session = manager.session().unwrap();

    assert_eq!(session.user_id(), Some(0));
    assert_eq!(session.created_at().as_deref(), Some("2026-01-01T00:00:00Z"));
    assert_eq!(session.field("_id").and_then(|v| v.as_str()), Some("5d2d7b6ba28f9a1d8b3e0f1c"));
    assert_eq!(session.field("application_id").and_then(|v| v.as_str()), Some("1"));
}

#[tokio::test]
async fn test_createSession_withUnauthorized_shouldRejectAndClearSession() {
    let manager = manager_with(MockTransport::rejecting(401, "Unauthorized"));

    let error = manager.create_session().await.unwrap_err();

    assert_eq!(
        error,
        SessionError::AuthenticationRejected {
            status_code: 401,
            message: "Unauthorized".to_string(),
        }
    );
    assert!(manager.session().is_none());
    assert_eq!(manager.state(), SessionState::Failed);
}

#[tokio::test]
async fn test_createSession_withEmptyBody_shouldRejectAsMalformed() {
    let manager = manager_with(MockTransport::malformed("{}"));

    let result = manager.create_session().await;

    assert!(matches!(result, Err(SessionError::MalformedResponse(_))));
    assert!(manager.session().is_none());
    assert!(!manager.is_session_created());
}

#[tokio::test]
async fn test_createSession_withNetworkFailure_shouldSurfaceTransportError() {
    let manager = manager_with(MockTransport::failing());

    let result = manager.create_session().await;

    assert_eq!(
        result,
        Err(SessionError::Transport(TransportError::ConnectionError(
            "Connection refused".to_string()
        )))
    );
    assert_eq!(manager.state(), SessionState::Failed);
}

#[tokio::test]
async fn test_createSession_sequentialCalls_shouldEachBeFresh() {
    let transport = MockTransport::numbered();
    let manager = manager_with(transport.clone());

    manager.create_session().await.unwrap();
    let first = manager.last_request().unwrap();
    manager.create_session().await.unwrap();
    let second = manager.last_request().unwrap();

    assert_eq!(transport.request_count(), 2);
    assert!(second.sent_at >= first.sent_at);
    assert_eq!(manager.token().as_deref(), Some("token-2"));
}

#[tokio::test]
async fn test_createSession_concurrentCalls_shouldShareOneAttempt() {
    let transport = MockTransport::slow(50, "shared");
    let manager = manager_with(transport.clone());

    let (first, second, third) = tokio::join!(
        manager.create_session(),
        manager.create_session(),
        manager.create_session()
    );

    assert_eq!(transport.request_count(), 1);
    assert_eq!(first.unwrap(), "shared");
    assert_eq!(second.unwrap(), "shared");
    assert_eq!(third.unwrap(), "shared");
    assert_eq!(manager.state(), SessionState::Created);
}

#[tokio::test]
async fn test_createSession_concurrentTasks_shouldObserveSameOutcome() {
    let transport = MockTransport::slow(50, "shared");
    let manager = manager_with(transport.clone());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.create_session().await })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), "shared");
    }
    assert_eq!(transport.request_count(), 1);
    assert_eq!(manager.token().as_deref(), Some("shared"));
}

#[tokio::test]
async fn test_reestablishSession_whileRunning_shouldRejectSecondCall() {
    let transport = MockTransport::slow(50, "again");
    let manager = manager_with(transport.clone());

    let (first, second) = tokio::join!(manager.reestablish_session(), manager.reestablish_session());

    assert_eq!(first.unwrap(), "again");
    assert_eq!(second, Err(SessionError::ReestablishInProgress));
    assert_eq!(transport.request_count(), 1);
    assert!(!manager.is_reestablishing());
}

#[tokio::test]
async fn test_reestablishSession_onFailure_shouldNotifyHookWithError() {
    let notified = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&notified);
    let manager = manager_with(MockTransport::failing());
    manager.set_on_error(Arc::new(move |error: &SessionError| {
        assert!(matches!(error, SessionError::Transport(_)));
        seen.fetch_add(1, Ordering::SeqCst);
    }));

    assert!(manager.reestablish_session().await.is_err());
    assert!(manager.reestablish_session().await.is_err());

    assert_eq!(notified.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_reestablishSession_onSuccess_shouldNotNotifyHook() {
    let notified = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&notified);
    let manager = manager_with(MockTransport::working("abc"));
    manager.set_on_error(Arc::new(move |_: &SessionError| {
        seen.fetch_add(1, Ordering::SeqCst);
    }));

    assert_eq!(manager.reestablish_session().await.unwrap(), "abc");
    assert_eq!(notified.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_snapshot_shouldOnlyExistAfterSuccess() {
    let manager = manager_with(MockTransport::working("abc"));
    assert!(manager.snapshot().is_none());

    manager.create_session().await.unwrap();
    let saved = manager.snapshot().unwrap();

    assert_eq!(saved.token, "abc");
    assert!(saved.matches(manager.credentials()));
    assert!(!saved.is_expired(chrono::Duration::hours(2)));
}

#[tokio::test]
async fn test_createSession_droppedMidFlight_shouldRestorePreviousState() {
    let transport = MockTransport::slow(500, "late");
    let manager = manager_with(transport.clone());

    let result = tokio::time::timeout(Duration::from_millis(50), manager.create_session()).await;

    assert!(result.is_err());
    assert_eq!(transport.request_count(), 1);
    assert_eq!(manager.state(), SessionState::Uninitialized);
    assert!(!manager.is_session_created());
    assert!(manager.session().is_none());
    assert!(manager.last_request().is_some());
}

#[tokio::test]
async fn test_createSession_droppedAfterSuccess_shouldKeepCreatedSession() {
    let transport = MockTransport::slow(200, "first");
    let manager = manager_with(transport.clone());
    assert_eq!(manager.create_session().await.unwrap(), "first");

    let result = tokio::time::timeout(Duration::from_millis(20), manager.create_session()).await;

    assert!(result.is_err());
    assert_eq!(transport.request_count(), 2);
    assert_eq!(manager.state(), SessionState::Created);
    assert_eq!(manager.token().as_deref(), Some("first"));

    // The dropped attempt never completed, so the next call runs its own
    assert_eq!(manager.create_session().await.unwrap(), "first");
    assert_eq!(transport.request_count(), 3);
}
