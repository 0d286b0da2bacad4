/*!
 * Tests for error types and conversions
 */

use qbsession::errors::{AppError, SessionError, TransportError};

#[test]
fn test_transportError_connectionError_shouldDisplayCorrectly() {
    let error = TransportError::ConnectionError("Host unreachable".to_string());
    let display = format!("{}", error);
    assert!(display.contains("Connection error"));
    assert!(display.contains("Host unreachable"));
}

#[test]
fn test_transportError_timeout_shouldDisplayCorrectly() {
    let error = TransportError::Timeout("after 30s".to_string());
    let display = format!("{}", error);
    assert!(display.contains("timed out"));
    assert!(display.contains("after 30s"));
}

#[test]
fn test_sessionError_authenticationRejected_shouldDisplayStatusAndMessage() {
    let error = SessionError::AuthenticationRejected {
        status_code: 401,
        message: "Unauthorized".to_string(),
    };
    let display = format!("{}", error);
    assert!(display.contains("401"));
    assert!(display.contains("Unauthorized"));
}

#[test]
fn test_sessionError_fromTransportError_shouldKeepItVerbatim() {
    let transport_error = TransportError::RequestFailed("builder error".to_string());
    let session_error: SessionError = transport_error.clone().into();

    assert_eq!(session_error, SessionError::Transport(transport_error));
    assert!(format!("{}", session_error).contains("builder error"));
}

#[test]
fn test_sessionError_malformedResponse_shouldBeDistinctFromRejection() {
    let malformed = SessionError::MalformedResponse("missing `session` object".to_string());
    let display = format!("{}", malformed);

    assert!(display.contains("Malformed session response"));
    assert!(!matches!(malformed, SessionError::AuthenticationRejected { .. }));
}

#[test]
fn test_sessionError_clone_shouldBeEqual() {
    let error = SessionError::InvalidCredentials("missing auth_key".to_string());
    assert_eq!(error.clone(), error);
}

#[test]
fn test_appError_fromSessionError_shouldWrapCorrectly() {
    let app_error: AppError = SessionError::ReestablishInProgress.into();
    let display = format!("{}", app_error);
    assert!(display.contains("Session error"));
    assert!(display.contains("reestablishment"));
}

#[test]
fn test_appError_fromTransportError_shouldWrapAsSession() {
    let app_error: AppError = TransportError::ConnectionError("refused".to_string()).into();
    assert!(matches!(
        app_error,
        AppError::Session(SessionError::Transport(TransportError::ConnectionError(_)))
    ));
}

#[test]
fn test_appError_fromIoError_shouldWrapAsFileError() {
    let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
    let app_error: AppError = io_error.into();
    let display = format!("{}", app_error);
    assert!(display.contains("File error"));
    assert!(display.contains("File not found"));
}

#[test]
fn test_appError_fromAnyhowError_shouldWrapAsUnknown() {
    let anyhow_error = anyhow::anyhow!("Something went wrong");
    let app_error: AppError = anyhow_error.into();
    let display = format!("{}", app_error);
    assert!(display.contains("Unknown error"));
    assert!(display.contains("Something went wrong"));
}
