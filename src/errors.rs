/*!
 * Error types for the qbsession crate.
 *
 * This module contains custom error types for the transport layer, the
 * session manager and the command line application, using the thiserror
 * crate for ergonomic error definitions.
 */

use thiserror::Error;

/// Errors that can occur while talking to the session endpoint
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// The request could not be built or sent
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Error establishing or maintaining a connection (DNS, refused, reset)
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The request did not complete in time
    #[error("Request timed out: {0}")]
    Timeout(String),
}

/// Errors surfaced by session creation
///
/// Cloneable so that callers serialized behind one creation attempt can all
/// observe the same outcome.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    /// A required signing field is missing or empty
    #[error("Invalid application credentials: {0}")]
    InvalidCredentials(String),

    /// Network-level failure, surfaced verbatim from the transport
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The server answered with a non-success status
    #[error("Session rejected: {status_code} - {message}")]
    AuthenticationRejected {
        /// HTTP status code
        status_code: u16,
        /// Error message from the server
        message: String,
    },

    /// Success status but the body does not contain a usable session
    #[error("Malformed session response: {0}")]
    MalformedResponse(String),

    /// A reestablishment attempt is already running
    #[error("Session reestablishment already in progress")]
    ReestablishInProgress,
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error in configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from the session manager
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}

impl From<TransportError> for AppError {
    fn from(error: TransportError) -> Self {
        Self::Session(SessionError::Transport(error))
    }
}
