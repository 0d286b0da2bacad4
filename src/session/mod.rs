/*!
 * Session management module.
 *
 * This module provides:
 * - Application session creation against the provider's session endpoint
 * - The session state machine and the issued token
 * - Reestablishment and error notification for recovery flows
 */

pub mod manager;
pub mod models;

// Re-export main types
pub use manager::{ErrorHook, SessionManager, parse_session_response};
pub use models::{
    LastRequest, PersistedSession, Session, SessionResponse, SessionState, UserCredentials,
};
