/*!
 * # qbsession - application session management for the QuickBlox REST API
 *
 * A Rust library for establishing and tracking the application session that
 * authorizes subsequent REST API calls.
 *
 * ## Features
 *
 * - HMAC-SHA1 request signing with canonical parameter ordering
 * - Session state machine with serialized creation attempts
 * - Injected transport (reqwest client or scripted mock)
 * - Reestablishment hook for higher-level recovery flows
 * - Snapshot of the issued token for an external persistence layer
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `signer`: Credentials, canonicalization and request signing
 * - `session`: Session manager and session models
 * - `transport`: Transport trait and implementations:
 *   - `transport::http`: reqwest client
 *   - `transport::mock`: scripted transport for tests
 * - `errors`: Custom error types for the library
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod errors;
pub mod session;
pub mod signer;
pub mod transport;

// Re-export main types for easier usage
pub use app_config::Config;
pub use errors::{AppError, SessionError, TransportError};
pub use session::{Session, SessionManager, SessionState};
pub use signer::{ApplicationCredentials, NonceStrategy, RequestSigner, SignedRequest};
pub use transport::{HttpMethod, HttpTransport, MockTransport, Transport, TransportResponse};
