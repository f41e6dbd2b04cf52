//! Error taxonomy for the session client.
//!
//! Every request resolves to exactly one of three failure classes (or a
//! parsed JSON body on success):
//! - [`ApiError::Network`] — transport-level failure (timeout, DNS,
//!   connection refused). Recoverable: the monitor treats it as an offline
//!   observation, never a crash.
//! - [`ApiError::AuthRequired`] — HTTP 401. The client has already torn down
//!   the session as a side effect; callers must not retry.
//! - [`ApiError::Http`] — any other non-2xx, with a best-effort message
//!   extracted from the response body.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport failure: timeout, DNS, connection refused.
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    /// HTTP 401 — the stored token has been cleared and a
    /// `SessionInvalidated` event broadcast. Terminal for the call.
    #[error("authentication required")]
    AuthRequired,

    /// Non-2xx, non-401 response.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// A 2xx response whose body could not be parsed as the expected JSON.
    #[error("malformed response body: {0}")]
    MalformedBody(#[source] serde_json::Error),
}

impl ApiError {
    /// The HTTP status code, if this error carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            ApiError::AuthRequired => Some(401),
            _ => None,
        }
    }

    /// `true` for transport-level failures (the "flip to offline" class).
    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network(_))
    }
}
