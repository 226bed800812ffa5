//! Error types for the backend client.
//!
//! Errors are designed for layered context using rootcause: callers receive
//! a `Report<BaasError>` and attach their own context as it propagates.

use std::fmt;

/// Errors from backend-as-a-service operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaasError {
    /// The client is misconfigured (bad URL, missing key).
    Configuration { details: String },
    /// The request never produced a response.
    ConnectionFailed { details: String },
    /// The service answered with a non-success status.
    RequestFailed { status: u16, message: String },
    /// The caller's credentials were rejected.
    Unauthorized { message: String },
    /// The response body could not be decoded.
    Decode { details: String },
    /// The operation requires a signed-in session.
    NoSession,
}

impl BaasError {
    /// Builds the error for a non-success HTTP status.
    #[must_use]
    pub fn from_status(status: u16, message: String) -> Self {
        if status == 401 || status == 403 {
            Self::Unauthorized { message }
        } else {
            Self::RequestFailed { status, message }
        }
    }

    /// Returns true if the service rejected the caller's credentials.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}

impl fmt::Display for BaasError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration { details } => {
                write!(f, "backend client misconfigured: {details}")
            }
            Self::ConnectionFailed { details } => {
                write!(f, "failed to reach backend: {details}")
            }
            Self::RequestFailed { status, message } => {
                write!(f, "backend request failed with status {status}: {message}")
            }
            Self::Unauthorized { message } => {
                write!(f, "backend rejected credentials: {message}")
            }
            Self::Decode { details } => {
                write!(f, "failed to decode backend response: {details}")
            }
            Self::NoSession => write!(f, "no active session"),
        }
    }
}

impl std::error::Error for BaasError {}
