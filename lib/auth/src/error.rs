//! Error types for the authentication context.
//!
//! Backend failures arrive as `Report<BaasError>` and are recorded here as
//! strings, so an admin check error can say both what failed and what the
//! fallback saw.

use std::fmt;

/// Errors from the admin allow-list lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCheckError {
    /// The filtered query against the allow-list failed.
    QueryFailed { table: String, details: String },
    /// The filtered query returned more than one row for the account.
    AmbiguousMatch { table: String, count: usize },
    /// The filtered query failed and so did the full-scan fallback.
    FallbackFailed {
        table: String,
        primary: String,
        fallback: String,
    },
}

impl fmt::Display for AdminCheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueryFailed { table, details } => {
                write!(f, "admin lookup on '{table}' failed: {details}")
            }
            Self::AmbiguousMatch { table, count } => {
                write!(f, "admin lookup on '{table}' matched {count} rows, expected at most one")
            }
            Self::FallbackFailed {
                table,
                primary,
                fallback,
            } => {
                write!(
                    f,
                    "admin lookup on '{table}' failed ({primary}) and full-scan fallback failed ({fallback})"
                )
            }
        }
    }
}

impl std::error::Error for AdminCheckError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_failed_display() {
        let err = AdminCheckError::QueryFailed {
            table: "admins".to_string(),
            details: "connection reset".to_string(),
        };
        assert!(err.to_string().contains("admins"));
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn ambiguous_match_display() {
        let err = AdminCheckError::AmbiguousMatch {
            table: "admins".to_string(),
            count: 2,
        };
        assert!(err.to_string().contains("matched 2 rows"));
    }

    #[test]
    fn fallback_failed_keeps_both_causes() {
        let err = AdminCheckError::FallbackFailed {
            table: "admins".to_string(),
            primary: "permission denied".to_string(),
            fallback: "timeout".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("permission denied"));
        assert!(message.contains("timeout"));
    }
}
