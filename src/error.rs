//! Typed error hierarchy for mirror-race
//!
//! Per-endpoint causes (`Timeout`, `Network`, `Http`, `LogicalApi`,
//! `InvalidResponse`) feed into races and are only ever seen by callers
//! inside [`ClientError::NoReachableEndpoint`], which is the single
//! data-path failure that should reach a UI as "service unavailable".

use crate::protocol::{Category, OutcomeRecord};
use thiserror::Error;

/// Main error type for the mirror client
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// Deadline exceeded; the transfer was aborted
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// DNS, connection or transport failure
    #[error("Network error: {message}")]
    Network {
        kind: NetworkErrorKind,
        message: String,
    },

    /// Mirror answered with a non-2xx status
    #[error("HTTP error: status {status}")]
    Http { status: u16 },

    /// Mirror answered 2xx but the body carries a failure code
    #[error("API error: code {code}{}", .message.as_deref().map(|m| format!(" ({})", m)).unwrap_or_default())]
    LogicalApi { code: i64, message: Option<String> },

    /// Body was not JSON or the code field had an unusable type
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The caller abandoned the request
    #[error("Request cancelled")]
    Cancelled,

    /// Every endpoint tried for this call failed
    #[error("No reachable endpoint for '{category}' ({} attempts failed)", .failures.len())]
    NoReachableEndpoint {
        category: Category,
        failures: Vec<OutcomeRecord>,
    },

    /// Invalid input from user
    #[error("Invalid input for '{field}': {message}")]
    InvalidInput {
        field: &'static str,
        message: String,
    },

    /// Persistence error
    #[error("Database error: {0}")]
    Database(String),

    /// Internal error (bug)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Network error subtypes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    /// DNS resolution failed
    DnsResolution,
    /// Connection refused or could not be established
    ConnectionRefused,
    /// Connection reset mid-transfer
    ConnectionReset,
    /// Connect timeout from the HTTP client itself
    ConnectTimeout,
    /// TLS/SSL error
    Tls,
    /// Too many redirects
    TooManyRedirects,
    /// Response body could not be read
    Body,
    /// Other network error
    Other,
}

impl ClientError {
    /// Whether this error describes a single endpoint failing (as opposed to
    /// a client-level failure such as bad configuration)
    pub fn is_endpoint_failure(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::Network { .. }
                | Self::Http { .. }
                | Self::LogicalApi { .. }
                | Self::InvalidResponse(_)
        )
    }

    /// Create a network error
    pub fn network(kind: NetworkErrorKind, message: impl Into<String>) -> Self {
        Self::Network {
            kind,
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            message: message.into(),
        }
    }

    /// Failures recorded for an exhausted call, if any
    pub fn failures(&self) -> &[OutcomeRecord] {
        match self {
            Self::NoReachableEndpoint { failures, .. } => failures,
            _ => &[],
        }
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Failure of [`race_all`](crate::race::race_all)
#[derive(Debug, Clone, Error)]
pub enum RaceError<E> {
    /// The race was started with an empty set of operations
    #[error("Race started with no operations")]
    NoOperations,

    /// Every operation failed; errors are kept in completion order
    #[error("All {} race operations failed", .0.len())]
    Aggregate(Vec<E>),
}

impl<E> RaceError<E> {
    /// Consume into the collected errors (empty for `NoOperations`)
    pub fn into_errors(self) -> Vec<E> {
        match self {
            Self::NoOperations => Vec::new(),
            Self::Aggregate(errors) => errors,
        }
    }
}

// Implement From traits for common error types

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest's own connect timeout; the request deadline is enforced separately
            return Self::network(NetworkErrorKind::ConnectTimeout, err.to_string());
        }
        if let Some(status) = err.status() {
            return Self::Http {
                status: status.as_u16(),
            };
        }

        let message = err.to_string();
        let kind = if err.is_connect() {
            let lower = message.to_lowercase();
            if lower.contains("dns") || lower.contains("resolve") {
                NetworkErrorKind::DnsResolution
            } else if lower.contains("tls") || lower.contains("certificate") {
                NetworkErrorKind::Tls
            } else {
                NetworkErrorKind::ConnectionRefused
            }
        } else if err.is_redirect() {
            NetworkErrorKind::TooManyRedirects
        } else if err.is_body() || err.is_decode() {
            NetworkErrorKind::Body
        } else if err.is_request() {
            NetworkErrorKind::ConnectionReset
        } else {
            NetworkErrorKind::Other
        };

        Self::Network { kind, message }
    }
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        Self::invalid_input("url", err.to_string())
    }
}

#[cfg(feature = "storage")]
impl From<rusqlite::Error> for ClientError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_failure_classification() {
        assert!(ClientError::Timeout { timeout_ms: 10 }.is_endpoint_failure());
        assert!(ClientError::Http { status: 502 }.is_endpoint_failure());
        assert!(ClientError::LogicalApi {
            code: 405,
            message: None
        }
        .is_endpoint_failure());
        assert!(!ClientError::Cancelled.is_endpoint_failure());
        assert!(!ClientError::invalid_input("endpoints", "empty").is_endpoint_failure());
    }

    #[test]
    fn test_logical_error_display() {
        let err = ClientError::LogicalApi {
            code: 301,
            message: Some("need login".to_string()),
        };
        assert_eq!(err.to_string(), "API error: code 301 (need login)");

        let bare = ClientError::LogicalApi {
            code: 404,
            message: None,
        };
        assert_eq!(bare.to_string(), "API error: code 404");
    }

    #[test]
    fn test_race_error_into_errors() {
        let err: RaceError<u8> = RaceError::Aggregate(vec![1, 2, 3]);
        assert_eq!(err.to_string(), "All 3 race operations failed");
        assert_eq!(err.into_errors(), vec![1, 2, 3]);
        assert!(RaceError::<u8>::NoOperations.into_errors().is_empty());
    }
}
