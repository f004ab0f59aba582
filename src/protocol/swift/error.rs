//! Error types for Swift operations

use std::io;
use thiserror::Error;

use crate::core::retry::Retryable;

/// Result type alias for Swift operations
pub type SwiftResult<T> = Result<T, SwiftError>;

/// Errors that can occur against the archive store
#[derive(Error, Debug, Clone)]
pub enum SwiftError {
    /// Token could not be obtained or was rejected
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Object or container does not exist
    #[error("not found: {container}/{object}")]
    NotFound { container: String, object: String },

    /// Container or object name fails validation
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// Unexpected HTTP status from the store
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Transport-level failure (connection reset, TLS handshake, DNS)
    #[error("network error: {0}")]
    Network(String),

    /// Request exceeded its payload-scaled timeout
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// Manifest could not be built or was rejected
    #[error("manifest error: {0}")]
    Manifest(String),

    /// Upload cancelled cooperatively between segments
    #[error("upload cancelled")]
    Cancelled,

    /// Local I/O error
    #[error("I/O error: {0}")]
    Io(String),
}

impl SwiftError {
    /// Error for an unexpected response status, capturing a body excerpt
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = body.chars().take(200).collect::<String>();
        SwiftError::Http { status, message }
    }

    /// Check if the error is transient and worth retrying
    ///
    /// Transient statuses follow the classic retry list: 429 and the 5xx
    /// family. 4xx responses other than 429 are permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            SwiftError::Network(_) | SwiftError::Timeout(_) | SwiftError::Io(_) => true,
            SwiftError::Http { status, .. } => {
                *status == 429 || matches!(status, 500 | 502 | 503 | 504)
            }
            _ => false,
        }
    }
}

impl Retryable for SwiftError {
    fn is_retryable(&self) -> bool {
        self.is_transient()
    }
}

impl From<io::Error> for SwiftError {
    fn from(err: io::Error) -> Self {
        SwiftError::Io(err.to_string())
    }
}

impl From<reqwest::Error> for SwiftError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SwiftError::Timeout(err.to_string())
        } else {
            SwiftError::Network(err.to_string())
        }
    }
}

/// Classification into the engine-wide taxonomy
impl From<SwiftError> for crate::error::StorageError {
    fn from(err: SwiftError) -> Self {
        use crate::error::StorageError;

        match err {
            SwiftError::Auth(msg) => StorageError::NotConnected(msg),
            SwiftError::NotFound { container, object } => {
                StorageError::NotFound(format!("{container}/{object}"))
            }
            SwiftError::InvalidName(msg) => StorageError::InvalidName(msg),
            SwiftError::Cancelled => StorageError::Cancelled,
            err if err.is_transient() => StorageError::TransientNetwork(err.to_string()),
            err => StorageError::PermanentRejected(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_statuses() {
        for status in [429, 500, 502, 503, 504] {
            assert!(SwiftError::from_status(status, "").is_transient());
        }
        for status in [400, 401, 403, 404, 409, 413] {
            assert!(
                !SwiftError::from_status(status, "").is_transient(),
                "status {status} must be permanent"
            );
        }
    }

    #[test]
    fn test_network_and_timeout_are_transient() {
        assert!(SwiftError::Network("connection reset".to_string()).is_transient());
        assert!(SwiftError::Timeout("deadline".to_string()).is_transient());
        assert!(!SwiftError::Auth("bad password".to_string()).is_transient());
        assert!(!SwiftError::Cancelled.is_transient());
    }

    #[test]
    fn test_status_body_is_truncated() {
        let long_body = "x".repeat(500);
        if let SwiftError::Http { message, .. } = SwiftError::from_status(500, &long_body) {
            assert_eq!(message.len(), 200);
        } else {
            panic!("expected Http error");
        }
    }

    #[test]
    fn test_storage_error_classification() {
        use crate::error::StorageError;

        let err: StorageError = SwiftError::Auth("expired".to_string()).into();
        assert!(matches!(err, StorageError::NotConnected(_)));

        let err: StorageError = SwiftError::from_status(503, "busy").into();
        assert!(matches!(err, StorageError::TransientNetwork(_)));

        let err: StorageError = SwiftError::from_status(403, "denied").into();
        assert!(matches!(err, StorageError::PermanentRejected(_)));

        let err: StorageError = SwiftError::NotFound {
            container: "c".to_string(),
            object: "o".to_string(),
        }
        .into();
        assert!(matches!(err, StorageError::NotFound(_)));
    }
}
