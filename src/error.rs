/*!
 * Error types for Stratus
 */

use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors surfaced by backends and the transfer orchestrator
///
/// Protocol-level errors (`protocol::s3::S3Error`, `protocol::swift::SwiftError`)
/// are classified into this taxonomy at the adapter boundary. Best-effort
/// cleanup failures (segment deletion, temp files) are never represented here;
/// the cleanup path logs them and moves on.
#[derive(Error, Debug)]
pub enum StorageError {
    /// No valid session or credentials for the backend
    #[error("not connected: {0}")]
    NotConnected(String),

    /// Container, bucket, or key fails the backend's naming rules
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// Object or container does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Transient network failure (retries already exhausted)
    #[error("network error: {0}")]
    TransientNetwork(String),

    /// Authorization or validation rejection, not retryable
    #[error("rejected by backend: {0}")]
    PermanentRejected(String),

    /// Some but not all items of a batch failed
    #[error("{} of {total} items failed: {}", failed_items.len(), failed_items.join(", "))]
    PartialBatchFailure {
        total: usize,
        failed_items: Vec<String>,
    },

    /// Batch cancelled cooperatively before completion
    #[error("operation cancelled")]
    Cancelled,

    /// Local I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Compressed-batch archive could not be built
    #[error("archive error: {0}")]
    Archive(String),
}

impl StorageError {
    /// Check if the error classifies as transient (safe to retry)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StorageError::TransientNetwork(_) | StorageError::Io(_)
        )
    }
}

impl From<zip::result::ZipError> for StorageError {
    fn from(err: zip::result::ZipError) -> Self {
        StorageError::Archive(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(StorageError::TransientNetwork("reset".to_string()).is_retryable());
        assert!(!StorageError::PermanentRejected("403".to_string()).is_retryable());
        assert!(!StorageError::InvalidName("UPPER".to_string()).is_retryable());
        assert!(!StorageError::Cancelled.is_retryable());
    }

    #[test]
    fn test_partial_batch_display() {
        let err = StorageError::PartialBatchFailure {
            total: 7,
            failed_items: vec!["a.txt".to_string(), "b.txt".to_string()],
        };
        assert_eq!(format!("{}", err), "2 of 7 items failed: a.txt, b.txt");
    }
}
