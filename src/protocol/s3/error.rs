//! Error types for S3 operations

use std::io;
use thiserror::Error;

use crate::core::retry::Retryable;

/// Result type alias for S3 operations
pub type S3Result<T> = Result<T, S3Error>;

/// Errors that can occur against the S3-compatible stores
#[derive(Error, Debug, Clone)]
pub enum S3Error {
    /// AWS SDK error that could not be classified further
    #[error("SDK error: {0}")]
    Sdk(String),

    /// Service error with a specific S3 error code
    #[error("service error ({code}): {message}")]
    Service { code: String, message: String },

    /// Object not found in bucket
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// Bucket not found or not accessible
    #[error("bucket not found or not accessible: {0}")]
    BucketNotFound(String),

    /// Access denied
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Bucket name fails the naming rules
    #[error("invalid bucket name: {0}")]
    InvalidBucketName(String),

    /// Object key fails validation
    #[error("invalid object key: {0}")]
    InvalidKey(String),

    /// Multipart upload lifecycle error
    #[error("multipart upload error: {0}")]
    MultipartUpload(String),

    /// Network-level failure (dispatch, connection, response stream)
    #[error("network error: {0}")]
    Network(String),

    /// Operation exceeded its payload-scaled timeout
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// Upload cancelled cooperatively between parts
    #[error("upload cancelled")]
    Cancelled,

    /// Local I/O error
    #[error("I/O error: {0}")]
    Io(String),
}

impl S3Error {
    /// Check if the error is transient and worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            S3Error::Network(_) | S3Error::Timeout(_) | S3Error::Io(_) => true,
            S3Error::Service { code, .. } => is_retryable_code(code),
            _ => false,
        }
    }
}

impl Retryable for S3Error {
    fn is_retryable(&self) -> bool {
        self.is_transient()
    }
}

impl From<io::Error> for S3Error {
    fn from(err: io::Error) -> Self {
        S3Error::Io(err.to_string())
    }
}

/// S3 error codes that indicate a transient condition
///
/// Mirrors the HTTP status classification used for retry: 429 (SlowDown)
/// and the 5xx family.
pub(crate) fn is_retryable_code(code: &str) -> bool {
    matches!(
        code,
        "RequestTimeout"
            | "SlowDown"
            | "ServiceUnavailable"
            | "InternalError"
            | "BadGateway"
            | "GatewayTimeout"
    )
}

/// Convert AWS SDK errors into the local taxonomy
impl<E> From<aws_sdk_s3::error::SdkError<E>> for S3Error
where
    E: std::error::Error + 'static,
{
    fn from(error: aws_sdk_s3::error::SdkError<E>) -> Self {
        use aws_sdk_s3::error::SdkError;

        match error {
            SdkError::DispatchFailure(e) => S3Error::Network(format!("dispatch failure: {e:?}")),
            SdkError::ResponseError(e) => S3Error::Network(format!("response error: {e:?}")),
            SdkError::TimeoutError(e) => S3Error::Timeout(format!("{e:?}")),
            SdkError::ServiceError(e) => {
                let status = e.raw().status().as_u16();
                let message = format!("{:?}", e.err());

                if message.contains("NoSuchKey") || status == 404 {
                    S3Error::Service {
                        code: "NoSuchKey".to_string(),
                        message,
                    }
                } else if message.contains("NoSuchBucket") {
                    S3Error::Service {
                        code: "NoSuchBucket".to_string(),
                        message,
                    }
                } else if message.contains("AccessDenied") || status == 403 {
                    S3Error::AccessDenied(message)
                } else if status == 429 || message.contains("SlowDown") {
                    S3Error::Service {
                        code: "SlowDown".to_string(),
                        message,
                    }
                } else if (500..=599).contains(&status) {
                    S3Error::Service {
                        code: "InternalError".to_string(),
                        message,
                    }
                } else {
                    S3Error::Service {
                        code: "Unknown".to_string(),
                        message,
                    }
                }
            }
            other => S3Error::Sdk(format!("{other:?}")),
        }
    }
}

/// Classification into the engine-wide taxonomy
impl From<S3Error> for crate::error::StorageError {
    fn from(err: S3Error) -> Self {
        use crate::error::StorageError;

        match err {
            S3Error::NotFound { bucket, key } => StorageError::NotFound(format!("{bucket}/{key}")),
            S3Error::BucketNotFound(name) => StorageError::NotFound(name),
            S3Error::InvalidBucketName(msg) | S3Error::InvalidKey(msg) => {
                StorageError::InvalidName(msg)
            }
            S3Error::InvalidConfig(msg) => StorageError::NotConnected(msg),
            S3Error::Cancelled => StorageError::Cancelled,
            S3Error::Service { ref code, .. } if code == "NoSuchKey" || code == "NoSuchBucket" => {
                StorageError::NotFound(err.to_string())
            }
            err if err.is_transient() => StorageError::TransientNetwork(err.to_string()),
            err => StorageError::PermanentRejected(err.to_string()),
        }
    }
}
