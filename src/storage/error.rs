//! Error types for object store operations

use thiserror::Error;

/// Result type alias for object store operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while talking to an object store
#[derive(Error, Debug, Clone)]
pub enum StorageError {
    /// SDK error that could not be classified further
    #[error("SDK error: {0}")]
    Sdk(String),

    /// Service error with specific error code
    #[error("Storage service error ({code}): {message}")]
    Service { code: String, message: String },

    /// Bucket not found or not accessible
    #[error("Bucket not found or not accessible: {0}")]
    BucketNotFound(String),

    /// Access denied error
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Invalid store configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),
}

impl StorageError {
    /// Create an error from any SDK error
    pub fn from_sdk<E: std::error::Error>(error: E) -> Self {
        StorageError::Sdk(error.to_string())
    }

    /// Check if error is transient (safe to retry)
    pub fn is_transient(&self) -> bool {
        match self {
            StorageError::Network(_)
            | StorageError::Timeout(_)
            | StorageError::RateLimitExceeded(_) => true,
            StorageError::Sdk(msg) => {
                let lower = msg.to_lowercase();
                lower.contains("connection reset")
                    || lower.contains("connection timed out")
                    || lower.contains("broken pipe")
                    || lower.contains("connection refused")
                    || lower.contains("temporarily unavailable")
            }
            StorageError::Service { code, .. } => is_retryable_code(code),
            _ => false,
        }
    }
}

/// Service error codes worth retrying
const RETRYABLE_SERVICE_CODES: [&str; 4] =
    ["SlowDown", "ServiceUnavailable", "InternalError", "RequestTimeout"];

/// Check if a service error code is retryable
pub(crate) fn is_retryable_code(code: &str) -> bool {
    RETRYABLE_SERVICE_CODES.contains(&code)
}

#[cfg(feature = "s3-native")]
impl<E> From<aws_sdk_s3::error::SdkError<E>> for StorageError
where
    E: std::error::Error + 'static,
{
    fn from(error: aws_sdk_s3::error::SdkError<E>) -> Self {
        use aws_sdk_s3::error::SdkError;

        match error {
            SdkError::DispatchFailure(e) => {
                StorageError::Network(format!("Network dispatch failure: {:?}", e))
            }
            SdkError::ResponseError(e) => {
                StorageError::Network(format!("Response error: {:?}", e))
            }
            SdkError::TimeoutError(e) => StorageError::Timeout(format!("{:?}", e)),
            SdkError::ServiceError(e) => {
                let err_str = format!("{:?}", e);
                if err_str.contains("NoSuchBucket") {
                    StorageError::BucketNotFound(err_str)
                } else if err_str.contains("AccessDenied") {
                    StorageError::AccessDenied("Access denied to resource".to_string())
                } else if let Some(code) = RETRYABLE_SERVICE_CODES
                    .iter()
                    .find(|code| err_str.contains(*code))
                {
                    StorageError::Service {
                        code: code.to_string(),
                        message: err_str,
                    }
                } else {
                    StorageError::Service {
                        code: "Unknown".to_string(),
                        message: err_str,
                    }
                }
            }
            other => StorageError::Sdk(format!("{:?}", other)),
        }
    }
}
