/*!
 * Error types for Parcel
 */

use std::fmt;
use std::io;

use thiserror::Error;

use crate::core::task::ObjectLocation;
use crate::storage::StorageError;

pub type Result<T> = std::result::Result<T, ParcelError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_PARTIAL: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

#[derive(Debug, Error)]
pub enum ParcelError {
    /// Malformed partition inputs (worker count, payload cap)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Object whose extension has no destination rule (skipped, never propagated by the catalog)
    #[error("File {object} has unknown file type '{extension}' and is not referenced by any destination rule")]
    UnknownFileType {
        object: ObjectLocation,
        extension: String,
    },

    /// Transfer source does not exist and the operation cannot proceed
    #[error("File {from} does not exist and cannot be transferred to {to}")]
    MissingSourceFile {
        from: ObjectLocation,
        to: ObjectLocation,
    },

    /// Operation other than copy or move was requested
    #[error("Invalid operation type '{0}': expected 'copy' or 'move'")]
    InvalidOperationType(String),

    /// Extension has no destination mapping
    #[error("Could not find a destination for file type '{extension}'")]
    NotFound { extension: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Object store failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Work set (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ParcelError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            ParcelError::InvalidArgument(_)
            | ParcelError::InvalidOperationType(_)
            | ParcelError::Config(_)
            | ParcelError::MissingSourceFile { .. } => EXIT_FATAL,
            _ => EXIT_PARTIAL,
        }
    }

    /// Check if this error is fatal (should not retry)
    pub fn is_fatal(&self) -> bool {
        match self {
            ParcelError::InvalidArgument(_) => true,
            ParcelError::MissingSourceFile { .. } => true,
            ParcelError::InvalidOperationType(_) => true,
            ParcelError::NotFound { .. } => true,
            ParcelError::Config(_) => true,
            ParcelError::Serialization(_) => true,

            ParcelError::UnknownFileType { .. } => false,
            ParcelError::Storage(err) => !err.is_transient(),
            ParcelError::Io(_) => false,
        }
    }

    /// Check if this error is transient (temporary, worth retrying)
    pub fn is_transient(&self) -> bool {
        match self {
            ParcelError::Storage(err) => err.is_transient(),
            ParcelError::Io(err) => matches!(
                err.kind(),
                io::ErrorKind::TimedOut
                    | io::ErrorKind::Interrupted
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
            ),
            _ => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            ParcelError::InvalidArgument(_) | ParcelError::InvalidOperationType(_) => {
                ErrorCategory::Validation
            }
            ParcelError::UnknownFileType { .. } | ParcelError::NotFound { .. } => {
                ErrorCategory::Mapping
            }
            ParcelError::MissingSourceFile { .. } => ErrorCategory::Transfer,
            ParcelError::Config(_) => ErrorCategory::Configuration,
            ParcelError::Storage(_) => ErrorCategory::Storage,
            ParcelError::Serialization(_) => ErrorCategory::Codec,
            ParcelError::Io(_) => ErrorCategory::IoError,
        }
    }
}

/// Error category for classification and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rejected inputs
    Validation,
    /// File type to destination resolution
    Mapping,
    /// Copy/move/delete step
    Transfer,
    /// Configuration errors
    Configuration,
    /// Object store errors
    Storage,
    /// Wire format errors
    Codec,
    /// I/O operation errors
    IoError,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::Mapping => write!(f, "mapping"),
            ErrorCategory::Transfer => write!(f, "transfer"),
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Storage => write!(f, "storage"),
            ErrorCategory::Codec => write!(f, "codec"),
            ErrorCategory::IoError => write!(f, "io"),
        }
    }
}
