//! Error types for chat-tally.
//!
//! Only caller mistakes and environment failures surface as errors. Bad log
//! content never does: malformed lines, unparseable files and a corrupt cache
//! blob are logged and degrade to "no data" inside the parser and cache.

use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for chat-tally operations.
#[derive(Error, Debug)]
pub enum TallyError {
    /// File not found.
    #[error("File not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// Path exists but is not a regular file.
    #[error("Not a regular file: {path}")]
    NotAFile {
        /// Offending path.
        path: PathBuf,
    },

    /// Permission denied when accessing a file or directory.
    #[error("Permission denied: {path}")]
    PermissionDenied {
        /// Path where access was denied.
        path: PathBuf,
    },

    /// I/O error.
    #[error("I/O error: {context}")]
    IoError {
        /// Context describing the operation that failed.
        context: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Serialization error.
    #[error("Serialization error: {context}")]
    SerializationError {
        /// Context describing the operation that failed.
        context: String,
        /// Underlying serde_json error.
        #[source]
        source: serde_json::Error,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Human-readable error message.
        message: String,
    },

    /// Invalid argument.
    #[error("Invalid argument '{name}': {reason}")]
    InvalidArgument {
        /// Name of the invalid argument.
        name: String,
        /// Reason why the argument is invalid.
        reason: String,
    },

    /// Timeout error.
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout {
        /// Duration in milliseconds before timeout.
        duration_ms: u64,
    },

    /// A background task panicked or was aborted.
    #[error("Background task failed: {message}")]
    TaskFailed {
        /// Human-readable error message.
        message: String,
    },

    /// Interrupted operation.
    #[error("Operation interrupted")]
    Interrupted,
}

impl TallyError {
    /// Create a new I/O error with context.
    #[must_use]
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::IoError {
            context: context.into(),
            source,
        }
    }

    /// Create a new invalid-argument error.
    #[must_use]
    pub fn invalid_argument(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Map an I/O error on `path` to the most specific variant.
    #[must_use]
    pub fn from_io_at(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::FileNotFound { path },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::io(format!("Failed to access {}", path.display()), err),
        }
    }

    /// Get the exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::FileNotFound { .. } | Self::NotAFile { .. } => 3,
            Self::PermissionDenied { .. } => 4,
            Self::InvalidConfig { .. } => 5,
            Self::InvalidArgument { .. } => 64,
            Self::Interrupted => 130,
            Self::IoError { .. } => 74,
            _ => 1,
        }
    }

    /// Check if this error is recoverable.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::SerializationError { .. })
    }
}

/// Result type alias for chat-tally operations.
pub type Result<T> = std::result::Result<T, TallyError>;

impl From<std::io::Error> for TallyError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError {
            context: "I/O operation failed".to_string(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for TallyError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError {
            context: "JSON operation failed".to_string(),
            source: err,
        }
    }
}

impl From<tokio::task::JoinError> for TallyError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskFailed {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let not_found = TallyError::FileNotFound {
            path: PathBuf::from("/test"),
        };
        assert_eq!(not_found.exit_code(), 3);

        let interrupted = TallyError::Interrupted;
        assert_eq!(interrupted.exit_code(), 130);

        let bad_arg = TallyError::invalid_argument("path", "is a directory");
        assert_eq!(bad_arg.exit_code(), 64);
    }

    #[test]
    fn test_from_io_at_maps_kinds() {
        let err = TallyError::from_io_at(
            "/nope",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, TallyError::FileNotFound { .. }));

        let err = TallyError::from_io_at(
            "/locked",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no"),
        );
        assert!(matches!(err, TallyError::PermissionDenied { .. }));
    }

    #[test]
    fn test_is_recoverable() {
        assert!(TallyError::Timeout { duration_ms: 10 }.is_recoverable());
        assert!(!TallyError::Interrupted.is_recoverable());
    }
}
