//! Error types for move, duplicate and journal operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout dropstow.
pub type Result<T> = std::result::Result<T, MoveError>;

/// Errors that can occur while checking, moving or undoing items.
#[derive(Debug, Error)]
pub enum MoveError {
    /// A path or argument was blank or otherwise invalid.
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// A path that was required to exist does not.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The operation was cancelled before it could finish.
    #[error("Operation cancelled")]
    Cancelled,

    /// A destination conflict could not be resolved.
    #[error("Conflict at {path}: {message}")]
    Conflict { path: PathBuf, message: String },

    /// The history store could not be read or written.
    #[error("History store error: {message}")]
    Store { message: String },
}

impl MoveError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a conflict error.
    pub fn conflict(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Conflict {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a store error.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Check if this error is a cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Short label for the kind of error, used in batch reports.
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::NotFound { .. } => "not-found",
            Self::PermissionDenied { .. } | Self::Io { .. } => "io",
            Self::Cancelled => "cancelled",
            Self::Conflict { .. } => "conflict",
            Self::Store { .. } => "store",
        }
    }
}

/// Reject blank or whitespace-only paths.
pub fn ensure_not_blank(path: &std::path::Path, what: &str) -> Result<()> {
    if path.as_os_str().is_empty() || path.to_string_lossy().trim().is_empty() {
        return Err(MoveError::validation(format!("{what} path cannot be blank")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_error_io() {
        let err = MoveError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, MoveError::PermissionDenied { .. }));

        let err = MoveError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, MoveError::NotFound { .. }));
        assert_eq!(err.kind_label(), "not-found");
    }

    #[test]
    fn test_ensure_not_blank() {
        assert!(ensure_not_blank(std::path::Path::new(""), "Source").is_err());
        assert!(ensure_not_blank(std::path::Path::new("   "), "Source").is_err());
        assert!(ensure_not_blank(std::path::Path::new("/tmp/a"), "Source").is_ok());
    }

    #[test]
    fn test_cancelled_is_distinct() {
        assert!(MoveError::Cancelled.is_cancelled());
        assert!(!MoveError::validation("x").is_cancelled());
    }
}
