//! Storage Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::{Path, PathBuf};

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// File does not exist
    #[display("file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// Access denied (permissions or ownership)
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    /// Record already exists (records are write-once)
    #[display("file already exists: {}", _0.display())]
    AlreadyExists(#[error(not(source))] PathBuf),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Record key is empty, contains separators, or would escape its store
    #[display("invalid record key: {_0:?}")]
    InvalidKey(#[error(not(source))] String),
    /// A record could not be encoded before being written.
    #[display("unable to encode record")]
    Encode,
    /// A blocking task panicked or was cancelled before finishing.
    #[display("background task failed")]
    Task,
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}
impl ErrorKind {
    /// Classifies an I/O error against the path it concerned.
    pub fn from_io(err: IoError, path: &Path) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            std::io::ErrorKind::AlreadyExists => Self::AlreadyExists(path.to_path_buf()),
            _ => Self::Io(err),
        }
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind as IoErrorKind;

    #[test]
    fn test_from_io_classifies() {
        let path = Path::new("meta/abc.json");
        let kind = ErrorKind::from_io(IoError::new(IoErrorKind::NotFound, "gone"), path);
        assert!(matches!(kind, ErrorKind::NotFound(p) if p == path));
        let kind = ErrorKind::from_io(IoError::new(IoErrorKind::AlreadyExists, "exists"), path);
        assert!(matches!(kind, ErrorKind::AlreadyExists(_)));
        let kind = ErrorKind::from_io(IoError::other("disk on fire"), path);
        assert!(matches!(kind, ErrorKind::Io(_)));
        assert!(kind.is_retryable());
    }
}
