//! Pipeline Error Types
//!
//! Failures that abort a finalization run. Inspection problems are not here:
//! a missing or unhappy `ffprobe` degrades the run instead of failing it (see
//! [`intake_probe::Extraction`]).

use derive_more::{Display, Error};
use intake_storage::format_bytes;
use std::path::PathBuf;

/// A pipeline error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The staged upload is missing at finalization time.
    #[display("staged upload not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// The archive volume cannot take the file plus its safety margin.
    #[display(
        "insufficient disk space: required {}, available {}",
        format_bytes(*required_with_margin),
        format_bytes(*available)
    )]
    InsufficientSpace { required_with_margin: u64, available: u64 },
    /// The upload identifier cannot be used as a record key.
    #[display("invalid upload identifier: {_0:?}")]
    InvalidUpload(#[error(not(source))] String),
    #[display("unable to resolve an archive name")]
    Naming,
    #[display("unable to move the upload into the archive")]
    Relocate,
    #[display("unable to persist upload records")]
    Records,
    #[display("unable to compute the upload digest")]
    Digest,
    #[display("unable to render the upload receipt")]
    Receipt,
    #[display("unable to append to the audit ledger")]
    Ledger,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// A relocated upload is not moved back on failure, so a retry means
    /// re-running the remaining steps by hand rather than calling the
    /// pipeline again with the same staging path.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::InsufficientSpace { .. } | Self::Records | Self::Ledger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_space_message() {
        let kind = ErrorKind::InsufficientSpace { required_with_margin: 12 << 30, available: 10 << 30 };
        assert_eq!(kind.to_string(), "insufficient disk space: required 12.00 GB, available 10.00 GB");
        assert!(kind.is_retryable());
        assert!(!ErrorKind::NotFound(PathBuf::from("/staging/abc123")).is_retryable());
    }
}
