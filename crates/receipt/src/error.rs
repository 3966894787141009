//! Receipt Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A receipt error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for receipt operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// An embedded asset is missing from the build.
    #[display("asset not found: {_0}")]
    AssetNotFound(#[error(not(source))] String),
    /// An embedded asset is not valid UTF-8.
    #[display("asset is not valid UTF-8: {_0}")]
    AssetEncoding(#[error(not(source))] String),
    /// The template failed to compile or render.
    #[display("receipt template error")]
    Template,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Templates are baked into the binary; the same input fails the same way.
        false
    }
}
