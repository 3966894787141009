//! Probe Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! None of these escape [`Inspector::inspect`](crate::Inspector::inspect):
//! a failed inspection is reported as an
//! [`Extraction::Failed`](crate::Extraction::Failed) carrying the
//! [`FailureReason`] that [`ErrorKind::failure_reason`] assigns.

use crate::FailureReason;
use derive_more::{Display, Error};
use std::path::PathBuf;
use std::time::Duration;

/// A probe error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for probe operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The tool is not installed, not executable, or not where it was configured.
    #[display("{_0} not found")]
    ToolNotFound(#[error(not(source))] String),
    /// The tool exists but could not be started.
    #[display("unable to start {}", _0.display())]
    Spawn(#[error(not(source))] PathBuf),
    /// The tool did not answer in time and was killed.
    #[display("inspection timed out after {}s", _0.as_secs())]
    Timeout(#[error(not(source))] Duration),
    /// The tool ran and rejected the input.
    #[display("inspection exited unsuccessfully (code {})", _0.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    ToolFailed(#[error(not(source))] Option<i32>),
    /// The tool's output was not the JSON document it promises.
    #[display("inspection output is not valid JSON")]
    MalformedOutput,
    /// The tool succeeded but described neither a container nor streams.
    #[display("inspection report is empty")]
    EmptyReport,
    /// A field was found but could not be parsed.
    #[display("failed to parse field '{field}', found value: {value}")]
    ParseError {
        /// The field that failed to parse.
        field: &'static str,
        /// Details about the parsing failure.
        value: String,
    },
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Spawn(_))
    }

    /// Whether this failure means the tool is unavailable or that the input
    /// was rejected.
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            Self::ToolNotFound(_) | Self::Spawn(_) | Self::Timeout(_) => FailureReason::ToolNotFound,
            Self::ToolFailed(_) | Self::MalformedOutput | Self::EmptyReport | Self::ParseError { .. } => {
                FailureReason::UnsupportedInput
            },
        }
    }
}
