//! The Metadata Extractor.
//!
//! An [`Inspector`] never fails: whatever goes wrong while running the
//! inspection tool is folded into an [`Extraction::Failed`] with one of two
//! reasons, so the pipeline can carry on and explain the gap on the receipt.

mod ffprobe;
#[cfg(feature = "mock")]
mod mock;

pub use self::ffprobe::Ffprobe;
#[cfg(feature = "mock")]
pub use self::mock::StaticInspector;
use crate::models::ProbeReport;
use async_trait::async_trait;
use derive_more::Display;
use serde::Serialize;
use std::path::Path;

/// Why no metadata could be extracted.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    /// The inspection binary is missing or unreachable.
    #[display("tool-not-found")]
    ToolNotFound,
    /// The binary ran but rejected the file.
    #[display("unsupported-input")]
    UnsupportedInput,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Extracted(ProbeReport),
    Failed(FailureReason),
}
impl Extraction {
    pub fn report(&self) -> Option<&ProbeReport> {
        match self {
            Self::Extracted(report) => Some(report),
            Self::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<FailureReason> {
        match self {
            Self::Extracted(_) => None,
            Self::Failed(reason) => Some(*reason),
        }
    }
}

/// Runs a media inspection tool against a file.
#[async_trait]
pub trait Inspector {
    async fn inspect(&self, path: &Path) -> Extraction;
}
