//! Canned inspection results for testing.

use super::{Extraction, FailureReason, Inspector};
use crate::models::ProbeReport;
use async_trait::async_trait;
use std::path::Path;

/// An [`Inspector`] that returns the same [`Extraction`] for every file.
///
/// # Examples
///
/// ```
/// use intake_probe::{FailureReason, Inspector, StaticInspector};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let inspector = StaticInspector::failing(FailureReason::ToolNotFound);
/// let extraction = inspector.inspect(Path::new("/archive/clip.mov")).await;
/// assert_eq!(extraction.failure(), Some(FailureReason::ToolNotFound));
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct StaticInspector {
    extraction: Extraction,
}

impl StaticInspector {
    pub fn report(report: ProbeReport) -> Self {
        Self { extraction: Extraction::Extracted(report) }
    }

    /// Builds the report from ffprobe-shaped JSON.
    ///
    /// Panics if the JSON is not a report. If test setup is wrong, then test
    /// should not pass.
    pub fn json(value: serde_json::Value) -> Self {
        Self::report(serde_json::from_value(value).expect("invalid ffprobe report fixture"))
    }

    pub fn failing(reason: FailureReason) -> Self {
        Self { extraction: Extraction::Failed(reason) }
    }
}

#[async_trait]
impl Inspector for StaticInspector {
    async fn inspect(&self, _path: &Path) -> Extraction {
        self.extraction.clone()
    }
}
