//! Media inspection for archived uploads.
//!
//! - [`Inspector`]/[`Ffprobe`] run the inspection tool and classify failures,
//! - [`validate_basic`]/[`validate_strict`] check the resulting
//!   [`ProbeReport`] against the configured format requirements,
//! - [`Toolchain`] reports which ffmpeg binaries are installed.

mod consts;
pub mod error;
mod inspect;
pub mod models;
mod rate;
mod tool;
mod validate;

#[cfg(feature = "mock")]
pub use crate::inspect::StaticInspector;
pub use crate::inspect::{Extraction, FailureReason, Ffprobe, Inspector};
pub use crate::models::ProbeReport;
pub use crate::rate::FrameRate;
pub use crate::tool::{Tool, ToolStatus, Toolchain, locate};
pub use crate::validate::{FormatCheck, MediaKind, in_audio_family, in_video_family, validate_basic, validate_strict};
use intake_config::FormatRequirements;
use std::sync::Arc;

pub type InspectorHandle = Arc<dyn Inspector + Send + Sync>;

/// Runs the validator selected by `allow_non_video_files`.
pub fn validate(report: &ProbeReport, allow_non_video_files: bool, requirements: &FormatRequirements) -> FormatCheck {
    if allow_non_video_files { validate_basic(report) } else { validate_strict(report, requirements) }
}
