//! The Format Requirement Set checked against every archived upload.

use crate::error::{Error, ErrorKind};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Container, codec, resolution, frame-rate and audio properties that an
/// upload is expected to have when only video submissions are allowed.
///
/// Every property is optional: an unset property is simply not checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatRequirements {
    /// Human-readable container label, shown on receipts.
    pub container: Option<String>,
    /// Video codec family name (e.g. `ProRes`).
    pub video_codec: Option<String>,
    pub resolution: Option<Resolution>,
    /// Acceptable frame rates, in order of preference.
    pub frame_rates: Vec<f64>,
    /// Audio codec family name (e.g. `PCM`).
    pub audio_codec: Option<String>,
    /// Required audio sample rate in Hz.
    pub sample_rate: Option<u32>,
}
impl Default for FormatRequirements {
    fn default() -> Self {
        Self {
            container: Some("QuickTime/MOV".to_string()),
            video_codec: Some("ProRes".to_string()),
            resolution: Some(Resolution { width: 1920, height: 1080 }),
            frame_rates: vec![23.98, 24.0, 29.97, 30.0],
            audio_codec: Some("PCM".to_string()),
            sample_rate: Some(48_000),
        }
    }
}
impl FormatRequirements {
    /// Frame rates joined for display, e.g. `23.98/24/29.97/30`.
    pub fn frame_rates_label(&self) -> String {
        self.frame_rates.iter().map(|fps| fps.to_string()).collect::<Vec<_>>().join("/")
    }
}

/// A `width`x`height` pixel resolution, written as `1920x1080`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}
impl FromStr for Resolution {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ErrorKind::invalid("format.resolution", format!("expected WIDTHxHEIGHT, found '{s}'"));
        let (width, height) = s.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
        let width = width.trim().parse::<u32>().map_err(|_| invalid())?;
        let height = height.trim().parse::<u32>().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            exn::bail!(invalid());
        }
        Ok(Self { width, height })
    }
}
// Serde needs a `Display`able error, so hand it the kind rather than the tree.
impl TryFrom<String> for Resolution {
    type Error = ErrorKind;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse().map_err(|e: Error| (*e).clone())
    }
}
impl From<Resolution> for String {
    fn from(value: Resolution) -> Self {
        value.to_string()
    }
}
impl Display for Resolution {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}x{}", self.width, self.height)
    }
}
