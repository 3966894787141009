//! The Format Validator.
//!
//! [`validate_strict`] holds a submission against a [`FormatRequirements`]
//! set. Only a missing video stream is a hard error; every other mismatch is
//! a soft warning that leaves the submission valid. [`validate_basic`] merely
//! classifies the submission by the kinds of stream it contains.

use crate::consts::{FRAME_RATE_TOLERANCE, VIDEO_FAMILIES};
use crate::models::{ProbeReport, StreamKind};
use derive_more::Display;
use intake_config::FormatRequirements;
use serde::Serialize;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[display("video")]
    Video,
    #[display("audio")]
    Audio,
    #[display("image")]
    Image,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormatCheck {
    pub valid: bool,
    pub kind: Option<MediaKind>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}
impl FormatCheck {
    fn ok() -> Self {
        Self { valid: true, ..Self::default() }
    }

    fn fail(&mut self, error: impl Into<String>) {
        self.valid = false;
        self.errors.push(error.into());
    }

    fn warn(&mut self, requirement: &str, required: impl std::fmt::Display, actual: impl std::fmt::Display) {
        self.warnings.push(format!("{requirement} differs from requirement (required: {required}, actual: {actual})"));
    }
}

/// Classifies a submission as video, audio or image.
pub fn validate_basic(report: &ProbeReport) -> FormatCheck {
    let mut check = FormatCheck::ok();
    if report.streams.is_empty() {
        check.fail("no streams found");
        return check;
    }
    check.kind = if report.has(StreamKind::Video) && report.is_still_image() {
        Some(MediaKind::Image)
    } else if report.has(StreamKind::Video) {
        Some(MediaKind::Video)
    } else if report.has(StreamKind::Audio) {
        Some(MediaKind::Audio)
    } else {
        None
    };
    if check.kind.is_none() {
        check.fail("unsupported file type: no video, audio or image stream");
    }
    check
}

/// Checks a video submission against `requirements`.
pub fn validate_strict(report: &ProbeReport, requirements: &FormatRequirements) -> FormatCheck {
    let mut check = FormatCheck::ok();
    let Some(video) = report.video_stream() else {
        check.fail("no video stream found");
        return check;
    };
    check.kind = Some(MediaKind::Video);

    if let Some(required) = requirements.resolution
        && (video.width, video.height) != (Some(required.width), Some(required.height))
    {
        let actual = match (video.width, video.height) {
            (Some(w), Some(h)) => format!("{w}x{h}"),
            _ => "unknown".to_string(),
        };
        check.warn("resolution", required, actual);
    }

    if let Some(required) = requirements.video_codec.as_deref() {
        let codec = video.codec_name.as_deref().unwrap_or_default();
        if !in_video_family(required, codec) {
            check.warn("video codec", required, display_or_unknown(codec));
        }
    }

    if !requirements.frame_rates.is_empty() {
        match video.frame_rate() {
            Some(rate) if rate.is_near_any(&requirements.frame_rates, FRAME_RATE_TOLERANCE) => {},
            Some(rate) => check.warn("frame rate", requirements.frame_rates_label(), rate),
            None => check.warn("frame rate", requirements.frame_rates_label(), "unknown"),
        }
    }

    // A silent video is fine; audio is only checked when there is some.
    if let Some(audio) = report.audio_stream() {
        if let Some(required) = requirements.audio_codec.as_deref() {
            let codec = audio.codec_name.as_deref().unwrap_or_default();
            if !in_audio_family(required, codec) {
                check.warn("audio codec", required, display_or_unknown(codec));
            }
        }
        if let Some(required) = requirements.sample_rate
            && audio.sample_rate_hz() != Some(required)
        {
            let actual = audio.sample_rate_hz().map_or_else(|| "unknown".to_string(), |hz| format!("{hz} Hz"));
            check.warn("sample rate", format!("{required} Hz"), actual);
        }
    }
    check
}

fn display_or_unknown(value: &str) -> &str {
    if value.is_empty() { "unknown" } else { value }
}

fn normalize_family(name: &str) -> String {
    name.chars().filter(|c| !matches!(c, '.' | '-' | ' ')).flat_map(char::to_lowercase).collect()
}

/// Whether `codec` (an ffprobe `codec_name`) belongs to the named family.
/// Family names without a table entry must equal the codec name.
pub fn in_video_family(family: &str, codec: &str) -> bool {
    let normalized = normalize_family(family);
    match VIDEO_FAMILIES.iter().find(|(names, _)| names.contains(&normalized.as_str())) {
        Some((_, members)) => members.iter().any(|member| member.eq_ignore_ascii_case(codec)),
        None => !codec.is_empty() && family.eq_ignore_ascii_case(codec),
    }
}

/// Whether `codec` belongs to the named audio family: `PCM` covers every
/// `pcm_*` sample format, anything else is a case-insensitive prefix.
pub fn in_audio_family(family: &str, codec: &str) -> bool {
    if codec.is_empty() {
        return false;
    }
    let codec = codec.to_ascii_lowercase();
    if family.eq_ignore_ascii_case("pcm") {
        return codec.starts_with("pcm_");
    }
    codec.starts_with(&family.to_ascii_lowercase())
}
