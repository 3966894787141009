//! Flattening a [`Receipt`] into the strings the template prints.

use crate::Receipt;
use intake_config::FormatRequirements;
use intake_probe::models::Stream;
use intake_probe::{FailureReason, FormatCheck};
use intake_storage::format_bytes;
use serde::Serialize;

pub(crate) const NOT_AVAILABLE: &str = "N/A";

#[derive(Serialize)]
pub(crate) struct View<'a> {
    upload_id: &'a str,
    completed_at: &'a str,
    title: &'a str,
    submitter_id: &'a str,
    submitter_name: &'a str,
    filename: &'a str,
    size_human: String,
    size_bytes: String,
    digest_algorithm: String,
    digest: &'a str,
    kind: Option<String>,
    advisory: Option<Advisory>,
    has_errors: bool,
    errors: &'a [String],
    has_warnings: bool,
    warnings: &'a [String],
    video: VideoView,
    audio: AudioView,
    requirements: Option<RequirementsView>,
}
impl<'a> View<'a> {
    pub(crate) fn new(receipt: &'a Receipt) -> Self {
        let (errors, warnings): (&[String], &[String]) = match &receipt.check {
            Some(FormatCheck { errors, warnings, .. }) => (errors.as_slice(), warnings.as_slice()),
            None => (&[], &[]),
        };
        let report = receipt.extraction.report();
        Self {
            upload_id: &receipt.upload_id,
            completed_at: &receipt.completed_at,
            title: &receipt.title,
            submitter_id: &receipt.submitter_id,
            submitter_name: &receipt.submitter_name,
            filename: &receipt.filename,
            size_human: format_bytes(receipt.size),
            size_bytes: group_thousands(receipt.size),
            digest_algorithm: receipt.digest.algorithm.to_string(),
            digest: &receipt.digest.hex,
            kind: receipt.check.as_ref().and_then(|c| c.kind).map(|k| k.to_string()),
            advisory: receipt.extraction.failure().map(|r| Advisory::new(r, receipt.allow_non_video_files)),
            has_errors: !errors.is_empty(),
            errors,
            has_warnings: !warnings.is_empty(),
            warnings,
            video: VideoView::new(report.and_then(|r| r.video_stream())),
            audio: AudioView::new(report.and_then(|r| r.audio_stream())),
            requirements: (!receipt.allow_non_video_files).then(|| RequirementsView::new(&receipt.requirements)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct Advisory {
    level: &'static str,
    title: &'static str,
    message: &'static str,
}
impl Advisory {
    pub(crate) fn new(reason: FailureReason, allow_non_video_files: bool) -> Self {
        match (reason, allow_non_video_files) {
            (FailureReason::ToolNotFound, _) => Self {
                level: "warning",
                title: "Media tools not installed",
                message: "ffprobe is not installed, so metadata extraction and format checks were skipped. \
                          The upload itself completed normally; unavailable details are shown as N/A.",
            },
            (FailureReason::UnsupportedInput, true) => Self {
                level: "info",
                title: "Not a video file",
                message: "This file is not in a video format, so metadata extraction and format checks were \
                          not performed. The upload itself completed normally.",
            },
            (FailureReason::UnsupportedInput, false) => Self {
                level: "warning",
                title: "Unsupported format",
                message: "The uploaded file is not in a supported video format. Metadata extraction and \
                          format checks were not performed.",
            },
        }
    }
}

#[derive(Serialize)]
struct VideoView {
    codec: String,
    resolution: String,
    frame_rate: String,
    bit_rate: String,
}
impl VideoView {
    fn new(stream: Option<&Stream>) -> Self {
        let or_na = |value: Option<String>| value.unwrap_or_else(|| NOT_AVAILABLE.to_string());
        let dimension = |value: Option<u32>| or_na(value.map(|v| v.to_string()));
        Self {
            codec: or_na(stream.and_then(Stream::codec_label).map(str::to_string)),
            resolution: format!(
                "{} x {}",
                dimension(stream.and_then(|s| s.width)),
                dimension(stream.and_then(|s| s.height))
            ),
            frame_rate: or_na(stream.and_then(Stream::frame_rate).map(|rate| format!("{rate} fps"))),
            bit_rate: or_na(stream.and_then(Stream::bit_rate_bps).map(format_bitrate)),
        }
    }
}

#[derive(Serialize)]
struct AudioView {
    codec: String,
    sample_rate: String,
    channels: String,
    bit_rate: String,
}
impl AudioView {
    fn new(stream: Option<&Stream>) -> Self {
        let or_na = |value: Option<String>| value.unwrap_or_else(|| NOT_AVAILABLE.to_string());
        Self {
            codec: or_na(stream.and_then(Stream::codec_label).map(str::to_string)),
            sample_rate: or_na(stream.and_then(Stream::sample_rate_hz).map(|hz| format!("{hz} Hz"))),
            channels: or_na(stream.and_then(|s| s.channels).map(|c| c.to_string())),
            bit_rate: or_na(stream.and_then(Stream::bit_rate_bps).map(format_bitrate)),
        }
    }
}

#[derive(Serialize)]
struct RequirementsView {
    container: String,
    video_codec: String,
    resolution: String,
    frame_rates: String,
    audio_codec: String,
    sample_rate: String,
}
impl RequirementsView {
    fn new(requirements: &FormatRequirements) -> Self {
        let any = |value: Option<String>| value.unwrap_or_else(|| "any".to_string());
        Self {
            container: any(requirements.container.clone()),
            video_codec: any(requirements.video_codec.clone()),
            resolution: any(requirements.resolution.map(|r| r.to_string())),
            frame_rates: any((!requirements.frame_rates.is_empty()).then(|| requirements.frame_rates_label())),
            audio_codec: any(requirements.audio_codec.clone()),
            sample_rate: any(requirements.sample_rate.map(|hz| format!("{hz} Hz"))),
        }
    }
}

/// Decimal bitrate: `176.00 Mbps`, `320.00 kbps`.
pub fn format_bitrate(bits_per_second: u64) -> String {
    let kbps = bits_per_second as f64 / 1000.0;
    if kbps >= 1000.0 { format!("{:.2} Mbps", kbps / 1000.0) } else { format!("{kbps:.2} kbps") }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, "0.00 kbps")]
    #[case(320_000, "320.00 kbps")]
    #[case(999_999, "1000.00 kbps")]
    #[case(1_000_000, "1.00 Mbps")]
    #[case(176_000_000, "176.00 Mbps")]
    fn test_format_bitrate(#[case] bps: u64, #[case] expected: &str) {
        assert_eq!(format_bitrate(bps), expected);
    }

    #[rstest]
    #[case(0, "0")]
    #[case(999, "999")]
    #[case(1000, "1,000")]
    #[case(10_485_760, "10,485,760")]
    fn test_group_thousands(#[case] value: u64, #[case] expected: &str) {
        assert_eq!(group_thousands(value), expected);
    }

    #[test]
    fn test_missing_streams_are_not_available() {
        let video = VideoView::new(None);
        assert_eq!(video.codec, NOT_AVAILABLE);
        assert_eq!(video.resolution, "N/A x N/A");
        let audio = AudioView::new(None);
        assert_eq!(audio.sample_rate, NOT_AVAILABLE);
        assert_eq!(audio.channels, NOT_AVAILABLE);
    }

    #[test]
    fn test_advisory_levels() {
        assert_eq!(Advisory::new(FailureReason::ToolNotFound, true).level, "warning");
        assert_eq!(Advisory::new(FailureReason::UnsupportedInput, true).level, "info");
        assert_eq!(Advisory::new(FailureReason::UnsupportedInput, false).title, "Unsupported format");
    }
}
