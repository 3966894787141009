//! ffprobe's JSON report.
//!
//! Only the fields the pipeline reads are typed. Everything else ffprobe
//! emits is kept verbatim in the `extra` maps, so serializing a report back
//! out reproduces the tool's full output for the metadata record.

use crate::consts::is_image_container;
use crate::rate::FrameRate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeReport {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub streams: Vec<Stream>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<FormatInfo>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
impl ProbeReport {
    /// A report that describes nothing at all.
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty() && self.format.is_none() && self.extra.is_empty()
    }

    /// First stream of the given kind.
    pub fn first(&self, kind: StreamKind) -> Option<&Stream> {
        self.streams.iter().find(|stream| stream.kind() == kind)
    }

    pub fn video_stream(&self) -> Option<&Stream> {
        self.first(StreamKind::Video)
    }

    pub fn audio_stream(&self) -> Option<&Stream> {
        self.first(StreamKind::Audio)
    }

    pub fn has(&self, kind: StreamKind) -> bool {
        self.first(kind).is_some()
    }

    /// Whether the container is a still-image format.
    pub fn is_still_image(&self) -> bool {
        self.format.as_ref().and_then(|f| f.format_name.as_deref()).is_some_and(is_image_container)
    }
}

/// Container-level information (`-show_format`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormatInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_long_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_rate: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
    Data,
    Attachment,
    Other,
}

/// One elementary stream (`-show_streams`).
///
/// ffprobe prints several numeric values (`sample_rate`, `bit_rate`) as
/// strings; the accessor methods parse them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stream {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec_long_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r_frame_rate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_rate: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
impl Stream {
    pub fn kind(&self) -> StreamKind {
        match self.codec_type.as_deref() {
            Some("video") => StreamKind::Video,
            Some("audio") => StreamKind::Audio,
            Some("subtitle") => StreamKind::Subtitle,
            Some("data") => StreamKind::Data,
            Some("attachment") => StreamKind::Attachment,
            _ => StreamKind::Other,
        }
    }

    /// `r_frame_rate`, if present and meaningful (ffprobe writes `0/0` when
    /// it has no idea).
    pub fn frame_rate(&self) -> Option<FrameRate> {
        self.r_frame_rate.as_deref()?.parse().ok()
    }

    pub fn sample_rate_hz(&self) -> Option<u32> {
        self.sample_rate.as_deref()?.trim().parse().ok()
    }

    pub fn bit_rate_bps(&self) -> Option<u64> {
        self.bit_rate.as_deref()?.trim().parse().ok()
    }

    /// The long codec name when ffprobe knows one, else the short one.
    pub fn codec_label(&self) -> Option<&str> {
        self.codec_long_name.as_deref().or(self.codec_name.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "streams": [
                {
                    "index": 0,
                    "codec_name": "prores",
                    "codec_long_name": "Apple ProRes (iCodec Pro)",
                    "profile": "HQ",
                    "codec_type": "video",
                    "width": 1920,
                    "height": 1080,
                    "r_frame_rate": "24000/1001",
                    "bit_rate": "176000000"
                },
                {
                    "index": 1,
                    "codec_name": "pcm_s24le",
                    "codec_type": "audio",
                    "sample_rate": "48000",
                    "channels": 2,
                    "bit_rate": "2304000"
                }
            ],
            "format": {
                "filename": "/archive/clip.mov",
                "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
                "duration": "12.512500",
                "size": "275250000",
                "tags": { "major_brand": "qt  " }
            }
        })
    }

    #[test]
    fn test_typed_accessors() {
        let report: ProbeReport = serde_json::from_value(sample()).unwrap();
        let video = report.video_stream().unwrap();
        assert_eq!((video.width, video.height), (Some(1920), Some(1080)));
        assert!(video.frame_rate().unwrap().is_near_any(&[23.976], 0.001));
        assert_eq!(video.bit_rate_bps(), Some(176_000_000));
        assert_eq!(video.codec_label(), Some("Apple ProRes (iCodec Pro)"));
        let audio = report.audio_stream().unwrap();
        assert_eq!(audio.sample_rate_hz(), Some(48_000));
        assert_eq!(audio.codec_label(), Some("pcm_s24le"));
        assert!(!report.has(StreamKind::Subtitle));
        assert!(!report.is_still_image());
    }

    #[test]
    fn test_unknown_fields_survive() {
        let original = sample();
        let report: ProbeReport = serde_json::from_value(original.clone()).unwrap();
        assert_eq!(serde_json::to_value(&report).unwrap(), original);
    }

    #[test]
    fn test_empty_report() {
        let report: ProbeReport = serde_json::from_str("{}").unwrap();
        assert!(report.is_empty());
        assert!(report.video_stream().is_none());
    }

    #[test]
    fn test_still_image_container() {
        let report: ProbeReport = serde_json::from_value(json!({
            "streams": [{ "codec_type": "video", "codec_name": "png", "width": 640, "height": 480 }],
            "format": { "format_name": "png_pipe" }
        }))
        .unwrap();
        assert!(report.is_still_image());
    }
}
