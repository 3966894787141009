use regex::Regex;
use std::sync::LazyLock;

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

/// Arguments asking ffprobe for container and stream information as JSON.
pub(crate) const FFPROBE_ARGS: [&str; 6] = ["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"];

/// Where package managers put ffmpeg when `PATH` is too narrow to see it
/// (launchd and GUI-spawned processes mostly).
pub(crate) const COMMON_BIN_DIRS: [&str; 3] = ["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin"];

/// Allowed distance between an actual and a required frame rate.
pub(crate) const FRAME_RATE_TOLERANCE: f64 = 0.1;

// First line of `ffprobe -version` / `ffmpeg -version`.
regex!(VERSION_REGEX, r"(?m)^(?:ffprobe|ffmpeg) version (\S+)");

/// Concrete codec names accepted for a named video codec family. Family names
/// are compared after lowercasing and dropping `.`, `-` and spaces.
pub(crate) const VIDEO_FAMILIES: &[(&[&str], &[&str])] = &[
    (&["prores"], &["prores", "prores_ks", "prores_aw"]),
    (&["h264", "avc"], &["h264"]),
    (&["hevc", "h265"], &["hevc", "h265"]),
    (&["dnxhd", "dnxhr"], &["dnxhd"]),
];

/// Still-image container names (`image2`, `png_pipe`, ...). ffprobe reports
/// pictures as single-frame video streams, so the container tells them apart.
pub(crate) fn is_image_container(format_name: &str) -> bool {
    format_name.split(',').any(|name| name == "image2" || name.ends_with("_pipe"))
}
