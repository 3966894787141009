//! Configuration for the intake finalization pipeline.
//!
//! A [`Config`] is an immutable snapshot: it is loaded once (built-in defaults,
//! then an optional configuration file, then `INTAKE_*` environment variables)
//! and handed to the pipeline, which never mutates it. Picking up edits means
//! loading a fresh snapshot and handing *that* to the next run.
//!
//! ```no_run
//! # fn main() -> intake_config::error::Result<()> {
//! let config = intake_config::load(None)?;
//! println!("archiving into {}", config.archive_dir.display());
//! # Ok(())
//! # }
//! ```

pub mod error;
mod format;

pub use crate::format::{FormatRequirements, Resolution};
pub use intake_storage::DigestAlgorithm;

use crate::error::{ErrorKind, Result};
use directories::{ProjectDirs, UserDirs};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use time::UtcOffset;
use time::macros::format_description;
use tracing::instrument;

const GIB: u64 = 1024 * 1024 * 1024;
/// Prefix for environment variable overrides; nested keys are split on `__`.
pub const ENV_PREFIX: &str = "INTAKE_";

/// Paths, thresholds and format requirements for a finalization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Final durable storage for accepted files and their sidecar records.
    pub archive_dir: PathBuf,
    /// Where the transport layer stages incoming bytes. Defaults to
    /// `<archive_dir>/incoming`.
    pub staging_dir: Option<PathBuf>,
    /// Free space kept in reserve when admitting a new upload.
    pub admission_margin_bytes: u64,
    /// Free space kept in reserve when moving a completed upload into the archive.
    pub finalize_margin_bytes: u64,
    /// Disk usage (percent) above which an advisory warning is logged.
    pub usage_warning_percent: u8,
    /// Accept audio/image submissions and only classify them.
    pub allow_non_video_files: bool,
    pub ffprobe_path: Option<PathBuf>,
    pub ffmpeg_path: Option<PathBuf>,
    pub probe_timeout_secs: u64,
    pub digest: DigestAlgorithm,
    /// Offset (`+HH:MM`) used for human-facing timestamps in the ledger and receipts.
    pub utc_offset: String,
    /// Suffixes of the transport layer's per-upload metadata files, appended
    /// to the staging file name.
    pub transport_sidecars: Vec<String>,
    pub format: FormatRequirements,
}
impl Default for Config {
    fn default() -> Self {
        let archive_dir = UserDirs::new()
            .map(|dirs| dirs.home_dir().join("Intake").join("archive"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/intake/archive"));
        Self {
            archive_dir,
            staging_dir: None,
            admission_margin_bytes: 5 * GIB,
            finalize_margin_bytes: 2 * GIB,
            usage_warning_percent: 90,
            allow_non_video_files: false,
            ffprobe_path: None,
            ffmpeg_path: None,
            probe_timeout_secs: 120,
            digest: DigestAlgorithm::default(),
            utc_offset: "+00:00".to_string(),
            transport_sidecars: vec![".json".to_string(), ".info".to_string()],
            format: FormatRequirements::default(),
        }
    }
}
impl Config {
    /// Resolved staging directory.
    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir.clone().unwrap_or_else(|| self.archive_dir.join("incoming"))
    }

    /// Parsed [`utc_offset`](Self::utc_offset), falling back to UTC for a value
    /// that never went through [`validate`](Self::validate).
    pub fn offset(&self) -> UtcOffset {
        parse_offset(&self.utc_offset).unwrap_or(UtcOffset::UTC)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Checks the values that deserialization alone cannot.
    pub fn validate(&self) -> Result<()> {
        if !self.archive_dir.is_absolute() {
            exn::bail!(ErrorKind::invalid("archive_dir", "must be an absolute path"));
        }
        if let Some(staging) = &self.staging_dir
            && !staging.is_absolute()
        {
            exn::bail!(ErrorKind::invalid("staging_dir", "must be an absolute path"));
        }
        if self.usage_warning_percent > 100 {
            exn::bail!(ErrorKind::invalid("usage_warning_percent", "must be between 0 and 100"));
        }
        if self.probe_timeout_secs == 0 {
            exn::bail!(ErrorKind::invalid("probe_timeout_secs", "must be greater than zero"));
        }
        if parse_offset(&self.utc_offset).is_none() {
            exn::bail!(ErrorKind::invalid("utc_offset", format!("expected +HH:MM, found '{}'", self.utc_offset)));
        }
        if self.format.frame_rates.iter().any(|fps| !fps.is_finite() || *fps <= 0.0) {
            exn::bail!(ErrorKind::invalid("format.frame_rates", "frame rates must be positive numbers"));
        }
        if self.transport_sidecars.iter().any(|suffix| suffix.is_empty() || suffix.contains(['/', '\\'])) {
            exn::bail!(ErrorKind::invalid("transport_sidecars", "suffixes must be non-empty and contain no separators"));
        }
        Ok(())
    }
}

fn parse_offset(value: &str) -> Option<UtcOffset> {
    UtcOffset::parse(value.trim(), format_description!("[offset_hour sign:mandatory]:[offset_minute]")).ok()
}

/// Default location of the configuration file, if the platform has one.
pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "intake").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Builds the layered [`Figment`] without extracting it.
///
/// An explicit `path` must exist; the default path is optional.
pub fn figment(path: Option<&Path>) -> Result<Figment> {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));
    match path {
        Some(path) => {
            if !path.is_file() {
                exn::bail!(ErrorKind::Load(format!("configuration file not found: {}", path.display())));
            }
            figment = merge_file(figment, path);
        },
        None => {
            if let Some(path) = default_path().filter(|p| p.is_file()) {
                tracing::debug!(path = %path.display(), "Using default configuration file");
                figment = merge_file(figment, &path);
            }
        },
    }
    Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
}

fn merge_file(figment: Figment, path: &Path) -> Figment {
    match path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase).as_deref() {
        Some("json") => figment.merge(Json::file(path)),
        Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
        _ => figment.merge(Toml::file(path)),
    }
}

/// Loads and validates a configuration snapshot.
#[instrument(skip_all, fields(path = path.map(|p| p.display().to_string())))]
pub fn load(path: Option<&Path>) -> Result<Config> {
    let config: Config = figment(path)?.extract().map_err(|e| ErrorKind::Load(e.to_string()))?;
    config.validate()?;
    Ok(config)
}
