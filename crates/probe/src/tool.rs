//! Locating the ffmpeg binaries and reporting on what is installed.

use crate::consts::{COMMON_BIN_DIRS, VERSION_REGEX};
use crate::error::{ErrorKind, Result};
use derive_more::Display;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[display("ffprobe")]
    Ffprobe,
    #[display("ffmpeg")]
    Ffmpeg,
}

/// Resolves the executable for `tool`.
///
/// A configured path is authoritative: if it does not point at an executable
/// the tool counts as missing, without falling back to a search. Otherwise
/// `PATH` is searched, then the usual package-manager install locations.
pub fn locate(tool: Tool, configured: Option<&Path>) -> Result<PathBuf> {
    let name = tool.to_string();
    if let Some(configured) = configured {
        return which::which(configured).map_err(|_| ErrorKind::ToolNotFound(configured.display().to_string()).into());
    }
    if let Ok(path) = which::which(&name) {
        return Ok(path);
    }
    tracing::debug!(tool = %name, "Not found in PATH; checking common install locations");
    let dirs = std::env::join_paths(COMMON_BIN_DIRS).map_err(|_| ErrorKind::ToolNotFound(name.clone()))?;
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
    Ok(which::which_in(&name, Some(dirs), cwd).map_err(|_| ErrorKind::ToolNotFound(name))?)
}

/// Installation status of one tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolStatus {
    pub tool: Tool,
    pub path: Option<PathBuf>,
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
impl ToolStatus {
    pub fn is_available(&self) -> bool {
        self.path.is_some() && self.error.is_none()
    }

    async fn detect(tool: Tool, configured: Option<&Path>) -> Self {
        let path = match locate(tool, configured) {
            Ok(path) => path,
            Err(err) => return Self { tool, path: None, version: None, error: Some(err.to_string()) },
        };
        let output = Command::new(&path)
            .arg("-version")
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;
        match output {
            Ok(output) if output.status.success() => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                Self { tool, path: Some(path), version: parse_version(&stdout), error: None }
            },
            Ok(output) => Self {
                tool,
                path: Some(path),
                version: None,
                error: Some(ErrorKind::ToolFailed(output.status.code()).to_string()),
            },
            Err(err) => Self { tool, path: Some(path), version: None, error: Some(err.to_string()) },
        }
    }
}

/// Installation status of ffprobe and ffmpeg.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Toolchain {
    pub ffprobe: ToolStatus,
    pub ffmpeg: ToolStatus,
}
impl Toolchain {
    pub async fn detect(ffprobe: Option<&Path>, ffmpeg: Option<&Path>) -> Self {
        let (ffprobe, ffmpeg) =
            tokio::join!(ToolStatus::detect(Tool::Ffprobe, ffprobe), ToolStatus::detect(Tool::Ffmpeg, ffmpeg));
        Self { ffprobe, ffmpeg }
    }

    /// One-line summary for operators.
    pub fn summary(&self) -> String {
        let version = |status: &ToolStatus| status.version.clone().unwrap_or_else(|| "(unknown version)".to_string());
        match (self.ffmpeg.is_available(), self.ffprobe.is_available()) {
            (true, true) => format!("ffmpeg {} and ffprobe {} are available", version(&self.ffmpeg), version(&self.ffprobe)),
            (false, false) => "ffmpeg and ffprobe are not installed; install ffmpeg (e.g. `brew install ffmpeg`)".to_string(),
            (false, true) => "ffmpeg is not installed; install ffmpeg (e.g. `brew install ffmpeg`)".to_string(),
            (true, false) => {
                "ffprobe is not installed; uploads are archived without metadata or format checks".to_string()
            },
        }
    }
}

fn parse_version(output: &str) -> Option<String> {
    VERSION_REGEX.captures(output).and_then(|c| c.get(1)).map(|m| m.as_str().to_string())
}
