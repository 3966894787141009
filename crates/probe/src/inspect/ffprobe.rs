use super::{Extraction, Inspector};
use crate::consts::FFPROBE_ARGS;
use crate::error::{ErrorKind, Result};
use crate::models::ProbeReport;
use crate::tool::{Tool, locate};
use async_trait::async_trait;
use exn::ResultExt;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::instrument;

/// [`Inspector`] backed by the `ffprobe` binary.
///
/// The binary is resolved on every call, so installing ffmpeg while the
/// service is running takes effect with the next upload.
#[derive(Debug, Clone)]
pub struct Ffprobe {
    configured: Option<PathBuf>,
    timeout: Duration,
}

impl Ffprobe {
    pub fn new(configured: Option<PathBuf>, timeout: Duration) -> Self {
        Self { configured, timeout }
    }

    /// The read-only invocation: the input file is only ever opened by ffprobe.
    async fn run(&self, path: &Path) -> Result<ProbeReport> {
        let program = locate(Tool::Ffprobe, self.configured.as_deref())?;
        let mut command = Command::new(&program);
        command
            .args(FFPROBE_ARGS)
            .arg(path)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Err(_elapsed) => exn::bail!(ErrorKind::Timeout(self.timeout)),
            Ok(Err(err)) if matches!(err.kind(), IoErrorKind::NotFound | IoErrorKind::PermissionDenied) => {
                exn::bail!(ErrorKind::ToolNotFound(program.display().to_string()))
            },
            Ok(result) => result.or_raise(|| ErrorKind::Spawn(program.clone()))?,
        };
        if !output.status.success() {
            exn::bail!(ErrorKind::ToolFailed(output.status.code()));
        }
        let report: ProbeReport = serde_json::from_slice(&output.stdout).or_raise(|| ErrorKind::MalformedOutput)?;
        if report.is_empty() {
            exn::bail!(ErrorKind::EmptyReport);
        }
        Ok(report)
    }
}

#[async_trait]
impl Inspector for Ffprobe {
    #[instrument(skip(self), fields(path = %path.display()))]
    async fn inspect(&self, path: &Path) -> Extraction {
        match self.run(path).await {
            Ok(report) => {
                tracing::debug!(streams = report.streams.len(), "Extracted media metadata");
                Extraction::Extracted(report)
            },
            Err(err) => {
                let reason = err.failure_reason();
                tracing::warn!(error = ?err, %reason, "Media metadata unavailable");
                Extraction::Failed(reason)
            },
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::FailureReason;
    use std::os::unix::fs::PermissionsExt;

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-ffprobe");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    async fn inspect_with(program: impl Into<PathBuf>, timeout: Duration) -> Extraction {
        Ffprobe::new(Some(program.into()), timeout).inspect(Path::new("/archive/clip.mov")).await
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let extraction = inspect_with("/nonexistent/ffprobe", TIMEOUT).await;
        assert_eq!(extraction, Extraction::Failed(FailureReason::ToolNotFound));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_unsupported() {
        let extraction = inspect_with("false", TIMEOUT).await;
        assert_eq!(extraction, Extraction::Failed(FailureReason::UnsupportedInput));
    }

    #[tokio::test]
    async fn test_malformed_output_is_unsupported() {
        // Echoes its arguments, which is not JSON.
        let extraction = inspect_with("echo", TIMEOUT).await;
        assert_eq!(extraction, Extraction::Failed(FailureReason::UnsupportedInput));
    }

    #[tokio::test]
    async fn test_empty_report_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "echo '{}'");
        let extraction = inspect_with(program, TIMEOUT).await;
        assert_eq!(extraction, Extraction::Failed(FailureReason::UnsupportedInput));
    }

    #[tokio::test]
    async fn test_timeout_counts_as_missing_tool() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "sleep 5");
        let extraction = inspect_with(program, Duration::from_millis(200)).await;
        assert_eq!(extraction, Extraction::Failed(FailureReason::ToolNotFound));
    }

    #[tokio::test]
    async fn test_successful_report() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(
            dir.path(),
            r#"echo '{"streams":[{"codec_type":"video","codec_name":"h264","width":1920,"height":1080}],"format":{"format_name":"mov"}}'"#,
        );
        let extraction = inspect_with(program, TIMEOUT).await;
        let report = extraction.report().unwrap();
        assert_eq!(report.video_stream().unwrap().codec_name.as_deref(), Some("h264"));
        assert!(extraction.failure().is_none());
    }
}
