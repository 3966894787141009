//! Per-upload progress records.
//!
//! Each run overwrites `<archive>/.progress/<id>.json` as it moves through
//! the [`Stage`]s. Records are telemetry for operators and are never read
//! back to resume a run. Failing to write one is logged and otherwise
//! ignored.

use crate::error::{ErrorKind, Result};
use derive_more::Display;
use exn::ResultExt;
use intake_storage::RecordStore;
use intake_storage::error::ErrorKind as StorageErrorKind;
use serde::{Deserialize, Serialize};
use std::path::Path;
use time::OffsetDateTime;

pub const PROGRESS_DIR: &str = ".progress";

/// Pipeline stages in execution order. [`Stage::Error`] may follow any of
/// them.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[display("move")]
    Move,
    #[display("ffprobe")]
    Ffprobe,
    #[display("hash")]
    Hash,
    #[display("receipt")]
    Receipt,
    #[display("completed")]
    Completed,
    #[display("error")]
    Error,
}

/// The persisted progress record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub upload_id: String,
    pub current_step: Stage,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    /// `None` while the current step is still running.
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone)]
pub struct ProgressTracker {
    store: RecordStore,
}
impl ProgressTracker {
    pub fn new(archive_dir: &Path) -> Self {
        Self { store: RecordStore::new(archive_dir.join(PROGRESS_DIR), "json") }
    }

    /// Begins tracking a run; the start time is shared by every record it writes.
    pub fn start(&self, upload_id: &str) -> ProgressHandle<'_> {
        ProgressHandle {
            tracker: self,
            upload_id: upload_id.to_string(),
            started_at: OffsetDateTime::now_utc(),
            current: None,
        }
    }

    /// The last record written for `upload_id`, if any.
    pub async fn load(&self, upload_id: &str) -> Result<Option<ProgressRecord>> {
        match self.store.read(upload_id).await {
            Ok(data) => Ok(Some(serde_json::from_slice(&data).or_raise(|| ErrorKind::Records)?)),
            Err(err) if matches!(&*err, StorageErrorKind::NotFound(_)) => Ok(None),
            Err(err) => Err(err).or_raise(|| ErrorKind::Records),
        }
    }

    async fn write(&self, record: &ProgressRecord) {
        if let Err(err) = self.store.replace_json(&record.upload_id, record).await {
            tracing::warn!(
                upload_id = %record.upload_id,
                step = %record.current_step,
                error = %err,
                "Unable to write progress record"
            );
        }
    }
}

/// Progress of one run.
pub struct ProgressHandle<'a> {
    tracker: &'a ProgressTracker,
    upload_id: String,
    started_at: OffsetDateTime,
    current: Option<Stage>,
}
impl ProgressHandle<'_> {
    pub fn current(&self) -> Option<Stage> {
        self.current
    }

    /// Records that `stage` has started.
    pub async fn enter(&mut self, stage: Stage) {
        debug_assert!(self.current.is_none_or(|current| current <= stage), "stages only move forward");
        self.current = Some(stage);
        self.write(stage, None).await;
    }

    /// Records that `stage` has finished.
    pub async fn finish(&mut self, stage: Stage) {
        self.current = Some(stage);
        self.write(stage, Some(OffsetDateTime::now_utc())).await;
    }

    /// Records that the run failed. Written once, with a completion time.
    pub async fn fail(&mut self) {
        tracing::debug!(upload_id = %self.upload_id, failed_during = ?self.current, "Recording failed run");
        self.current = Some(Stage::Error);
        self.write(Stage::Error, Some(OffsetDateTime::now_utc())).await;
    }

    async fn write(&self, stage: Stage, completed_at: Option<OffsetDateTime>) {
        let record = ProgressRecord {
            upload_id: self.upload_id.clone(),
            current_step: stage,
            started_at: self.started_at,
            completed_at,
        };
        self.tracker.write(&record).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stage_order() {
        assert!(Stage::Move < Stage::Ffprobe);
        assert!(Stage::Receipt < Stage::Completed);
        assert_eq!(serde_json::to_value(Stage::Ffprobe).unwrap(), json!("ffprobe"));
        assert_eq!(Stage::Completed.to_string(), "completed");
    }

    #[tokio::test]
    async fn test_enter_and_finish() {
        let temp_dir = tempfile::tempdir().unwrap();
        let tracker = ProgressTracker::new(temp_dir.path());
        let mut progress = tracker.start("abc123");

        progress.enter(Stage::Move).await;
        let record = tracker.load("abc123").await.unwrap().unwrap();
        assert_eq!(record.current_step, Stage::Move);
        assert_eq!(record.completed_at, None);

        progress.finish(Stage::Move).await;
        let finished = tracker.load("abc123").await.unwrap().unwrap();
        assert_eq!(finished.current_step, Stage::Move);
        assert!(finished.completed_at.is_some());
        assert_eq!(finished.started_at, record.started_at);
    }

    #[tokio::test]
    async fn test_record_format() {
        let temp_dir = tempfile::tempdir().unwrap();
        let tracker = ProgressTracker::new(temp_dir.path());
        tracker.start("abc123").enter(Stage::Hash).await;

        let path = temp_dir.path().join(".progress/abc123.json");
        let value: serde_json::Value = serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
        assert_eq!(value["uploadId"], json!("abc123"));
        assert_eq!(value["currentStep"], json!("hash"));
        assert!(value["startedAt"].is_string());
        assert!(value["completedAt"].is_null());
    }

    #[tokio::test]
    async fn test_fail_after_any_stage() {
        let temp_dir = tempfile::tempdir().unwrap();
        let tracker = ProgressTracker::new(temp_dir.path());
        let mut progress = tracker.start("abc123");
        progress.enter(Stage::Ffprobe).await;
        progress.fail().await;
        assert_eq!(progress.current(), Some(Stage::Error));
        let record = tracker.load("abc123").await.unwrap().unwrap();
        assert_eq!(record.current_step, Stage::Error);
        assert!(record.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_load_missing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let tracker = ProgressTracker::new(temp_dir.path());
        assert_eq!(tracker.load("abc123").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_failure_is_not_fatal() {
        let temp_dir = tempfile::tempdir().unwrap();
        // A file where the progress directory should be.
        std::fs::write(temp_dir.path().join(PROGRESS_DIR), b"").unwrap();
        let tracker = ProgressTracker::new(temp_dir.path());
        let mut progress = tracker.start("abc123");
        progress.enter(Stage::Move).await;
        progress.fail().await;
        assert_eq!(progress.current(), Some(Stage::Error));
    }
}
