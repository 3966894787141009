//! The audit ledger: one tab-separated line per finalized upload in
//! `<archive>/uploads.tsv`.
//!
//! Columns, with no header row: upload id, archived filename, submitter id,
//! submitter name, size in bytes, absolute archive path, completion time.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::path::{Path, PathBuf};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::instrument;

pub const LEDGER_FILE: &str = "uploads.tsv";

const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]-[month]-[day] [hour]:[minute]:[second] [offset_hour sign:mandatory]:[offset_minute]"
);

/// `moment` in `offset`, as written to the ledger and receipts.
pub fn local_timestamp(moment: OffsetDateTime, offset: UtcOffset) -> String {
    let local = moment.to_offset(offset);
    local.format(TIMESTAMP_FORMAT).unwrap_or_else(|_| local.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub upload_id: String,
    pub filename: String,
    pub submitter_id: String,
    pub submitter_name: String,
    pub size: u64,
    pub path: PathBuf,
    pub completed_at: String,
}
impl LedgerEntry {
    /// The entry as one line, newline included. Always exactly seven fields.
    pub fn to_line(&self) -> String {
        let fields = [
            field(&self.upload_id),
            field(&self.filename),
            field(&self.submitter_id),
            field(&self.submitter_name),
            self.size.to_string(),
            field(&self.path.to_string_lossy()),
            field(&self.completed_at),
        ];
        let mut line = fields.join("\t");
        line.push('\n');
        line
    }
}

fn field(value: &str) -> String {
    value.replace(['\t', '\n', '\r'], " ")
}

/// Serializes appends from every run in this process. Each line is written
/// with a single call in append mode, so lines from other processes land
/// whole as well.
#[derive(Debug, Default)]
pub struct Ledger {
    lock: Mutex<()>,
}
impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path_in(archive_dir: &Path) -> PathBuf {
        archive_dir.join(LEDGER_FILE)
    }

    #[instrument(level = "debug", skip_all, fields(upload_id = %entry.upload_id))]
    pub async fn append(&self, archive_dir: &Path, entry: &LedgerEntry) -> Result<PathBuf> {
        let path = Self::path_in(archive_dir);
        let line = entry.to_line();
        let _guard = self.lock.lock().await;
        let mut file = OpenOptions::new().create(true).append(true).open(&path).await.or_raise(|| ErrorKind::Ledger)?;
        file.write_all(line.as_bytes()).await.or_raise(|| ErrorKind::Ledger)?;
        file.flush().await.or_raise(|| ErrorKind::Ledger)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use time::macros::{datetime, offset};

    fn entry(upload_id: &str) -> LedgerEntry {
        LedgerEntry {
            upload_id: upload_id.to_string(),
            filename: "Final-Cut_S001_Jane-Doe.mov".to_string(),
            submitter_id: "S001".to_string(),
            submitter_name: "Jane Doe".to_string(),
            size: 10_485_760,
            path: PathBuf::from("/archive/Final-Cut_S001_Jane-Doe.mov"),
            completed_at: "2026-03-14 09:26:53 +09:00".to_string(),
        }
    }

    #[test]
    fn test_local_timestamp() {
        let moment = datetime!(2026-03-14 00:26:53 UTC);
        assert_eq!(local_timestamp(moment, offset!(+9)), "2026-03-14 09:26:53 +09:00");
        assert_eq!(local_timestamp(moment, offset!(-5:30)), "2026-03-13 18:56:53 -05:30");
        assert_eq!(local_timestamp(moment, UtcOffset::UTC), "2026-03-14 00:26:53 +00:00");
    }

    #[test]
    fn test_line_layout() {
        assert_eq!(
            entry("abc123").to_line(),
            "abc123\tFinal-Cut_S001_Jane-Doe.mov\tS001\tJane Doe\t10485760\t\
             /archive/Final-Cut_S001_Jane-Doe.mov\t2026-03-14 09:26:53 +09:00\n"
        );
    }

    #[test]
    fn test_embedded_separators_are_flattened() {
        let mut entry = entry("abc123");
        entry.submitter_name = "Jane\tDoe\r\nJr".to_string();
        let line = entry.to_line();
        assert_eq!(line.trim_end_matches('\n').split('\t').count(), 7);
        assert!(line.contains("\tJane Doe  Jr\t"));
        assert_eq!(line.matches('\n').count(), 1);
    }

    #[tokio::test]
    async fn test_append_creates_and_appends() {
        let temp_dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new();
        let path = ledger.append(temp_dir.path(), &entry("one")).await.unwrap();
        ledger.append(temp_dir.path(), &entry("two")).await.unwrap();
        assert_eq!(path, temp_dir.path().join(LEDGER_FILE));
        let contents = std::fs::read_to_string(path).unwrap();
        let ids: Vec<_> = contents.lines().map(|l| l.split('\t').next().unwrap()).collect();
        assert_eq!(ids, ["one", "two"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_keep_lines_whole() {
        let temp_dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(Ledger::new());
        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let ledger = Arc::clone(&ledger);
                let dir = temp_dir.path().to_path_buf();
                tokio::spawn(async move { ledger.append(&dir, &entry(&format!("upload{i}"))).await.unwrap() })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }
        let contents = std::fs::read_to_string(temp_dir.path().join(LEDGER_FILE)).unwrap();
        assert_eq!(contents.lines().count(), 32);
        assert!(contents.lines().all(|line| line.split('\t').count() == 7));
    }
}
