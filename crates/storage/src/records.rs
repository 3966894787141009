//! Sidecar record stores.
//!
//! Each store is a directory of `<key>.<extension>` files, one per upload.
//! [`RecordStore::create`] is write-once: a second record for the same key is
//! refused rather than overwriting the first. [`RecordStore::replace`] exists
//! for status records that are rewritten in place, and swaps the new contents
//! in atomically so readers never observe a torn file.

use crate::error::{ErrorKind, Result};
use crate::path::validate_key;
use exn::ResultExt;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::fs;
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct RecordStore {
    root: PathBuf,
    extension: String,
}
impl RecordStore {
    /// A store rooted at `root` whose records carry `extension`.
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self { root: root.into(), extension: extension.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the record for `key`, after validating the key.
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        let key = validate_key(key)?;
        Ok(self.root.join(format!("{key}.{}", self.extension)))
    }

    async fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await.map_err(|e| ErrorKind::from_io(e, &self.root))?;
        Ok(())
    }

    /// Writes a new record, failing with [`ErrorKind::AlreadyExists`] if one
    /// is already present for `key`. The record only appears once fully
    /// written, so a failed write leaves nothing behind to block a retry.
    #[instrument(level = "debug", skip(self, data), fields(store = %self.root.display(), bytes = data.len()))]
    pub async fn create(&self, key: &str, data: &[u8]) -> Result<PathBuf> {
        let path = self.path_for(key)?;
        self.ensure_root().await?;
        self.write_with(&path, data, |temp, target| temp.persist_noclobber(target).map(drop).map_err(|e| e.error))
            .await?;
        Ok(path)
    }

    /// [`create`](Self::create) for a pretty-printed JSON record.
    pub async fn create_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<PathBuf> {
        let data = serde_json::to_vec_pretty(value).or_raise(|| ErrorKind::Encode)?;
        self.create(key, &data).await
    }

    /// Writes a record, atomically replacing any previous contents.
    #[instrument(level = "trace", skip(self, data), fields(store = %self.root.display()))]
    pub async fn replace(&self, key: &str, data: &[u8]) -> Result<PathBuf> {
        let path = self.path_for(key)?;
        self.ensure_root().await?;
        self.write_with(&path, data, |temp, target| temp.persist(target).map(drop).map_err(|e| e.error)).await?;
        Ok(path)
    }

    /// Writes `data` to a temporary file in the store and hands it to
    /// `persist` to move into place. The temporary file is removed on failure.
    async fn write_with<F>(&self, path: &Path, data: &[u8], persist: F) -> Result<()>
    where
        F: FnOnce(NamedTempFile, &Path) -> std::io::Result<()> + Send + 'static,
    {
        let (root, target, data) = (self.root.clone(), path.to_path_buf(), data.to_vec());
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut temp = NamedTempFile::new_in(&root)?;
            temp.write_all(&data)?;
            temp.as_file().sync_all()?;
            persist(temp, &target)
        })
        .await
        .or_raise(|| ErrorKind::Task)?
        .map_err(|e| ErrorKind::from_io(e, path))?;
        Ok(())
    }

    pub async fn replace_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<PathBuf> {
        let data = serde_json::to_vec_pretty(value).or_raise(|| ErrorKind::Encode)?;
        self.replace(key, &data).await
    }

    pub async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        Ok(fs::read(&path).await.map_err(|e| ErrorKind::from_io(e, &path))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store(dir: &Path) -> RecordStore {
        RecordStore::new(dir.join("meta"), "json")
    }

    #[tokio::test]
    async fn test_create_is_write_once() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = store(temp_dir.path());
        let path = store.create("abc123", b"first").await.unwrap();
        assert_eq!(path, temp_dir.path().join("meta/abc123.json"));

        let err = store.create("abc123", b"second").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::AlreadyExists(_)));
        assert_eq!(store.read("abc123").await.unwrap(), b"first");
    }

    #[tokio::test]
    async fn test_create_json() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = store(temp_dir.path());
        store.create_json("abc123", &json!({ "streams": [] })).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&store.read("abc123").await.unwrap()).unwrap();
        assert_eq!(value, json!({ "streams": [] }));
    }

    #[tokio::test]
    async fn test_replace_overwrites() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(temp_dir.path().join(".progress"), "json");
        store.replace("abc123", b"one").await.unwrap();
        store.replace("abc123", b"two").await.unwrap();
        assert_eq!(store.read("abc123").await.unwrap(), b"two");
        // No temporary files are left behind.
        assert_eq!(std::fs::read_dir(store.root()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_rejects_traversal_keys() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = store(temp_dir.path());
        let err = store.create("../escape", b"data").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidKey(_)));
        assert!(!temp_dir.path().join("escape.json").exists());
    }

    #[tokio::test]
    async fn test_missing_read() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = store(temp_dir.path());
        let err = store.read("abc123").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_refused_create_leaves_no_stray_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = store(temp_dir.path());
        store.create("abc123", b"first").await.unwrap();
        store.create("abc123", b"second").await.unwrap_err();
        store.create("other", b"data").await.unwrap();

        let mut names: Vec<_> = std::fs::read_dir(store.root())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, ["abc123.json", "other.json"]);
    }

    #[tokio::test]
    async fn test_concurrent_creates_keep_one_complete_record() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = store(temp_dir.path());
        let payloads: Vec<Vec<u8>> = (0..8u8).map(|i| vec![i; 64 * 1024]).collect();
        let tasks: Vec<_> = payloads
            .iter()
            .cloned()
            .map(|payload| {
                let store = store.clone();
                tokio::spawn(async move { store.create("abc123", &payload).await.is_ok() })
            })
            .collect();
        let mut created = 0;
        for task in tasks {
            created += usize::from(task.await.unwrap());
        }
        assert_eq!(created, 1);
        let record = store.read("abc123").await.unwrap();
        assert!(payloads.contains(&record));
        assert_eq!(std::fs::read_dir(store.root()).unwrap().count(), 1);
    }
}
