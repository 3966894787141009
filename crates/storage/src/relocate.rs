use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use serde::Serialize;
use std::fs::File;
use std::io::ErrorKind as IoErrorKind;
use std::path::Path;
use tempfile::NamedTempFile;
use tokio::fs;
use tracing::instrument;

/// How a file reached its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Relocation {
    /// Atomic rename on the same filesystem.
    Renamed,
    /// Copied across filesystems, then the source removed.
    Copied,
}

/// Moves `source` to `dest`, creating the destination's parent directory.
///
/// `dest` is expected to be a name the caller has already claimed, usually
/// with an empty placeholder file, and is replaced. A rename is attempted
/// first. Only when source and destination live on different filesystems does
/// this fall back to copy-then-delete; every other failure is returned as-is.
#[instrument(level = "debug", fields(source = %source.display(), dest = %dest.display()))]
pub async fn relocate(source: &Path, dest: &Path) -> Result<Relocation> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).await.map_err(|e| ErrorKind::from_io(e, parent))?;
    }
    match fs::rename(source, dest).await {
        Ok(()) => Ok(Relocation::Renamed),
        Err(err) if err.kind() == IoErrorKind::CrossesDevices => {
            tracing::debug!("Source and destination are on different filesystems; copying");
            copy_then_delete(source, dest).await?;
            Ok(Relocation::Copied)
        },
        Err(err) => exn::bail!(ErrorKind::from_io(err, source)),
    }
}

/// Copies into a temporary file beside `dest` and swaps it in atomically, so
/// a failed copy never leaves a partial destination. The source is removed
/// only once the copy is in place.
async fn copy_then_delete(source: &Path, dest: &Path) -> Result<()> {
    let (from, to) = (source.to_path_buf(), dest.to_path_buf());
    tokio::task::spawn_blocking(move || copy_into_place(&from, &to))
        .await
        .or_raise(|| ErrorKind::Task)?
        .map_err(|e| ErrorKind::from_io(e, source))?;
    fs::remove_file(source).await.map_err(|e| ErrorKind::from_io(e, source))?;
    Ok(())
}

fn copy_into_place(source: &Path, dest: &Path) -> std::io::Result<()> {
    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    let mut input = File::open(source)?;
    let permissions = input.metadata()?.permissions();
    let mut temp = NamedTempFile::new_in(dir)?;
    std::io::copy(&mut input, temp.as_file_mut())?;
    temp.as_file().set_permissions(permissions)?;
    temp.as_file().sync_all()?;
    temp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Digest, DigestAlgorithm};

    #[tokio::test]
    async fn test_relocate_renames_and_creates_parent() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = temp_dir.path().join("incoming/abc123");
        let dest = temp_dir.path().join("archive/nested/clip.mov");
        std::fs::create_dir_all(source.parent().unwrap()).unwrap();
        std::fs::write(&source, b"frames").unwrap();

        let how = relocate(&source, &dest).await.unwrap();
        assert_eq!(how, Relocation::Renamed);
        assert!(!source.exists());
        assert_eq!(std::fs::read(&dest).unwrap(), b"frames");
    }

    #[tokio::test]
    async fn test_relocate_replaces_claimed_placeholder() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = temp_dir.path().join("abc123");
        let dest = temp_dir.path().join("clip.mov");
        std::fs::write(&source, b"frames").unwrap();
        std::fs::write(&dest, b"").unwrap();

        relocate(&source, &dest).await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"frames");
    }

    #[tokio::test]
    async fn test_relocate_missing_source() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = temp_dir.path().join("missing");
        let err = relocate(&source, &temp_dir.path().join("dest")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(p) if p == &source));
    }

    #[tokio::test]
    async fn test_copy_then_delete_preserves_content() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = temp_dir.path().join("abc123");
        let dest = temp_dir.path().join("archive/clip.mov");
        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
        std::fs::write(&dest, b"").unwrap();
        let data: Vec<u8> = (0..=255u8).cycle().take(300_000).collect();
        std::fs::write(&source, &data).unwrap();

        copy_then_delete(&source, &dest).await.unwrap();
        assert!(!source.exists());
        let copied = Digest::of_file(DigestAlgorithm::Sha256, &dest).await.unwrap();
        assert_eq!(copied, Digest::of_bytes(DigestAlgorithm::Sha256, &data));
        // Only the archived file remains; the temporary copy was swapped in.
        assert_eq!(std::fs::read_dir(dest.parent().unwrap()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_failed_copy_leaves_no_partial_destination() {
        let temp_dir = tempfile::tempdir().unwrap();
        // Opening a directory succeeds but reading it fails mid-copy.
        let source = temp_dir.path().join("incoming");
        std::fs::create_dir_all(&source).unwrap();
        let archive = temp_dir.path().join("archive");
        std::fs::create_dir_all(&archive).unwrap();
        let dest = archive.join("clip.mov");
        std::fs::write(&dest, b"").unwrap();

        let err = copy_then_delete(&source, &dest).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Io(_)));
        assert!(source.exists());
        assert_eq!(std::fs::read(&dest).unwrap(), b"");
        assert_eq!(std::fs::read_dir(&archive).unwrap().count(), 1);
    }
}
