use super::{DiskUsage, SpaceProbe};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use std::path::{Path, PathBuf};

/// [`SpaceProbe`] backed by `statvfs(3)`.
///
/// Directories that do not exist yet (an archive that has never received an
/// upload) are measured through their nearest existing ancestor, which is the
/// filesystem they will be created on.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatvfsProbe;

impl StatvfsProbe {
    fn measure(path: &Path) -> Result<DiskUsage> {
        let target = nearest_existing(path);
        let stat = nix::sys::statvfs::statvfs(&target)
            .map_err(|errno| ErrorKind::from_io(std::io::Error::from(errno), &target))?;
        let fragment = u64::from(stat.fragment_size());
        let total = u64::from(stat.blocks()).saturating_mul(fragment);
        let free = u64::from(stat.blocks_free()).saturating_mul(fragment);
        let available = u64::from(stat.blocks_available()).saturating_mul(fragment);
        Ok(DiskUsage::new(total, total.saturating_sub(free), available))
    }
}

#[async_trait]
impl SpaceProbe for StatvfsProbe {
    async fn usage(&self, path: &Path) -> Result<DiskUsage> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || Self::measure(&path)).await.or_raise(|| ErrorKind::Task)?
    }
}

fn nearest_existing(path: &Path) -> PathBuf {
    path.ancestors()
        .find(|candidate| candidate.exists())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measures_missing_directory_through_ancestor() {
        let temp_dir = tempfile::tempdir().unwrap();
        let missing = temp_dir.path().join("not/created/yet");
        assert_eq!(nearest_existing(&missing), temp_dir.path());
        let usage = StatvfsProbe::measure(&missing).unwrap();
        assert!(usage.total > 0);
    }
}
