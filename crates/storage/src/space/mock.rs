//! Deterministic disk-space probe for testing.

use super::{DiskUsage, SpaceProbe};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use std::path::Path;

/// A [`SpaceProbe`] that reports the same usage for every path, or always
/// fails (to exercise the fail-open path).
///
/// # Examples
///
/// ```
/// use intake_storage::SpaceGuard;
/// use intake_storage::space::FixedSpaceProbe;
/// use std::path::Path;
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let guard = SpaceGuard::new(Arc::new(FixedSpaceProbe::available(10 << 30)));
/// let check = guard.sufficient(Path::new("/archive"), 100 << 30, 5 << 30).await;
/// assert!(!check.sufficient);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FixedSpaceProbe {
    usage: Option<DiskUsage>,
}

impl FixedSpaceProbe {
    /// A disk with exactly `available` bytes free, 1 TiB in size.
    pub fn available(available: u64) -> Self {
        let total = available.max(1 << 40);
        Self::with_usage(DiskUsage::new(total, total - available, available))
    }

    pub fn with_usage(usage: DiskUsage) -> Self {
        Self { usage: Some(usage) }
    }

    /// A probe whose every query fails.
    pub fn failing() -> Self {
        Self { usage: None }
    }
}

#[async_trait]
impl SpaceProbe for FixedSpaceProbe {
    async fn usage(&self, _path: &Path) -> Result<DiskUsage> {
        match &self.usage {
            Some(usage) => Ok(usage.clone()),
            None => exn::bail!(ErrorKind::Io(std::io::Error::other("simulated statvfs failure"))),
        }
    }
}
