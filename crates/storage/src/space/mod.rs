//! Free-space checks for the archive and staging volumes.
//!
//! The [`SpaceGuard`] answers three questions for a path: how full is its
//! filesystem, is there room for `required` bytes plus a safety margin, and
//! has usage crossed an advisory threshold. Admission and finalization use it
//! with different margins.
//!
//! Querying is **fail-open**: when the filesystem cannot be introspected the
//! guard reports [`DiskUsage::unknown`], whose `available` is `u64::MAX`, so
//! a transient `statvfs` failure never blocks ingestion. That leniency is a
//! policy decision and is logged at `warn` every time it is taken.

#[cfg(feature = "mock")]
mod mock;
mod statvfs;

#[cfg(feature = "mock")]
pub use self::mock::FixedSpaceProbe;
pub use self::statvfs::StatvfsProbe;
use crate::SpaceProbeHandle;
use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::instrument;

/// Usage of the filesystem containing a path, in bytes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiskUsage {
    pub total: u64,
    pub used: u64,
    pub available: u64,
    /// Percentage of the capacity usable by unprivileged users that is in use.
    pub used_percent: f64,
    /// Why usage is unknown, when it is.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
impl DiskUsage {
    pub fn new(total: u64, used: u64, available: u64) -> Self {
        // Like df(1): reserved blocks count neither as used nor as available.
        let usable = used.saturating_add(available);
        let used_percent = if usable == 0 { 0.0 } else { used as f64 * 100.0 / usable as f64 };
        Self { total, used, available, used_percent, error: None }
    }

    /// The fail-open sentinel: effectively unlimited space.
    pub fn unknown(reason: impl Into<String>) -> Self {
        Self { total: 0, used: 0, available: u64::MAX, used_percent: 0.0, error: Some(reason.into()) }
    }

    pub fn is_known(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of a [`SpaceGuard::sufficient`] check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpaceCheck {
    pub sufficient: bool,
    pub available: u64,
    pub required: u64,
    pub margin: u64,
    pub required_with_margin: u64,
}
impl SpaceCheck {
    /// `available ≥ required + margin`, saturating instead of overflowing.
    pub fn evaluate(available: u64, required: u64, margin: u64) -> Self {
        let required_with_margin = required.saturating_add(margin);
        Self { sufficient: available >= required_with_margin, available, required, margin, required_with_margin }
    }
}

/// Source of filesystem usage figures.
#[async_trait]
pub trait SpaceProbe {
    /// Usage of the filesystem that holds `path`.
    async fn usage(&self, path: &Path) -> Result<DiskUsage>;
}

/// Free-space policy on top of a [`SpaceProbe`].
#[derive(Clone)]
pub struct SpaceGuard {
    probe: SpaceProbeHandle,
}
impl SpaceGuard {
    pub fn new(probe: SpaceProbeHandle) -> Self {
        Self { probe }
    }

    /// Guard backed by the real filesystem.
    pub fn statvfs() -> Self {
        Self::new(Arc::new(StatvfsProbe))
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn check_space(&self, path: &Path) -> DiskUsage {
        match self.probe.usage(path).await {
            Ok(usage) => usage,
            Err(err) => {
                tracing::warn!(error = %err, "Unable to query disk space; treating available space as unlimited");
                DiskUsage::unknown(err.to_string())
            },
        }
    }

    /// Whether the filesystem holding `path` can take `required` more bytes
    /// and still keep `margin` bytes free.
    pub async fn sufficient(&self, path: &Path, required: u64, margin: u64) -> SpaceCheck {
        let usage = self.check_space(path).await;
        let check = SpaceCheck::evaluate(usage.available, required, margin);
        tracing::debug!(
            path = %path.display(),
            available = check.available,
            required = check.required,
            margin = check.margin,
            sufficient = check.sufficient,
            "Space check"
        );
        check
    }

    /// Whether usage of the filesystem holding `path` is at or above
    /// `threshold_percent`. Advisory only.
    pub async fn usage_warning(&self, path: &Path, threshold_percent: u8) -> bool {
        let usage = self.check_space(path).await;
        usage.is_known() && usage.used_percent >= f64::from(threshold_percent)
    }
}
