//! Filesystem plumbing for the finalization pipeline: free-space checks,
//! relocation into the archive, content digests and write-once sidecar
//! records keyed by upload identifier.

mod digest;
pub mod error;
mod path;
mod records;
mod relocate;
pub mod space;
mod units;

pub use crate::digest::{Digest, DigestAlgorithm};
pub use crate::path::validate_key;
pub use crate::records::RecordStore;
pub use crate::relocate::{Relocation, relocate};
pub use crate::space::{DiskUsage, SpaceCheck, SpaceGuard, SpaceProbe};
pub use crate::units::format_bytes;
use std::sync::Arc;

pub type SpaceProbeHandle = Arc<dyn SpaceProbe + Send + Sync>;
