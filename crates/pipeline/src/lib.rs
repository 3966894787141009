//! Finalization of completed uploads.
//!
//! A [`Finalizer`] takes a staged upload and turns it into an archived file
//! with its records:
//!
//! ```text
//! <archive>/
//! ├── Final-Cut_S001_Jane-Doe.mov
//! ├── meta/<id>.json          ffprobe report, or {} when unavailable
//! ├── hash/<id>.sha256        content digest
//! ├── receipt/<id>.html       printable receipt
//! ├── .progress/<id>.json     last stage reached
//! └── uploads.tsv             audit ledger
//! ```
//!
//! Transports talk to it through [`UploadHooks`].

pub mod error;
mod finalize;
mod hooks;
mod ledger;
mod naming;
mod progress;

pub use crate::finalize::{FinalizeOutcome, Finalizer, HASH_DIR, META_DIR, RECEIPT_DIR};
pub use crate::hooks::{Admission, Rejection, UploadHooks, UploadRecord, meta};
pub use crate::ledger::{LEDGER_FILE, Ledger, LedgerEntry, local_timestamp};
pub use crate::naming::{ArchiveName, build_name, release_name, resolve_collision, sanitize_component};
pub use crate::progress::{PROGRESS_DIR, ProgressHandle, ProgressRecord, ProgressTracker, Stage};
