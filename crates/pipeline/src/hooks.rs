//! The interface a resumable-upload server drives: one call before an upload
//! is accepted, one after its bytes are complete.

use crate::error::Result;
use crate::finalize::FinalizeOutcome;
use async_trait::async_trait;
use derive_more::Display;
use intake_storage::format_bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Submitted metadata keys.
pub mod meta {
    /// The file name on the submitter's machine.
    pub const FILENAME: &str = "filename";
    pub const TITLE: &str = "displayname";
    pub const SUBMITTER_ID: &str = "studentId";
    pub const SUBMITTER_NAME: &str = "name";
}

/// A completed upload as handed over by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub id: String,
    /// Declared size. The staged file's own size is authoritative.
    pub size: Option<u64>,
    pub staging_path: PathBuf,
    /// Already decoded by the transport.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}
impl UploadRecord {
    /// A metadata value, or `""` when it was not submitted.
    pub fn meta(&self, key: &str) -> &str {
        self.metadata.get(key).map(String::as_str).unwrap_or_default()
    }

    pub fn filename(&self) -> &str {
        self.meta(meta::FILENAME)
    }

    pub fn title(&self) -> &str {
        self.meta(meta::TITLE)
    }

    pub fn submitter_id(&self) -> &str {
        self.meta(meta::SUBMITTER_ID)
    }

    pub fn submitter_name(&self) -> &str {
        self.meta(meta::SUBMITTER_NAME)
    }
}

/// Why an upload was refused before any bytes were accepted.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    #[display(
        "insufficient disk space: required {}, available {}",
        format_bytes(*required_with_margin),
        format_bytes(*available)
    )]
    InsufficientStorage { required_with_margin: u64, available: u64 },
}
impl Rejection {
    /// HTTP status the transport should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            // 507 Insufficient Storage
            Self::InsufficientStorage { .. } => 507,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    Rejected(Rejection),
}
impl Admission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

#[async_trait]
pub trait UploadHooks {
    /// Decides whether an upload of `declared_size` bytes may start. Uploads
    /// of unknown length are accepted.
    async fn on_admit(&self, declared_size: Option<u64>) -> Admission;

    /// Finalizes a completed upload. Errors are for the transport to log;
    /// they must not change the response its client sees.
    async fn on_complete(&self, upload: UploadRecord) -> Result<FinalizeOutcome>;
}
