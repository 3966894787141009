//! The finalization run for one completed upload.
//!
//! Steps run strictly in order: stat the staged file, check archive space,
//! name and move it, drop the transport's sidecars, inspect, hash, validate,
//! write the receipt and finally append to the ledger. Any error aborts the
//! run, records the `error` stage and is returned to the caller. A file that
//! was already moved into the archive stays there.

use crate::error::{ErrorKind, Result};
use crate::hooks::{Admission, Rejection, UploadHooks, UploadRecord};
use crate::ledger::{Ledger, LedgerEntry, local_timestamp};
use crate::naming::{ArchiveName, release_name, resolve_collision};
use crate::progress::{ProgressHandle, ProgressRecord, ProgressTracker, Stage};
use async_trait::async_trait;
use exn::ResultExt;
use intake_config::Config;
use intake_probe::{FailureReason, Ffprobe, FormatCheck, InspectorHandle, ProbeReport};
use intake_receipt::{Receipt, ReceiptRenderer};
use intake_storage::{Digest, RecordStore, Relocation, SpaceGuard, format_bytes, relocate, validate_key};
use serde::Serialize;
use std::ffi::OsString;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::instrument;

pub const META_DIR: &str = "meta";
pub const HASH_DIR: &str = "hash";
pub const RECEIPT_DIR: &str = "receipt";

/// What a successful run produced.
#[derive(Debug, Clone, Serialize)]
pub struct FinalizeOutcome {
    pub upload_id: String,
    /// Archived file name, after collision resolution.
    pub filename: String,
    pub path: PathBuf,
    pub size: u64,
    pub relocation: Relocation,
    pub digest: Digest,
    /// Set when metadata could not be extracted.
    pub extraction_failure: Option<FailureReason>,
    /// `None` when validation was skipped.
    pub check: Option<FormatCheck>,
    pub metadata_path: PathBuf,
    pub digest_path: PathBuf,
    pub receipt_path: PathBuf,
    pub completed_at: String,
}

/// Runs finalizations against a configuration snapshot.
///
/// Each run reads the configuration once at its start; [`reload`](Self::reload)
/// only affects runs that begin afterwards.
pub struct Finalizer {
    config: RwLock<Arc<Config>>,
    space: SpaceGuard,
    /// Overrides the `ffprobe` inspector built from each run's configuration.
    inspector: Option<InspectorHandle>,
    receipts: ReceiptRenderer,
    ledger: Ledger,
}

impl Finalizer {
    pub fn new(config: Config) -> Result<Self> {
        Ok(Self {
            config: RwLock::new(Arc::new(config)),
            space: SpaceGuard::statvfs(),
            inspector: None,
            receipts: ReceiptRenderer::new().or_raise(|| ErrorKind::Receipt)?,
            ledger: Ledger::new(),
        })
    }

    pub fn with_space_guard(mut self, space: SpaceGuard) -> Self {
        self.space = space;
        self
    }

    pub fn with_inspector(mut self, inspector: InspectorHandle) -> Self {
        self.inspector = Some(inspector);
        self
    }

    /// The configuration the next run will use.
    pub async fn config(&self) -> Arc<Config> {
        Arc::clone(&*self.config.read().await)
    }

    pub async fn reload(&self, config: Config) {
        *self.config.write().await = Arc::new(config);
        tracing::info!("Configuration reloaded");
    }

    fn inspector(&self, config: &Config) -> InspectorHandle {
        match &self.inspector {
            Some(inspector) => Arc::clone(inspector),
            None => Arc::new(Ffprobe::new(config.ffprobe_path.clone(), config.probe_timeout())),
        }
    }

    /// Admission decision for an upload that declares `declared_size` bytes.
    #[instrument(skip(self))]
    pub async fn admit(&self, declared_size: Option<u64>) -> Admission {
        let Some(size) = declared_size else {
            tracing::debug!("Upload length deferred; admitting without a space check");
            return Admission::Accepted;
        };
        let config = self.config().await;
        let check = self.space.sufficient(&config.staging_dir(), size, config.admission_margin_bytes).await;
        if check.sufficient {
            return Admission::Accepted;
        }
        let rejection = Rejection::InsufficientStorage {
            required_with_margin: check.required_with_margin,
            available: check.available,
        };
        tracing::warn!(%rejection, "Rejecting upload");
        Admission::Rejected(rejection)
    }

    /// Last progress record written for `upload_id`.
    pub async fn status(&self, upload_id: &str) -> Result<Option<ProgressRecord>> {
        ProgressTracker::new(&self.config().await.archive_dir).load(upload_id).await
    }

    #[instrument(skip_all, fields(upload_id = %upload.id))]
    pub async fn finalize(&self, upload: UploadRecord) -> Result<FinalizeOutcome> {
        let config = self.config().await;
        let tracker = ProgressTracker::new(&config.archive_dir);
        let mut progress = tracker.start(&upload.id);
        match self.run(&config, &upload, &mut progress).await {
            Ok(outcome) => {
                tracing::info!(
                    path = %outcome.path.display(),
                    size = %format_bytes(outcome.size),
                    digest = %outcome.digest,
                    "Upload finalized"
                );
                Ok(outcome)
            },
            Err(err) => {
                tracing::error!(error = ?err, step = ?progress.current(), "Finalization failed");
                progress.fail().await;
                Err(err)
            },
        }
    }

    async fn run(&self, config: &Config, upload: &UploadRecord, progress: &mut ProgressHandle<'_>) -> Result<FinalizeOutcome> {
        progress.enter(Stage::Move).await;
        let upload_id = validate_key(&upload.id).or_raise(|| ErrorKind::InvalidUpload(upload.id.clone()))?;
        let archive_dir = &config.archive_dir;

        let size = match fs::metadata(&upload.staging_path).await {
            Ok(meta) if meta.is_file() => meta.len(),
            Ok(_) => exn::bail!(ErrorKind::NotFound(upload.staging_path.clone())),
            Err(err) if err.kind() == IoErrorKind::NotFound => exn::bail!(ErrorKind::NotFound(upload.staging_path.clone())),
            Err(err) => return Err(err).or_raise(|| ErrorKind::Relocate),
        };

        fs::create_dir_all(archive_dir).await.or_raise(|| ErrorKind::Relocate)?;
        let check = self.space.sufficient(archive_dir, size, config.finalize_margin_bytes).await;
        if !check.sufficient {
            exn::bail!(ErrorKind::InsufficientSpace {
                required_with_margin: check.required_with_margin,
                available: check.available,
            });
        }
        if self.space.usage_warning(archive_dir, config.usage_warning_percent).await {
            tracing::warn!(
                archive = %archive_dir.display(),
                threshold = config.usage_warning_percent,
                "Archive volume usage is above the warning threshold"
            );
        }

        let name = ArchiveName::new(upload.submitter_id(), upload.submitter_name(), upload.title(), upload.filename());
        let filename = resolve_collision(archive_dir, &name).await?;
        let path = archive_dir.join(&filename);
        let relocation = match relocate(&upload.staging_path, &path).await {
            Ok(relocation) => relocation,
            Err(err) => {
                release_name(archive_dir, &filename).await;
                return Err(err).or_raise(|| ErrorKind::Relocate);
            },
        };
        progress.finish(Stage::Move).await;
        remove_sidecars(&upload.staging_path, &config.transport_sidecars).await;

        progress.enter(Stage::Ffprobe).await;
        let extraction = self.inspector(config).inspect(&path).await;
        let empty = ProbeReport::default();
        let metadata_path = RecordStore::new(archive_dir.join(META_DIR), "json")
            .create_json(upload_id, extraction.report().unwrap_or(&empty))
            .await
            .or_raise(|| ErrorKind::Records)?;
        progress.finish(Stage::Ffprobe).await;

        progress.enter(Stage::Hash).await;
        let digest = Digest::of_file(config.digest, &path).await.or_raise(|| ErrorKind::Digest)?;
        let digest_path = RecordStore::new(archive_dir.join(HASH_DIR), config.digest.extension())
            .create(upload_id, digest.hex.as_bytes())
            .await
            .or_raise(|| ErrorKind::Records)?;
        progress.finish(Stage::Hash).await;

        let check = extraction.report().map(|report| {
            let check = intake_probe::validate(report, config.allow_non_video_files, &config.format);
            log_check(&check);
            check
        });

        progress.enter(Stage::Receipt).await;
        let completed_at = local_timestamp(OffsetDateTime::now_utc(), config.offset());
        let receipt = Receipt {
            upload_id: upload_id.to_string(),
            completed_at: completed_at.clone(),
            title: upload.title().to_string(),
            submitter_id: upload.submitter_id().to_string(),
            submitter_name: upload.submitter_name().to_string(),
            filename: filename.clone(),
            size,
            digest: digest.clone(),
            extraction: extraction.clone(),
            check: check.clone(),
            allow_non_video_files: config.allow_non_video_files,
            requirements: config.format.clone(),
        };
        let html = self.receipts.render(&receipt).or_raise(|| ErrorKind::Receipt)?;
        let receipt_path = RecordStore::new(archive_dir.join(RECEIPT_DIR), "html")
            .create(upload_id, html.as_bytes())
            .await
            .or_raise(|| ErrorKind::Records)?;
        progress.finish(Stage::Receipt).await;

        progress.enter(Stage::Completed).await;
        progress.finish(Stage::Completed).await;

        let entry = LedgerEntry {
            upload_id: upload_id.to_string(),
            filename: filename.clone(),
            submitter_id: upload.submitter_id().to_string(),
            submitter_name: upload.submitter_name().to_string(),
            size,
            path: path.clone(),
            completed_at: completed_at.clone(),
        };
        self.ledger.append(archive_dir, &entry).await?;

        Ok(FinalizeOutcome {
            upload_id: upload_id.to_string(),
            filename,
            path,
            size,
            relocation,
            digest,
            extraction_failure: extraction.failure(),
            check,
            metadata_path,
            digest_path,
            receipt_path,
            completed_at,
        })
    }
}

#[async_trait]
impl UploadHooks for Finalizer {
    async fn on_admit(&self, declared_size: Option<u64>) -> Admission {
        self.admit(declared_size).await
    }

    async fn on_complete(&self, upload: UploadRecord) -> Result<FinalizeOutcome> {
        self.finalize(upload).await
    }
}

/// Deletes the transport's metadata files next to the staged upload. Missing
/// files are expected; anything else is logged and ignored.
async fn remove_sidecars(staging_path: &Path, suffixes: &[String]) {
    for suffix in suffixes {
        let mut sidecar = OsString::from(staging_path.as_os_str());
        sidecar.push(suffix);
        let sidecar = PathBuf::from(sidecar);
        match fs::remove_file(&sidecar).await {
            Ok(()) => tracing::debug!(path = %sidecar.display(), "Removed transport sidecar"),
            Err(err) if err.kind() == IoErrorKind::NotFound => {},
            Err(err) => tracing::warn!(path = %sidecar.display(), error = %err, "Unable to remove transport sidecar"),
        }
    }
}

fn log_check(check: &FormatCheck) {
    for error in &check.errors {
        tracing::warn!(kind = ?check.kind, %error, "Format error");
    }
    for warning in &check.warnings {
        tracing::info!(kind = ?check.kind, %warning, "Format differs from requirements");
    }
}
