//! Archive file names.
//!
//! Uploads are archived as `<title>_<submitter id>_<submitter name>.<ext>`.
//! Every field is sanitized on its own first, so the `_` join separator only
//! ever appears between fields.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::io::ErrorKind as IoErrorKind;
use std::path::Path;
use tokio::fs::{self, OpenOptions};
use tracing::instrument;

/// Maximum length of a name stem, in characters, before the extension.
pub const MAX_STEM_CHARS: usize = 200;
/// Joins the fields of a name.
pub const FIELD_SEPARATOR: char = '_';
/// Replaces whitespace runs and pre-existing field separators.
pub const WORD_SEPARATOR: char = '-';

const ILLEGAL_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];
const UNTITLED: &str = "untitled";
const UNKNOWN: &str = "unknown";
/// Longest extension carried over from the submitted filename.
const MAX_EXTENSION_CHARS: usize = 16;

/// Makes one name field safe for any common filesystem.
///
/// Path-illegal and control characters are dropped, whitespace runs become a
/// single `-`, and `_` is folded into `-`. Leading dots are removed so a
/// field can never produce a hidden file. The result is a fixed point:
/// sanitizing it again returns it unchanged.
pub fn sanitize_component(raw: &str) -> String {
    let mut sanitized = String::with_capacity(raw.len());
    let mut pending_space = false;
    for c in raw.chars() {
        if c.is_whitespace() {
            pending_space = !sanitized.is_empty();
            continue;
        }
        if ILLEGAL_CHARS.contains(&c) || c.is_control() || (c == '.' && sanitized.is_empty()) {
            continue;
        }
        if pending_space {
            sanitized.push(WORD_SEPARATOR);
            pending_space = false;
        }
        sanitized.push(if c == FIELD_SEPARATOR { WORD_SEPARATOR } else { c });
    }
    sanitized
}

fn field(raw: &str, placeholder: &str) -> String {
    match sanitize_component(raw) {
        s if s.is_empty() => placeholder.to_string(),
        s => s,
    }
}

/// Builds the name stem for an upload, at most [`MAX_STEM_CHARS`] long.
///
/// Empty fields, or fields with nothing left after sanitizing, fall back to
/// `untitled` (title) and `unknown` (submitter).
pub fn build_name(submitter_id: &str, submitter_name: &str, title: &str) -> String {
    let joined = [field(title, UNTITLED), field(submitter_id, UNKNOWN), field(submitter_name, UNKNOWN)]
        .join(&FIELD_SEPARATOR.to_string());
    joined.chars().take(MAX_STEM_CHARS).collect()
}

/// An archive file name before collision resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveName {
    pub stem: String,
    /// Without the leading dot.
    pub extension: Option<String>,
}
impl ArchiveName {
    pub fn new(submitter_id: &str, submitter_name: &str, title: &str, submitted_filename: &str) -> Self {
        Self { stem: build_name(submitter_id, submitter_name, title), extension: extension_of(submitted_filename) }
    }

    /// The file name with no counter.
    pub fn file_name(&self) -> String {
        self.with_suffix("")
    }

    /// The file name with `_<counter>` inserted before the extension.
    pub fn numbered(&self, counter: u64) -> String {
        self.with_suffix(&format!("{FIELD_SEPARATOR}{counter}"))
    }

    fn with_suffix(&self, suffix: &str) -> String {
        match &self.extension {
            Some(ext) => format!("{}{suffix}.{ext}", self.stem),
            None => format!("{}{suffix}", self.stem),
        }
    }
}

/// Extension of the file name the client submitted, restricted to ASCII
/// alphanumerics. Case is preserved.
fn extension_of(submitted_filename: &str) -> Option<String> {
    let ext = Path::new(submitted_filename).extension()?.to_str()?;
    let ext: String = ext.chars().filter(char::is_ascii_alphanumeric).take(MAX_EXTENSION_CHARS).collect();
    (!ext.is_empty()).then_some(ext)
}

/// Claims the first free name in `dir`: the plain name, then `_1`, `_2` and
/// so on with no upper bound.
///
/// A name is claimed by creating an empty placeholder with `create_new`, so
/// concurrent runs, in this process or any other, never receive the same
/// name. The caller owns the placeholder and is expected to move the upload
/// over it, or remove it with [`release_name`].
#[instrument(level = "debug", skip_all, fields(dir = %dir.display(), stem = %name.stem))]
pub async fn resolve_collision(dir: &Path, name: &ArchiveName) -> Result<String> {
    let mut candidate = name.file_name();
    let mut counter = 0;
    loop {
        let path = dir.join(&candidate);
        match OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(_) => {
                if counter > 0 {
                    tracing::info!(name = %candidate, "Archive name taken; using a numbered name");
                }
                return Ok(candidate);
            },
            Err(err) if err.kind() == IoErrorKind::AlreadyExists => {
                counter += 1;
                candidate = name.numbered(counter);
            },
            Err(err) => return Err(err).or_raise(|| ErrorKind::Naming),
        }
    }
}

/// Gives up a name claimed by [`resolve_collision`] that was never filled.
pub async fn release_name(dir: &Path, filename: &str) {
    let path = dir.join(filename);
    if let Ok(meta) = fs::metadata(&path).await
        && meta.len() == 0
        && let Err(err) = fs::remove_file(&path).await
    {
        tracing::warn!(path = %path.display(), error = %err, "Unable to release archive name");
    }
}
