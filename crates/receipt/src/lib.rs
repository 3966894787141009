//! The Receipt Generator: a self-contained, printable HTML confirmation for a
//! finalized upload.
//!
//! The template is embedded into the binary and compiled once per
//! [`ReceiptRenderer`]. Every interpolated value goes through the `html`
//! formatter, so submitted titles and names cannot inject markup.

mod assets;
pub mod error;
mod view;

use crate::assets::Templates;
use crate::error::{ErrorKind, Result};
use crate::view::View;
pub use crate::view::format_bitrate;
use exn::ResultExt;
use intake_config::FormatRequirements;
use intake_probe::{Extraction, FormatCheck};
use intake_storage::Digest;
use tracing::instrument;
use upon::{Engine, Template};

const TEMPLATE: &str = "receipt.html";

/// Everything a receipt shows about one finalized upload.
#[derive(Debug, Clone)]
pub struct Receipt {
    pub upload_id: String,
    /// Localized completion timestamp, already formatted.
    pub completed_at: String,
    pub title: String,
    pub submitter_id: String,
    pub submitter_name: String,
    /// Archived file name.
    pub filename: String,
    pub size: u64,
    pub digest: Digest,
    pub extraction: Extraction,
    /// `None` when validation was skipped because extraction failed.
    pub check: Option<FormatCheck>,
    pub allow_non_video_files: bool,
    pub requirements: FormatRequirements,
}

pub struct ReceiptRenderer {
    engine: Engine<'static>,
    template: Template<'static>,
}
impl ReceiptRenderer {
    pub fn new() -> Result<Self> {
        let mut engine = Engine::new();
        addons::configure(&mut engine);
        let template = engine.compile(Templates::load(TEMPLATE)?).or_raise(|| ErrorKind::Template)?;
        Ok(Self { engine, template })
    }

    #[instrument(level = "debug", skip_all, fields(upload_id = %receipt.upload_id))]
    pub fn render(&self, receipt: &Receipt) -> Result<String> {
        self.template.render(&self.engine, View::new(receipt)).to_string().or_raise(|| ErrorKind::Template)
    }
}

/// Custom [`upon`] extensions for HTML output.
mod addons {
    use std::fmt::Write;
    use upon::{Engine, Value, fmt as upon_fmt};

    pub(crate) fn escape(s: &str) -> String {
        let mut escaped = String::with_capacity(s.len());
        for c in s.chars() {
            match c {
                '&' => escaped.push_str("&amp;"),
                '<' => escaped.push_str("&lt;"),
                '>' => escaped.push_str("&gt;"),
                '"' => escaped.push_str("&quot;"),
                '\'' => escaped.push_str("&#39;"),
                c => escaped.push(c),
            }
        }
        escaped
    }

    /// Escapes strings for HTML text and attribute contexts.
    fn html_formatter(f: &mut upon_fmt::Formatter<'_>, value: &Value) -> upon_fmt::Result {
        match value {
            Value::String(s) => write!(f, "{}", escape(s))?,
            v => upon_fmt::default(f, v)?,
        };
        Ok(())
    }

    /// Registers the `html` formatter on the given engine.
    pub(crate) fn configure(engine: &mut Engine<'_>) {
        engine.add_formatter("html", html_formatter);
    }
}
