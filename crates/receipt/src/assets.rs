//! Embedded receipt templates.
//!
//! Templates are embedded into the binary at compile time using
//! [`rust-embed`](rust_embed), so a deployed binary needs no asset directory.

use crate::error::{ErrorKind, Result};
use exn::OptionExt;
use rust_embed::Embed;

#[derive(Embed)]
#[folder = "../../assets/receipt/"]
pub(crate) struct Templates;
impl Templates {
    /// Source text of an embedded template.
    pub(crate) fn load(name: &str) -> Result<String> {
        let file = Self::get(name).ok_or_raise(|| ErrorKind::AssetNotFound(name.to_string()))?;
        String::from_utf8(file.data.into_owned()).map_err(|_| ErrorKind::AssetEncoding(name.to_string()).into())
    }
}
