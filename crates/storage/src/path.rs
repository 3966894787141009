//! Record key validation.
//!
//! Sidecar records are stored as `<store>/<key>.<ext>`, where the key is the
//! upload identifier assigned by the transport layer. Keys are never trusted:
//! a key must name exactly one file inside its store.

use crate::error::{ErrorKind, Result};
use std::path::{Component, Path};

/// Validates a record key (an upload identifier).
///
/// > **Note:** Unlike general paths, keys never contain separators. Anything
/// >           that would resolve to more (or less) than one normal path
/// >           component is rejected, as are NUL bytes.
///
/// # Examples
///
/// ```
/// use intake_storage::validate_key;
/// assert!(validate_key("abc123").is_ok());
/// assert!(validate_key("8f2c6d0e1b7a4f.upload").is_ok());
/// assert!(validate_key("../etc/passwd").is_err());
/// assert!(validate_key("a/b").is_err());
/// assert!(validate_key("").is_err());
/// ```
pub fn validate_key(key: &str) -> Result<&str> {
    let invalid = || ErrorKind::InvalidKey(key.to_string());
    if key.is_empty() || key.contains(['/', '\\', '\0']) {
        exn::bail!(invalid());
    }
    let mut components = Path::new(key).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(key),
        _ => exn::bail!(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("abc123")]
    #[case("d41d8cd98f00b204e9800998ecf8427e")]
    #[case("upload.with.dots")]
    #[case("..hidden-but-fine")]
    fn test_valid_keys(#[case] key: &str) {
        assert_eq!(validate_key(key).unwrap(), key);
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("..")]
    #[case("../escape")]
    #[case("nested/key")]
    #[case("/absolute")]
    #[case("windows\\style")]
    #[case("nul\0byte")]
    fn test_invalid_keys(#[case] key: &str) {
        let err = validate_key(key).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidKey(k) if k == key));
    }
}
