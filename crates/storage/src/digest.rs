//! Streaming content digests.

use crate::error::{ErrorKind, Result};
use derive_more::Display;
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use sha2::Digest as _;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::instrument;

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    #[default]
    #[display("SHA-256")]
    Sha256,
    #[display("BLAKE3")]
    Blake3,
}
impl DigestAlgorithm {
    /// File extension of the digest record, which doubles as the config name.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Blake3 => "blake3",
        }
    }
}

enum Hasher {
    Sha256(sha2::Sha256),
    Blake3(Box<blake3::Hasher>),
}
impl Hasher {
    fn new(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Sha256 => Self::Sha256(sha2::Sha256::new()),
            DigestAlgorithm::Blake3 => Self::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(hasher) => hasher.update(data),
            Self::Blake3(hasher) => {
                hasher.update(data);
            },
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            Self::Sha256(hasher) => format!("{:x}", hasher.finalize()),
            Self::Blake3(hasher) => hasher.finalize().to_hex().to_string(),
        }
    }
}

/// A hex-encoded content digest.
#[derive(Debug, Display, Clone, PartialEq, Eq, Serialize)]
#[display("{hex}")]
pub struct Digest {
    pub algorithm: DigestAlgorithm,
    pub hex: String,
}
impl Digest {
    pub fn of_bytes(algorithm: DigestAlgorithm, data: &[u8]) -> Self {
        let mut hasher = Hasher::new(algorithm);
        hasher.update(data);
        Self { algorithm, hex: hasher.finalize_hex() }
    }

    /// Hashes a file in fixed-size chunks on the blocking pool; the file is
    /// never held in memory as a whole.
    #[instrument(level = "debug", fields(path = %path.display(), %algorithm))]
    pub async fn of_file(algorithm: DigestAlgorithm, path: &Path) -> Result<Self> {
        let owned = path.to_path_buf();
        let hex = tokio::task::spawn_blocking(move || hash_file(algorithm, &owned))
            .await
            .or_raise(|| ErrorKind::Task)?
            .map_err(|e| ErrorKind::from_io(e, path))?;
        Ok(Self { algorithm, hex })
    }
}

fn hash_file(algorithm: DigestAlgorithm, path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Hasher::new(algorithm);
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buffer[..n]),
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(hasher.finalize_hex())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relocate;

    const ABC_SHA256: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(Digest::of_bytes(DigestAlgorithm::Sha256, b"abc").hex, ABC_SHA256);
    }

    #[tokio::test]
    async fn test_file_digest_matches_in_memory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("clip.mov");
        // Spans several chunks, with a ragged tail.
        let data: Vec<u8> = (0..(CHUNK_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &data).unwrap();

        let sha = Digest::of_file(DigestAlgorithm::Sha256, &path).await.unwrap();
        assert_eq!(sha, Digest::of_bytes(DigestAlgorithm::Sha256, &data));
        let b3 = Digest::of_file(DigestAlgorithm::Blake3, &path).await.unwrap();
        assert_eq!(b3.hex, blake3::hash(&data).to_hex().to_string());
    }

    #[tokio::test]
    async fn test_relocation_preserves_digest() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = temp_dir.path().join("incoming/abc123");
        let dest = temp_dir.path().join("archive/clip.mov");
        std::fs::create_dir_all(source.parent().unwrap()).unwrap();
        std::fs::write(&source, vec![7u8; 200_000]).unwrap();

        let before = Digest::of_file(DigestAlgorithm::Sha256, &source).await.unwrap();
        relocate(&source, &dest).await.unwrap();
        let after = Digest::of_file(DigestAlgorithm::Sha256, &dest).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let err = Digest::of_file(DigestAlgorithm::Blake3, &temp_dir.path().join("nope")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[test]
    fn test_algorithm_names() {
        assert_eq!(DigestAlgorithm::default(), DigestAlgorithm::Sha256);
        assert_eq!(DigestAlgorithm::Blake3.extension(), "blake3");
        assert_eq!(DigestAlgorithm::Sha256.to_string(), "SHA-256");
    }
}
