//! SBOM + detached-signature artifact store. Writes land at
//! `<artifact_storage_path>/sbom-<commit>.json` and `.sig`, each paired
//! with a `.digest` sidecar for tamper detection — the same pattern the
//! teacher uses for recovery artifacts (content digest computed on write,
//! verified on read).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::warn;

use crate::digest::ContentDigest;
use crate::error::{StorageError, StorageResult};

#[async_trait]
pub trait SbomArtifactStore: Send + Sync {
    async fn write_sbom(&self, commit_sha: &str, bytes: &[u8]) -> StorageResult<String>;
    async fn write_signature(&self, commit_sha: &str, bytes: &[u8]) -> StorageResult<String>;
    async fn read_sbom(&self, commit_sha: &str) -> StorageResult<Vec<u8>>;
}

/// Filesystem-backed implementation rooted at `artifact_storage_path`.
pub struct FsSbomStore {
    root: PathBuf,
}

impl FsSbomStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn write_with_digest(&self, path: &Path, bytes: &[u8]) -> StorageResult<String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let digest = ContentDigest::from_bytes(bytes);
        std::fs::write(path, bytes)?;
        std::fs::write(path.with_extension("digest"), digest.as_str())?;
        Ok(path.to_string_lossy().into_owned())
    }

    fn read_with_digest(&self, path: &Path) -> StorageResult<Vec<u8>> {
        let bytes = std::fs::read(path)?;
        let digest_path = path.with_extension("digest");
        if let Ok(expected) = std::fs::read_to_string(&digest_path) {
            let actual = ContentDigest::from_bytes(&bytes);
            if expected.trim() != actual.as_str() {
                return Err(StorageError::IntegrityError {
                    expected: expected.trim().to_string(),
                    actual: actual.as_str().to_string(),
                });
            }
        } else {
            warn!(path = %path.display(), "sbom artifact missing digest sidecar");
        }
        Ok(bytes)
    }
}

#[async_trait]
impl SbomArtifactStore for FsSbomStore {
    async fn write_sbom(&self, commit_sha: &str, bytes: &[u8]) -> StorageResult<String> {
        let path = self.root.join(format!("sbom-{commit_sha}.json"));
        self.write_with_digest(&path, bytes)
    }

    async fn write_signature(&self, commit_sha: &str, bytes: &[u8]) -> StorageResult<String> {
        let path = self.root.join(format!("sbom-{commit_sha}.sig"));
        self.write_with_digest(&path, bytes)
    }

    async fn read_sbom(&self, commit_sha: &str) -> StorageResult<Vec<u8>> {
        let path = self.root.join(format!("sbom-{commit_sha}.json"));
        self.read_with_digest(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSbomStore::new(dir.path());
        store.write_sbom("abc123", b"{\"components\":[]}").await.unwrap();
        let bytes = store.read_sbom("abc123").await.unwrap();
        assert_eq!(bytes, b"{\"components\":[]}");
    }

    #[tokio::test]
    async fn tampered_sbom_fails_digest_check() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSbomStore::new(dir.path());
        store.write_sbom("abc123", b"original").await.unwrap();
        let path = dir.path().join("sbom-abc123.json");
        std::fs::write(&path, b"tampered").unwrap();
        let err = store.read_sbom("abc123").await.unwrap_err();
        assert!(matches!(err, StorageError::IntegrityError { .. }));
    }
}
