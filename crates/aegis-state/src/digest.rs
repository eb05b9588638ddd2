//! Content digest for artifact integrity verification.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::StorageError;

/// SHA-256 content digest (lowercase hex). The inner field is private so the
/// string is always valid lowercase hex produced by `from_bytes` or
/// validated via `TryFrom<String>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest(String);

impl ContentDigest {
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentDigest(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = StorageError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s.len() != 64 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StorageError::InvalidDigest { digest: s });
        }
        Ok(ContentDigest(s.to_ascii_lowercase()))
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_bytes_same_digest() {
        let a = ContentDigest::from_bytes(b"hello");
        let b = ContentDigest::from_bytes(b"hello");
        assert_eq!(a, b);
    }

    #[test]
    fn try_from_rejects_bad_length() {
        assert!(ContentDigest::try_from("abc".to_string()).is_err());
    }

    #[test]
    fn try_from_accepts_valid_hex() {
        let digest = ContentDigest::from_bytes(b"hello");
        let roundtrip = ContentDigest::try_from(digest.as_str().to_string()).unwrap();
        assert_eq!(digest, roundtrip);
    }
}
