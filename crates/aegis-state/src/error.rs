//! Storage error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("digest not found: {digest}")]
    NotFound { digest: String },

    #[error("invalid digest: {digest}")]
    InvalidDigest { digest: String },

    #[error("integrity error: expected {expected}, got {actual}")]
    IntegrityError { expected: String, actual: String },

    #[error("solution not found: {solution_id}")]
    SolutionNotFound { solution_id: String },

    #[error("patch already applied: {solution_id}")]
    AlreadyApplied { solution_id: String },

    #[error("model not found for target={target} family={family}")]
    ModelNotFound { target: String, family: String },

    #[error("backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Backend(e.to_string())
    }
}

#[cfg(feature = "surreal")]
impl From<surrealdb::Error> for StorageError {
    fn from(e: surrealdb::Error) -> Self {
        StorageError::Backend(e.to_string())
    }
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;
