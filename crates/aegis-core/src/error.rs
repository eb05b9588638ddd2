//! Shared error taxonomy (C12). Kinds mirror the recovery table in the
//! design: validation, not-found, conflict, safety, transient, policy,
//! auth, data, partial, plus an internal catch-all carrying a stable
//! `trace_id` for anything that should never have escaped a lower layer
//! unhandled.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AegisError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("safety violation: {0}")]
    Safety(String),

    #[error("transient failure after retries: {0}")]
    Transient(String),

    #[error("policy denied: {0}")]
    Policy(String),

    #[error("auth failure: {0}")]
    Auth(String),

    #[error("data error: {0}")]
    Data(String),

    #[error("partial failure: {0}")]
    Partial(String),

    #[error("internal error (trace_id={trace_id}): {message}")]
    Internal { trace_id: Uuid, message: String },

    #[error("storage error: {0}")]
    Storage(#[from] aegis_state::StorageError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl AegisError {
    pub fn internal(message: impl Into<String>) -> Self {
        AegisError::Internal {
            trace_id: Uuid::new_v4(),
            message: message.into(),
        }
    }

    /// The taxonomy kind name, stable for logging/metrics dimensions.
    pub fn kind(&self) -> &'static str {
        match self {
            AegisError::Validation(_) => "validation",
            AegisError::NotFound(_) => "not-found",
            AegisError::Conflict(_) => "conflict",
            AegisError::Safety(_) => "safety",
            AegisError::Transient(_) => "transient",
            AegisError::Policy(_) => "policy",
            AegisError::Auth(_) => "auth",
            AegisError::Data(_) => "data",
            AegisError::Partial(_) => "partial",
            AegisError::Internal { .. } => "internal",
            AegisError::Storage(_) => "storage",
            AegisError::Serialization(_) => "serialization",
        }
    }
}

impl From<std::io::Error> for AegisError {
    fn from(e: std::io::Error) -> Self {
        AegisError::internal(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AegisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_are_stable() {
        assert_eq!(AegisError::Validation("x".into()).kind(), "validation");
        assert_eq!(AegisError::internal("boom").kind(), "internal");
    }
}
