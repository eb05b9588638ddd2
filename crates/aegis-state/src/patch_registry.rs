//! Applied-patches registry. Single writer per key, many concurrent
//! readers; mirrors the teacher's `RunLedger` state-transition guards
//! (`oxidized-state::fakes::MemoryRunLedger`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedPatchRecord {
    pub solution_id: String,
    pub error_id: String,
    pub applied_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

#[async_trait]
pub trait AppliedPatchRegistry: Send + Sync {
    /// Record a patch as applied. Rejects with `StorageError::AlreadyApplied`
    /// if `solution_id` is already present (idempotency guard, §4.7).
    async fn insert(&self, record: AppliedPatchRecord) -> StorageResult<()>;

    /// Remove a patch from the registry (rollback). Idempotent: removing an
    /// absent key is not an error at the storage layer — callers surface
    /// "not found" themselves when they need to distinguish first vs.
    /// second rollback.
    async fn remove(&self, solution_id: &str) -> StorageResult<Option<AppliedPatchRecord>>;

    async fn get(&self, solution_id: &str) -> StorageResult<Option<AppliedPatchRecord>>;

    async fn list(&self) -> StorageResult<Vec<AppliedPatchRecord>>;
}
