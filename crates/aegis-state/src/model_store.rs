//! ML model persistence: one serialized model per (target, family), plus a
//! shared `training_history` record. Loading a new file under the same key
//! atomically replaces the in-memory model for subsequent requests;
//! in-flight requests continue to observe the prior model (§4.3).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StorageResult;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelKey {
    pub target: String,
    pub family: String,
}

impl ModelKey {
    pub fn new(target: impl Into<String>, family: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            family: family.into(),
        }
    }

    pub fn as_path_component(&self) -> String {
        format!("{}_{}", self.target, self.family)
    }
}

/// One entry in `training_history.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingHistoryEntry {
    pub key: ModelKey,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub cv_score: f64,
    pub best_params: serde_json::Value,
    pub class_distribution: serde_json::Value,
    pub trained_at: chrono::DateTime<chrono::Utc>,
}

#[async_trait]
pub trait ModelStore: Send + Sync {
    /// Atomically replace the serialized model bytes for `key`.
    async fn put_model(&self, key: &ModelKey, bytes: Vec<u8>) -> StorageResult<()>;

    /// Fetch the current serialized model bytes for `key`, if trained.
    async fn get_model(&self, key: &ModelKey) -> StorageResult<Option<Vec<u8>>>;

    /// Append (or replace, keyed by `ModelKey`) a training history entry.
    async fn record_training(&self, entry: TrainingHistoryEntry) -> StorageResult<()>;

    /// Full training history, most recent entry per key.
    async fn training_history(&self) -> StorageResult<Vec<TrainingHistoryEntry>>;
}
