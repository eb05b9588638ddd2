//! In-memory reference implementations of the storage traits. Used both in
//! tests and as the default backend when no SurrealDB connection is
//! configured (mirrors the teacher's `oxidized-state::fakes` module, which
//! the recorder explicitly treats as a valid "Phase 1" backend, not just a
//! test double).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{StorageError, StorageResult};
use crate::historical_store::{ErrorQuery, ErrorRecord, HistoricalErrorStore};
use crate::model_store::{ModelKey, ModelStore, TrainingHistoryEntry};
use crate::patch_registry::{AppliedPatchRecord, AppliedPatchRegistry};

#[derive(Debug, Default)]
pub struct MemoryHistoricalErrorStore {
    by_index: Mutex<HashMap<String, Vec<ErrorRecord>>>,
}

impl MemoryHistoricalErrorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoricalErrorStore for MemoryHistoricalErrorStore {
    async fn record(&self, index_prefix: &str, record: ErrorRecord) -> StorageResult<()> {
        let key = crate::historical_store::index_key(index_prefix, record.timestamp);
        self.by_index.lock().unwrap().entry(key).or_default().push(record);
        Ok(())
    }

    async fn query(&self, query: &ErrorQuery) -> StorageResult<Vec<ErrorRecord>> {
        let store = self.by_index.lock().unwrap();
        let mut matches: Vec<ErrorRecord> = store
            .values()
            .flatten()
            .filter(|r| {
                query
                    .pipeline_id
                    .as_ref()
                    .map(|p| &r.pipeline_id == p)
                    .unwrap_or(true)
                    && query
                        .category
                        .as_ref()
                        .map(|c| &r.category == c)
                        .unwrap_or(true)
                    && query.stage.as_ref().map(|s| &r.stage == s).unwrap_or(true)
                    && query
                        .message_contains
                        .as_ref()
                        .map(|m| r.message.contains(m.as_str()))
                        .unwrap_or(true)
                    && query.since.map(|s| r.timestamp >= s).unwrap_or(true)
                    && query.until.map(|u| r.timestamp <= u).unwrap_or(true)
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(matches)
    }
}

#[derive(Debug, Default)]
pub struct MemoryAppliedPatchRegistry {
    patches: Mutex<HashMap<String, AppliedPatchRecord>>,
}

impl MemoryAppliedPatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppliedPatchRegistry for MemoryAppliedPatchRegistry {
    async fn insert(&self, record: AppliedPatchRecord) -> StorageResult<()> {
        let mut patches = self.patches.lock().unwrap();
        if patches.contains_key(&record.solution_id) {
            return Err(StorageError::AlreadyApplied {
                solution_id: record.solution_id,
            });
        }
        patches.insert(record.solution_id.clone(), record);
        Ok(())
    }

    async fn remove(&self, solution_id: &str) -> StorageResult<Option<AppliedPatchRecord>> {
        Ok(self.patches.lock().unwrap().remove(solution_id))
    }

    async fn get(&self, solution_id: &str) -> StorageResult<Option<AppliedPatchRecord>> {
        Ok(self.patches.lock().unwrap().get(solution_id).cloned())
    }

    async fn list(&self) -> StorageResult<Vec<AppliedPatchRecord>> {
        Ok(self.patches.lock().unwrap().values().cloned().collect())
    }
}

#[derive(Debug, Default)]
pub struct MemoryModelStore {
    models: Mutex<HashMap<ModelKey, Vec<u8>>>,
    history: Mutex<HashMap<ModelKey, TrainingHistoryEntry>>,
}

impl MemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ModelStore for MemoryModelStore {
    async fn put_model(&self, key: &ModelKey, bytes: Vec<u8>) -> StorageResult<()> {
        self.models.lock().unwrap().insert(key.clone(), bytes);
        Ok(())
    }

    async fn get_model(&self, key: &ModelKey) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.models.lock().unwrap().get(key).cloned())
    }

    async fn record_training(&self, entry: TrainingHistoryEntry) -> StorageResult<()> {
        self.history.lock().unwrap().insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn training_history(&self) -> StorageResult<Vec<TrainingHistoryEntry>> {
        let mut entries: Vec<_> = self.history.lock().unwrap().values().cloned().collect();
        entries.sort_by(|a, b| a.trained_at.cmp(&b.trained_at));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(pipeline_id: &str, category: &str) -> ErrorRecord {
        ErrorRecord {
            error_id: uuid::Uuid::new_v4().to_string(),
            pipeline_id: pipeline_id.to_string(),
            category: category.to_string(),
            stage: "build".to_string(),
            message: "ModuleNotFoundError: No module named 'requests'".to_string(),
            timestamp: Utc::now(),
            payload: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn query_filters_by_pipeline_and_category() {
        let store = MemoryHistoricalErrorStore::new();
        store.record("errors-", sample_record("run-1", "dependency")).await.unwrap();
        store.record("errors-", sample_record("run-2", "permission")).await.unwrap();

        let results = store
            .query(&ErrorQuery {
                pipeline_id: Some("run-1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].category, "dependency");
    }

    #[tokio::test]
    async fn applied_patch_registry_rejects_double_apply() {
        let registry = MemoryAppliedPatchRegistry::new();
        let record = AppliedPatchRecord {
            solution_id: "sol-1".to_string(),
            error_id: "err-1".to_string(),
            applied_at: Utc::now(),
            payload: serde_json::json!({}),
        };
        registry.insert(record.clone()).await.unwrap();
        let err = registry.insert(record).await.unwrap_err();
        assert!(matches!(err, StorageError::AlreadyApplied { .. }));
    }

    #[tokio::test]
    async fn applied_patch_registry_remove_is_idempotent() {
        let registry = MemoryAppliedPatchRegistry::new();
        assert!(registry.remove("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn model_store_hot_swaps_atomically() {
        let store = MemoryModelStore::new();
        let key = ModelKey::new("category", "random_forest");
        store.put_model(&key, vec![1, 2, 3]).await.unwrap();
        store.put_model(&key, vec![4, 5, 6]).await.unwrap();
        assert_eq!(store.get_model(&key).await.unwrap(), Some(vec![4, 5, 6]));
    }
}
