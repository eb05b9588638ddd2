//! Historical errors store — append-only, queryable by pipeline/category/
//! stage/message/date range, newest-first. Keyed by a time-partitioned
//! index (`<prefix><YYYY-MM>`), mirroring the teacher's `RunLedger`
//! query-by-filter shape.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageResult;

/// One persisted error document. `payload` carries the full serialized
/// `PipelineError` + classification so this crate stays agnostic of the
/// domain model living in `aegis-core`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub error_id: String,
    pub pipeline_id: String,
    pub category: String,
    pub stage: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}

/// Filter for historical error queries. All fields are optional
/// conjunctions; `None` means "don't filter on this field".
#[derive(Debug, Clone, Default)]
pub struct ErrorQuery {
    pub pipeline_id: Option<String>,
    pub category: Option<String>,
    pub stage: Option<String>,
    pub message_contains: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

/// Time-partitioned index key, `<prefix><YYYY-MM>`.
pub fn index_key(prefix: &str, timestamp: DateTime<Utc>) -> String {
    format!("{prefix}{}", timestamp.format("%Y-%m"))
}

#[async_trait]
pub trait HistoricalErrorStore: Send + Sync {
    /// Append one error document under its time-partitioned index.
    async fn record(&self, index_prefix: &str, record: ErrorRecord) -> StorageResult<()>;

    /// Query documents across all indices matching the filter, newest-first.
    async fn query(&self, query: &ErrorQuery) -> StorageResult<Vec<ErrorRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn index_key_format() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 5, 0, 0, 0).unwrap();
        assert_eq!(index_key("errors-", ts), "errors-2026-03");
    }
}
