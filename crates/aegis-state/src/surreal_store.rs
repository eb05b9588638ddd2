//! SurrealDB-backed `HistoricalErrorStore` (feature `surreal`). Grounded
//! on the teacher's `oxidized-state::handle::SurrealHandle`: connect,
//! select namespace/database, `DEFINE TABLE` schema up front, then plain
//! `CREATE`/`SELECT` statements rather than the query builder.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info, instrument};

use crate::error::StorageResult;
use crate::historical_store::{index_key, ErrorQuery, ErrorRecord, HistoricalErrorStore};

const SCHEMA: &str = r#"
DEFINE TABLE error_records SCHEMAFULL;
DEFINE FIELD error_id ON error_records TYPE string;
DEFINE FIELD pipeline_id ON error_records TYPE string;
DEFINE FIELD category ON error_records TYPE string;
DEFINE FIELD stage ON error_records TYPE string;
DEFINE FIELD message ON error_records TYPE string;
DEFINE FIELD timestamp ON error_records TYPE datetime;
DEFINE FIELD index_key ON error_records TYPE string;
DEFINE FIELD payload ON error_records FLEXIBLE TYPE object;
DEFINE INDEX idx_error_id ON error_records FIELDS error_id UNIQUE;
DEFINE INDEX idx_error_index_key ON error_records FIELDS index_key;
"#;

#[derive(Debug, Serialize, Deserialize)]
struct ErrorRow {
    error_id: String,
    pipeline_id: String,
    category: String,
    stage: String,
    message: String,
    timestamp: surrealdb::sql::Datetime,
    index_key: String,
    payload: serde_json::Value,
}

impl From<&ErrorRow> for ErrorRecord {
    fn from(row: &ErrorRow) -> Self {
        ErrorRecord {
            error_id: row.error_id.clone(),
            pipeline_id: row.pipeline_id.clone(),
            category: row.category.clone(),
            stage: row.stage.clone(),
            message: row.message.clone(),
            timestamp: row.timestamp.0,
            payload: row.payload.clone(),
        }
    }
}

pub struct SurrealHistoricalErrorStore {
    db: Surreal<Any>,
}

impl SurrealHistoricalErrorStore {
    /// Connects using any SurrealDB engine address `surrealdb::engine::any`
    /// accepts (`mem://`, `ws://host:port`, ...); `ns`/`db` select the
    /// namespace and database, mirroring `SurrealHandle::setup_db`.
    #[instrument(skip(address, ns, db))]
    pub async fn connect(address: &str, ns: &str, db: &str) -> StorageResult<Self> {
        info!(address, "connecting to surrealdb");
        let conn = surrealdb::engine::any::connect(address).await?;
        conn.use_ns(ns).use_db(db).await?;
        let store = Self { db: conn };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> StorageResult<()> {
        debug!("initializing error_records schema");
        self.db.query(SCHEMA).await?;
        Ok(())
    }
}

#[async_trait]
impl HistoricalErrorStore for SurrealHistoricalErrorStore {
    async fn record(&self, index_prefix: &str, record: ErrorRecord) -> StorageResult<()> {
        let row = ErrorRow {
            error_id: record.error_id.clone(),
            pipeline_id: record.pipeline_id,
            category: record.category,
            stage: record.stage,
            message: record.message,
            timestamp: record.timestamp.into(),
            index_key: index_key(index_prefix, record.timestamp),
            payload: record.payload,
        };
        let _: Option<ErrorRow> = self.db.create(("error_records", row.error_id.clone())).content(row).await?;
        Ok(())
    }

    async fn query(&self, query: &ErrorQuery) -> StorageResult<Vec<ErrorRecord>> {
        let rows: Vec<ErrorRow> = self.db.select("error_records").await?;
        let mut matches: Vec<ErrorRecord> = rows
            .iter()
            .filter(|r| {
                query.pipeline_id.as_ref().map(|p| &r.pipeline_id == p).unwrap_or(true)
                    && query.category.as_ref().map(|c| &r.category == c).unwrap_or(true)
                    && query.stage.as_ref().map(|s| &r.stage == s).unwrap_or(true)
                    && query.message_contains.as_ref().map(|m| r.message.contains(m.as_str())).unwrap_or(true)
                    && query.since.map(|s| r.timestamp.0 >= s).unwrap_or(true)
                    && query.until.map(|u| r.timestamp.0 <= u).unwrap_or(true)
            })
            .map(ErrorRecord::from)
            .collect();
        matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(matches)
    }
}
