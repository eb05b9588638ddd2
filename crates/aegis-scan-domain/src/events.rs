//! Scan lifecycle events for append-only provenance (C10).
//!
//! Grounded directly on the teacher's `aivcs_ci_domain::events` module:
//! events are the ground truth for a scan run, the ledger is a derived
//! query index. The event shapes mirror a security-scan run instead of a
//! CI run: adapters fan out, each reports completion or failure
//! independently, and the run concludes with consolidation, threshold
//! gating, and (on a pass) SBOM generation and signing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanEventId(pub Uuid);

impl ScanEventId {
    pub fn new() -> Self {
        ScanEventId(Uuid::new_v4())
    }
}

impl Default for ScanEventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ScanEventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scan lifecycle events, fully ordered and append-only per `run_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ScanEvent {
    /// A scan run has been requested.
    ScanRequested(ScanRequestedEvent),
    /// One scanner adapter task has finished successfully.
    AdapterCompleted(AdapterCompletedEvent),
    /// One scanner adapter task has failed (§7 "partial" — never aborts the run).
    AdapterFailed(AdapterFailedEvent),
    /// All adapter tasks have been awaited and merged into one report.
    ReportConsolidated(ReportConsolidatedEvent),
    /// The threshold gate has been evaluated against the merged report.
    GateEvaluated(GateEvaluatedEvent),
    /// An SBOM artifact has been generated and written.
    SbomGenerated(SbomGeneratedEvent),
    /// A detached signature over the SBOM has been written.
    SbomSigned(SbomSignedEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRequestedEvent {
    pub event_id: ScanEventId,
    pub run_id: String,
    pub repo_url: Option<String>,
    pub commit_sha: Option<String>,
    pub artifact_url: Option<String>,
    pub scan_types: Vec<String>,
    pub blocking_severity: String,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterCompletedEvent {
    pub event_id: ScanEventId,
    pub run_id: String,
    pub scanner_name: String,
    pub vulnerability_count: usize,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterFailedEvent {
    pub event_id: ScanEventId,
    pub run_id: String,
    pub scanner_name: String,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConsolidatedEvent {
    pub event_id: ScanEventId,
    pub run_id: String,
    pub total_vulnerabilities: usize,
    pub summary: serde_json::Value,
    pub consolidated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateEvaluatedEvent {
    pub event_id: ScanEventId,
    pub run_id: String,
    pub passed: bool,
    pub violations: Vec<String>,
    pub evaluated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SbomGeneratedEvent {
    pub event_id: ScanEventId,
    pub run_id: String,
    pub sbom_url: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SbomSignedEvent {
    pub event_id: ScanEventId,
    pub run_id: String,
    pub signature_url: String,
    pub signed_at: DateTime<Utc>,
}

/// One recorded event, stamped with its position in the run's stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanEventRecord {
    pub event: ScanEvent,
    pub sequence: u64,
    pub run_id: String,
    pub recorded_at: DateTime<Utc>,
}

/// Derived, queryable view of a scan run — rebuilt from the event stream,
/// never the system of record itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanLedgerEntry {
    pub run_id: String,
    pub target: String,
    pub status: String,
    pub passed: Option<bool>,
    pub total_vulnerabilities: usize,
    pub sbom_url: Option<String>,
    pub signature_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}
