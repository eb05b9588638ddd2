//! Vulnerability and VulnerabilityReport (§3), grounded on the original
//! Python `models/vulnerability.py` shape (`Vulnerability`,
//! `VulnerabilityReport.update_summary`) carried into an idiomatic Rust
//! type that enforces the summary invariant on construction rather than
//! relying on callers to remember to call an `update_summary` method.

use std::collections::BTreeMap;

use aegis_core::value::Context;
use serde::{Deserialize, Serialize};

pub use aegis_core::domain::Severity;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vulnerability {
    pub id: String,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub cvss_score: f64,
    /// `name@version`.
    pub affected_component: String,
    pub fix_version: Option<String>,
    pub references: Vec<String>,
}

impl Vulnerability {
    pub fn component_name(&self) -> &str {
        self.affected_component.split('@').next().unwrap_or(&self.affected_component)
    }

    pub fn component_version(&self) -> &str {
        self.affected_component.split('@').nth(1).unwrap_or("unknown")
    }
}

/// `scanner_name -> VulnerabilityReport` is produced per-adapter; the
/// orchestrator then merges many of these into one consolidated report
/// with `scanner_name = "security-coordinator"` (§4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VulnerabilityReport {
    pub scanner_name: String,
    pub scan_timestamp: chrono::DateTime<chrono::Utc>,
    pub target: String,
    vulnerabilities: Vec<Vulnerability>,
    /// Derived: severity -> count. Recomputed on every mutation so the
    /// invariant `sum(summary.values()) == len(vulnerabilities)` never
    /// goes stale (§8).
    summary: BTreeMap<String, u32>,
    pub metadata: Context,
}

impl VulnerabilityReport {
    pub fn new(scanner_name: impl Into<String>, scan_timestamp: chrono::DateTime<chrono::Utc>, target: impl Into<String>) -> Self {
        Self {
            scanner_name: scanner_name.into(),
            scan_timestamp,
            target: target.into(),
            vulnerabilities: Vec::new(),
            summary: BTreeMap::new(),
            metadata: Context::new(),
        }
    }

    pub fn with_vulnerabilities(mut self, vulnerabilities: Vec<Vulnerability>) -> Self {
        self.vulnerabilities = vulnerabilities;
        self.recompute_summary();
        self
    }

    pub fn with_metadata(mut self, metadata: Context) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn vulnerabilities(&self) -> &[Vulnerability] {
        &self.vulnerabilities
    }

    pub fn summary(&self) -> &BTreeMap<String, u32> {
        &self.summary
    }

    pub fn push(&mut self, vulnerability: Vulnerability) {
        *self.summary.entry(vulnerability.severity.to_string()).or_insert(0) += 1;
        self.vulnerabilities.push(vulnerability);
    }

    fn recompute_summary(&mut self) {
        let mut summary = BTreeMap::new();
        for vuln in &self.vulnerabilities {
            *summary.entry(vuln.severity.to_string()).or_insert(0) += 1;
        }
        self.summary = summary;
    }

    /// Invariant check exercised by tests (§8): `sum(summary.values()) ==
    /// len(vulnerabilities)`.
    pub fn summary_is_consistent(&self) -> bool {
        let total: u32 = self.summary.values().sum();
        total as usize == self.vulnerabilities.len()
    }
}
