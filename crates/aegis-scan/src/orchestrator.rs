//! Scan Orchestrator (C10): fans scan tasks out across adapters, merges
//! their reports, runs the threshold gate, and on a pass generates and
//! signs an SBOM. Grounded on `security_coordinator.py`'s
//! `SecurityCoordinator.run_security_scan` for the algorithm shape, and on
//! the teacher's event-sourcing split (`aivcs-ci-domain`) for recording
//! each step via [`ScanEventRecorder`] rather than mutating shared state
//! directly.

use std::sync::Arc;

use chrono::Utc;
use ed25519_dalek::SigningKey;
use tracing::{info, warn};

use aegis_core::config::AegisConfig;
use aegis_core::domain::Severity;
use aegis_core::error::{AegisError, Result};
use aegis_state::sbom_store::SbomArtifactStore;

use aegis_scan_domain::{
    AdapterCompletedEvent, AdapterFailedEvent, GateEvaluatedEvent, ReportConsolidatedEvent, ScanEvent, ScanEventRecorder, ScanRequestedEvent, SbomGeneratedEvent, SbomSignedEvent,
};

use crate::adapters::ScannerAdapter;
use crate::domain::VulnerabilityReport;
use crate::gate::evaluate_threshold_gate;
use crate::sbom::{generate_sbom, serialize_sbom, SbomSigner};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanType {
    Container,
    Project,
    WebApp,
}

impl ScanType {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "container" => Some(ScanType::Container),
            "project" => Some(ScanType::Project),
            "webapp" => Some(ScanType::WebApp),
            _ => None,
        }
    }
}

pub struct ScanRequest {
    pub repo_url: Option<String>,
    pub commit_sha: String,
    pub artifact_url: Option<String>,
    pub scan_types: Vec<String>,
    pub blocking_severity: Severity,
    pub environment: String,
}

pub struct ScanOutcome {
    pub passed: bool,
    pub report: VulnerabilityReport,
    pub sbom_url: Option<String>,
    pub signature_url: Option<String>,
}

/// One named scanner capability the orchestrator can dispatch a task to.
pub struct RegisteredAdapter {
    pub scan_type: ScanType,
    pub adapter: Arc<dyn ScannerAdapter>,
}

pub struct ScanOrchestrator {
    adapters: Vec<RegisteredAdapter>,
    sbom_store: Arc<dyn SbomArtifactStore>,
    signer: SbomSigner,
    recorder: Arc<ScanEventRecorder>,
}

impl ScanOrchestrator {
    pub fn new(adapters: Vec<RegisteredAdapter>, sbom_store: Arc<dyn SbomArtifactStore>, signing_key: SigningKey, recorder: Arc<ScanEventRecorder>) -> Self {
        Self {
            adapters,
            sbom_store,
            signer: SbomSigner::new(signing_key),
            recorder,
        }
    }

    /// §4.10: build tasks implied by `scan_types`, fan out, consolidate,
    /// threshold-gate, and on a pass generate + sign an SBOM.
    pub async fn run_security_scan(&self, config: &AegisConfig, request: ScanRequest) -> Result<ScanOutcome> {
        let run_id = format!("{}@{}", request.repo_url.clone().unwrap_or_default(), request.commit_sha);
        self.recorder.record(ScanEvent::ScanRequested(ScanRequestedEvent {
            event_id: Default::default(),
            run_id: run_id.clone(),
            repo_url: request.repo_url.clone(),
            commit_sha: Some(request.commit_sha.clone()),
            artifact_url: request.artifact_url.clone(),
            scan_types: request.scan_types.clone(),
            blocking_severity: request.blocking_severity.to_string(),
            requested_at: Utc::now(),
        }));

        let requested_types: Vec<ScanType> = request.scan_types.iter().filter_map(|s| ScanType::parse(s)).collect();

        let mut tasks = Vec::new();
        for registered in &self.adapters {
            if !requested_types.contains(&registered.scan_type) {
                continue;
            }
            let target = match registered.scan_type {
                ScanType::Container => request.artifact_url.clone(),
                ScanType::Project => request.repo_url.clone(),
                ScanType::WebApp => request.artifact_url.clone().or_else(|| request.repo_url.clone()),
            };
            let Some(target) = target else { continue };
            tasks.push((registered.adapter.clone(), registered.scan_type, target));
        }

        let fanned_out = tasks.into_iter().map(|(adapter, scan_type, target)| {
            tokio::spawn(async move {
                let report = match scan_type {
                    ScanType::Container => adapter.scan_container(&target).await,
                    ScanType::Project => adapter.scan_project(&target).await,
                    ScanType::WebApp => adapter.scan_webapp(&target).await,
                };
                (adapter.name().to_string(), report)
            })
        });

        let mut per_scanner: Vec<(String, VulnerabilityReport)> = Vec::new();
        for handle in fanned_out {
            match handle.await {
                Ok((scanner_name, Ok(report))) => {
                    self.recorder.record(ScanEvent::AdapterCompleted(AdapterCompletedEvent {
                        event_id: Default::default(),
                        run_id: run_id.clone(),
                        scanner_name: scanner_name.clone(),
                        vulnerability_count: report.vulnerabilities().len(),
                        finished_at: Utc::now(),
                    }));
                    per_scanner.push((scanner_name, report));
                }
                Ok((scanner_name, Err(e))) => {
                    warn!(scanner = %scanner_name, error = %e, "scanner adapter failed, omitting from consolidated report");
                    self.recorder.record(ScanEvent::AdapterFailed(AdapterFailedEvent {
                        event_id: Default::default(),
                        run_id: run_id.clone(),
                        scanner_name,
                        reason: e.to_string(),
                        failed_at: Utc::now(),
                    }));
                }
                Err(join_err) => {
                    warn!(error = %join_err, "scanner adapter task panicked, omitting from consolidated report");
                }
            }
        }

        // Scanners serialized by name for tiebreak (§4.10 "Determinism").
        per_scanner.sort_by(|a, b| a.0.cmp(&b.0));

        let target_label = format!("{}@{}", request.repo_url.clone().unwrap_or_default(), request.commit_sha);
        let mut merged = VulnerabilityReport::new("security-coordinator", Utc::now(), target_label);
        for (_, report) in &per_scanner {
            for vuln in report.vulnerabilities() {
                merged.push(vuln.clone());
            }
        }

        self.recorder.record(ScanEvent::ReportConsolidated(ReportConsolidatedEvent {
            event_id: Default::default(),
            run_id: run_id.clone(),
            total_vulnerabilities: merged.vulnerabilities().len(),
            summary: serde_json::to_value(merged.summary()).unwrap_or(serde_json::Value::Null),
            consolidated_at: Utc::now(),
        }));

        let gate_verdict = evaluate_threshold_gate(config, &request.environment, &merged, request.blocking_severity)?;
        self.recorder.record(ScanEvent::GateEvaluated(GateEvaluatedEvent {
            event_id: Default::default(),
            run_id: run_id.clone(),
            passed: gate_verdict.passed,
            violations: gate_verdict.violations.iter().map(|v| format!("{}: {} > {}", v.severity, v.count, v.allowed)).collect(),
            evaluated_at: Utc::now(),
        }));

        if !gate_verdict.passed {
            info!(run_id = %run_id, "threshold gate failed, no SBOM produced");
            return Ok(ScanOutcome {
                passed: false,
                report: merged,
                sbom_url: None,
                signature_url: None,
            });
        }

        let sbom = generate_sbom(&merged);
        let sbom_bytes = serialize_sbom(&sbom)?;
        let sbom_url = self.sbom_store.write_sbom(&request.commit_sha, &sbom_bytes).await?;
        self.recorder.record(ScanEvent::SbomGenerated(SbomGeneratedEvent {
            event_id: Default::default(),
            run_id: run_id.clone(),
            sbom_url: sbom_url.clone(),
            generated_at: Utc::now(),
        }));

        let signature = self.signer.sign(&sbom_bytes);
        let signature_url = self.sbom_store.write_signature(&request.commit_sha, &signature).await?;
        self.recorder.record(ScanEvent::SbomSigned(SbomSignedEvent {
            event_id: Default::default(),
            run_id,
            signature_url: signature_url.clone(),
            signed_at: Utc::now(),
        }));

        Ok(ScanOutcome {
            passed: true,
            report: merged,
            sbom_url: Some(sbom_url),
            signature_url: Some(signature_url),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Vulnerability;
    use async_trait::async_trait;

    struct StubAdapter {
        label: &'static str,
        severity: Option<Severity>,
        fail: bool,
    }

    #[async_trait]
    impl ScannerAdapter for StubAdapter {
        fn name(&self) -> &str {
            self.label
        }

        async fn scan_project(&self, repo_url: &str) -> Result<VulnerabilityReport> {
            if self.fail {
                return Err(AegisError::Transient("boom".to_string()));
            }
            let mut report = VulnerabilityReport::new(self.name(), Utc::now(), repo_url);
            if let Some(severity) = self.severity {
                report.push(Vulnerability {
                    id: "CVE-TEST".to_string(),
                    title: "t".to_string(),
                    description: "d".to_string(),
                    severity,
                    cvss_score: 5.0,
                    affected_component: "pkg@1.0.0".to_string(),
                    fix_version: None,
                    references: vec![],
                });
            }
            Ok(report)
        }

        async fn scan_container(&self, _image_ref: &str) -> Result<VulnerabilityReport> {
            Err(AegisError::Validation("not supported".to_string()))
        }
    }

    fn orchestrator_with(adapters: Vec<RegisteredAdapter>) -> (ScanOrchestrator, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(aegis_state::sbom_store::FsSbomStore::new(dir.path()));
        let key = SigningKey::generate(&mut rand::rngs::OsRng);
        let recorder = Arc::new(ScanEventRecorder::new());
        (ScanOrchestrator::new(adapters, store, key, recorder), dir)
    }

    fn request(scan_types: Vec<&str>, blocking_severity: Severity) -> ScanRequest {
        ScanRequest {
            repo_url: Some("https://example.com/repo".to_string()),
            commit_sha: "abc123".to_string(),
            artifact_url: None,
            scan_types: scan_types.into_iter().map(str::to_string).collect(),
            blocking_severity,
            environment: "development".to_string(),
        }
    }

    #[tokio::test]
    async fn empty_scan_types_trivially_passes() {
        let (orchestrator, _dir) = orchestrator_with(vec![]);
        let config = AegisConfig::default();
        let outcome = orchestrator.run_security_scan(&config, request(vec![], Severity::High)).await.unwrap();
        assert!(outcome.passed);
        assert_eq!(outcome.report.vulnerabilities().len(), 0);
        assert!(outcome.sbom_url.is_some());
    }

    #[tokio::test]
    async fn failed_adapter_is_omitted_not_fatal() {
        let adapters = vec![
            RegisteredAdapter {
                scan_type: ScanType::Project,
                adapter: Arc::new(StubAdapter { label: "failing", severity: None, fail: true }),
            },
            RegisteredAdapter {
                scan_type: ScanType::Project,
                adapter: Arc::new(StubAdapter { label: "critical-finder", severity: Some(Severity::Critical), fail: false }),
            },
            RegisteredAdapter {
                scan_type: ScanType::Project,
                adapter: Arc::new(StubAdapter { label: "medium-finder", severity: Some(Severity::Medium), fail: false }),
            },
        ];
        let (orchestrator, _dir) = orchestrator_with(adapters);
        let config = AegisConfig::default();
        let outcome = orchestrator.run_security_scan(&config, request(vec!["project"], Severity::High)).await.unwrap();
        assert_eq!(outcome.report.vulnerabilities().len(), 2);
        assert_eq!(outcome.report.summary()["critical"], 1);
        assert_eq!(outcome.report.summary()["medium"], 1);
        assert!(!outcome.passed);
        assert!(outcome.sbom_url.is_none());
    }

    #[tokio::test]
    async fn passing_gate_produces_sbom_and_signature() {
        let adapters = vec![RegisteredAdapter {
            scan_type: ScanType::Project,
            adapter: Arc::new(StubAdapter { label: "low-finder", severity: Some(Severity::Low), fail: false }),
        }];
        let (orchestrator, _dir) = orchestrator_with(adapters);
        let config = AegisConfig::default();
        let outcome = orchestrator.run_security_scan(&config, request(vec!["project"], Severity::High)).await.unwrap();
        assert!(outcome.passed);
        assert!(outcome.sbom_url.is_some());
        assert!(outcome.signature_url.is_some());
    }
}
