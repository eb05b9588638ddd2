//! Black-box lifecycle test over `ScanOrchestrator`'s public API (§4.9,
//! §4.10, §8 scenario 3), using a stub adapter defined only in terms of
//! the public `ScannerAdapter` trait — no access to crate internals.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use ed25519_dalek::SigningKey;

use aegis_core::config::AegisConfig;
use aegis_core::domain::Severity;
use aegis_core::error::{AegisError, Result};
use aegis_scan::adapters::ScannerAdapter;
use aegis_scan::domain::{Vulnerability, VulnerabilityReport};
use aegis_scan::orchestrator::{RegisteredAdapter, ScanOrchestrator, ScanRequest, ScanType};
use aegis_scan_domain::ScanEventRecorder;
use aegis_state::sbom_store::FsSbomStore;

struct FindingAdapter {
    label: &'static str,
    severity: Severity,
}

#[async_trait]
impl ScannerAdapter for FindingAdapter {
    fn name(&self) -> &str {
        self.label
    }

    async fn scan_project(&self, repo_url: &str) -> Result<VulnerabilityReport> {
        let mut report = VulnerabilityReport::new(self.label, Utc::now(), repo_url);
        report.push(Vulnerability {
            id: format!("CVE-{}", self.label),
            title: "dependency with a known vulnerability".to_string(),
            description: "found by a scanner adapter".to_string(),
            severity: self.severity,
            cvss_score: 7.5,
            affected_component: "left-pad@1.0.0".to_string(),
            fix_version: Some("1.0.1".to_string()),
            references: vec![],
        });
        Ok(report)
    }
}

struct UnreachableAdapter;

#[async_trait]
impl ScannerAdapter for UnreachableAdapter {
    fn name(&self) -> &str {
        "network-scanner"
    }

    async fn scan_webapp(&self, _url: &str) -> Result<VulnerabilityReport> {
        Err(AegisError::Transient("connection refused".to_string()))
    }
}

fn orchestrator(adapters: Vec<RegisteredAdapter>, storage_dir: &std::path::Path) -> ScanOrchestrator {
    let store = Arc::new(FsSbomStore::new(storage_dir));
    let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
    let recorder = Arc::new(ScanEventRecorder::new());
    ScanOrchestrator::new(adapters, store, signing_key, recorder)
}

#[tokio::test]
async fn a_failing_adapter_is_omitted_while_the_rest_of_the_scan_still_completes() {
    let dir = tempfile::tempdir().unwrap();
    let adapters = vec![
        RegisteredAdapter {
            scan_type: ScanType::Project,
            adapter: Arc::new(FindingAdapter { label: "critical-finder", severity: Severity::Critical }),
        },
        RegisteredAdapter {
            scan_type: ScanType::WebApp,
            adapter: Arc::new(UnreachableAdapter),
        },
    ];
    let orchestrator = orchestrator(adapters, dir.path());
    let config = AegisConfig::default();

    let request = ScanRequest {
        repo_url: Some("https://example.com/acme/widget".to_string()),
        commit_sha: "deadbeef".to_string(),
        artifact_url: Some("https://example.com/acme/widget/app".to_string()),
        scan_types: vec!["project".to_string(), "webapp".to_string()],
        blocking_severity: Severity::High,
        environment: "production".to_string(),
    };

    let outcome = orchestrator.run_security_scan(&config, request).await.unwrap();

    assert_eq!(outcome.report.vulnerabilities().len(), 1);
    assert_eq!(outcome.report.summary()["critical"], 1);
    // production's blocking_severity=high policy (§6 vulnerability_thresholds) rejects any critical finding.
    assert!(!outcome.passed);
    assert!(outcome.sbom_url.is_none());
    assert!(outcome.signature_url.is_none());
}

#[tokio::test]
async fn a_clean_scan_in_a_permissive_environment_yields_a_signed_sbom() {
    let dir = tempfile::tempdir().unwrap();
    let adapters = vec![RegisteredAdapter {
        scan_type: ScanType::Project,
        adapter: Arc::new(FindingAdapter { label: "low-finder", severity: Severity::Low }),
    }];
    let orchestrator = orchestrator(adapters, dir.path());
    let config = AegisConfig::default();

    let request = ScanRequest {
        repo_url: Some("https://example.com/acme/widget".to_string()),
        commit_sha: "cafef00d".to_string(),
        artifact_url: None,
        scan_types: vec!["project".to_string()],
        blocking_severity: Severity::Critical,
        environment: "development".to_string(),
    };

    let outcome = orchestrator.run_security_scan(&config, request).await.unwrap();

    assert!(outcome.passed);
    let sbom_url = outcome.sbom_url.expect("a passing gate must produce an sbom");
    let signature_url = outcome.signature_url.expect("a passing gate must produce a detached signature");
    assert!(sbom_url.contains("cafef00d"));
    assert!(signature_url.contains("cafef00d"));
}

#[tokio::test]
async fn requesting_no_scan_types_is_a_vacuous_pass() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(vec![], dir.path());
    let config = AegisConfig::default();

    let request = ScanRequest {
        repo_url: Some("https://example.com/acme/widget".to_string()),
        commit_sha: "0000000".to_string(),
        artifact_url: None,
        scan_types: vec![],
        blocking_severity: Severity::High,
        environment: "production".to_string(),
    };

    let outcome = orchestrator.run_security_scan(&config, request).await.unwrap();
    assert!(outcome.passed);
    assert_eq!(outcome.report.vulnerabilities().len(), 0);
}
