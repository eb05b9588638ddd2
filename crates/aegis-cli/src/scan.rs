//! `aegis scan`: drives the Security Scan Orchestrator (C9-C10) against
//! one repo/commit using the dependency-audit adapter (the only adapter
//! that needs no network reachability assumptions beyond a locally
//! installed `npm`/`pip-audit`), gates the result, and emits a signed
//! SBOM on pass.

use std::path::PathBuf;

use anyhow::{bail, Result};
use ed25519_dalek::SigningKey;

use aegis_core::config::AegisConfig;
use aegis_core::domain::Severity;
use aegis_scan::adapters::fs_scanner::{DependencyAuditAdapter, Ecosystem};
use aegis_scan::orchestrator::{RegisteredAdapter, ScanOrchestrator, ScanRequest, ScanType};
use aegis_scan_domain::ScanEventRecorder;
use aegis_state::sbom_store::FsSbomStore;

pub struct ScanArgs {
    pub repo_url: String,
    pub commit_sha: String,
    pub scan_types: String,
    pub blocking_severity: String,
    pub environment: String,
    pub artifact_storage_path: PathBuf,
}

fn parse_severity(raw: &str) -> Result<Severity> {
    Ok(match raw.to_lowercase().as_str() {
        "critical" => Severity::Critical,
        "high" => Severity::High,
        "medium" => Severity::Medium,
        "low" => Severity::Low,
        "info" => Severity::Info,
        other => bail!("unknown severity: {other}"),
    })
}

pub async fn run(args: ScanArgs) -> Result<()> {
    let mut config = AegisConfig::default();
    config.artifact_storage_path = args.artifact_storage_path.to_string_lossy().into_owned();

    let executor = crate::shell_executor();
    let adapters = vec![
        RegisteredAdapter {
            scan_type: ScanType::Project,
            adapter: std::sync::Arc::new(DependencyAuditAdapter::new(executor.clone(), Ecosystem::Npm)),
        },
        RegisteredAdapter {
            scan_type: ScanType::Project,
            adapter: std::sync::Arc::new(DependencyAuditAdapter::new(executor, Ecosystem::Pip)),
        },
    ];

    let sbom_store = std::sync::Arc::new(FsSbomStore::new(config.artifact_storage_path.clone()));
    let recorder = std::sync::Arc::new(ScanEventRecorder::new());
    // A real deployment injects the signing key from a secret store; this
    // demo generates an ephemeral one per run, same as `SbomSigner::generate`.
    let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);

    let orchestrator = ScanOrchestrator::new(adapters, sbom_store, signing_key, recorder);

    let request = ScanRequest {
        repo_url: Some(args.repo_url),
        commit_sha: args.commit_sha,
        artifact_url: None,
        scan_types: args.scan_types.split(',').map(|s| s.trim().to_string()).collect(),
        blocking_severity: parse_severity(&args.blocking_severity)?,
        environment: args.environment,
    };

    let outcome = orchestrator.run_security_scan(&config, request).await?;

    println!("== consolidated report ==");
    println!("{}", serde_json::to_string_pretty(&outcome.report)?);
    println!("\npassed={}", outcome.passed);
    if let Some(sbom_url) = &outcome.sbom_url {
        println!("sbom_url={sbom_url}");
    }
    if let Some(signature_url) = &outcome.signature_url {
        println!("signature_url={signature_url}");
    }

    Ok(())
}
