//! Container scanner adapter modeled on the original `TrivyScanner`
//! (`services/trivy_scanner.py`): shells out to `trivy image --format
//! json <ref>`, parsing `Results[].Vulnerabilities[]` into the common
//! [`Vulnerability`] schema. Reuses the teacher's
//! `patch_runner::CommandExecutor` abstraction for the actual subprocess
//! execution — the same bounded, kill-on-timeout shell-out already used
//! to apply patches, grounded here a second time for scanner invocation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use aegis_core::domain::Severity;
use aegis_core::error::{AegisError, Result};
use aegis_core::patch_runner::CommandExecutor;

use super::{AdapterTimeout, ScannerAdapter};
use crate::domain::{Vulnerability, VulnerabilityReport};

#[derive(Debug, Deserialize)]
struct TrivyResults {
    #[serde(rename = "Results", default)]
    results: Vec<TrivyResult>,
}

#[derive(Debug, Deserialize)]
struct TrivyResult {
    #[serde(rename = "Target", default)]
    target: String,
    #[serde(rename = "Vulnerabilities", default)]
    vulnerabilities: Vec<TrivyVulnerability>,
}

#[derive(Debug, Deserialize)]
struct TrivyVulnerability {
    #[serde(rename = "VulnerabilityID")]
    vulnerability_id: String,
    #[serde(rename = "Title", default)]
    title: Option<String>,
    #[serde(rename = "Description", default)]
    description: Option<String>,
    #[serde(rename = "Severity", default)]
    severity: Option<String>,
    #[serde(rename = "CVSS", default)]
    cvss: Option<serde_json::Value>,
    #[serde(rename = "PkgName")]
    pkg_name: String,
    #[serde(rename = "InstalledVersion", default)]
    installed_version: Option<String>,
    #[serde(rename = "FixedVersion", default)]
    fixed_version: Option<String>,
    #[serde(rename = "References", default)]
    references: Vec<String>,
}

fn severity_from_trivy(label: Option<&str>) -> Severity {
    match label.unwrap_or("UNKNOWN").to_ascii_uppercase().as_str() {
        "CRITICAL" => Severity::Critical,
        "HIGH" => Severity::High,
        "MEDIUM" => Severity::Medium,
        "LOW" => Severity::Low,
        _ => Severity::Info,
    }
}

fn cvss_v3_score(cvss: &Option<serde_json::Value>) -> f64 {
    cvss.as_ref()
        .and_then(|v| v.get("nvd"))
        .and_then(|v| v.get("V3Score"))
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0)
}

fn parse_trivy_json(target_label: &str, raw: &str) -> Result<Vec<Vulnerability>> {
    let parsed: TrivyResults = serde_json::from_str(raw).map_err(|e| AegisError::Data(format!("malformed trivy output: {e}")))?;
    let mut vulnerabilities = Vec::new();
    for result in parsed.results {
        let target = if result.target.is_empty() { target_label.to_string() } else { result.target };
        for v in result.vulnerabilities {
            vulnerabilities.push(Vulnerability {
                id: v.vulnerability_id,
                title: v.title.unwrap_or_else(|| "No title".to_string()),
                description: v.description.unwrap_or_else(|| "No description".to_string()),
                severity: severity_from_trivy(v.severity.as_deref()),
                cvss_score: cvss_v3_score(&v.cvss),
                affected_component: format!("{target}:{}@{}", v.pkg_name, v.installed_version.unwrap_or_else(|| "unknown".to_string())),
                fix_version: v.fixed_version,
                references: v.references,
            });
        }
    }
    Ok(vulnerabilities)
}

pub struct TrivyContainerAdapter {
    executor: Arc<dyn CommandExecutor>,
    timeout: AdapterTimeout,
    severities: Vec<&'static str>,
}

impl TrivyContainerAdapter {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            executor,
            timeout: AdapterTimeout::default(),
            severities: vec!["CRITICAL", "HIGH", "MEDIUM", "LOW", "UNKNOWN"],
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = AdapterTimeout(timeout);
        self
    }

    async fn run_trivy(&self, mode: &str, target: &str) -> Result<String> {
        let command = format!("trivy {mode} --format json --severity {} {target}", self.severities.join(","));
        let outcome = self.executor.run(&command, self.timeout.0).await?;
        if !outcome.success {
            return Err(AegisError::Transient(format!("trivy {mode} scan failed: {}", outcome.stderr)));
        }
        Ok(outcome.stdout)
    }
}

#[async_trait]
impl ScannerAdapter for TrivyContainerAdapter {
    fn name(&self) -> &str {
        "trivy"
    }

    async fn scan_container(&self, image_ref: &str) -> Result<VulnerabilityReport> {
        let stdout = self.run_trivy("image", image_ref).await?;
        let vulnerabilities = parse_trivy_json(image_ref, &stdout)?;
        Ok(VulnerabilityReport::new(self.name(), Utc::now(), image_ref).with_vulnerabilities(vulnerabilities))
    }

    async fn scan_project(&self, repo_url: &str) -> Result<VulnerabilityReport> {
        let stdout = self.run_trivy("fs", repo_url).await?;
        let vulnerabilities = parse_trivy_json(repo_url, &stdout)?;
        Ok(VulnerabilityReport::new(self.name(), Utc::now(), repo_url).with_vulnerabilities(vulnerabilities))
    }
}
