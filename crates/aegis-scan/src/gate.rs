//! Threshold gate (§4.10 step 4): compares a consolidated
//! [`VulnerabilityReport`]'s per-severity counts against the environment's
//! allowance table from [`AegisConfig`]. Grounded on the teacher's
//! `aivcs-core::ci_gate` rule-set/verdict shape (`CIGateRuleSet`,
//! `CIGateVerdict`, `evaluate_ci_gate`), narrowed from an arbitrary rule
//! list to the one threshold-table rule this gate actually needs.

use std::collections::BTreeMap;

use aegis_core::config::AegisConfig;
use aegis_core::domain::Severity;
use aegis_core::error::{AegisError, Result};

use crate::domain::VulnerabilityReport;

const SEVERITY_ORDER: [Severity; 5] = [Severity::Info, Severity::Low, Severity::Medium, Severity::High, Severity::Critical];

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdViolation {
    pub severity: Severity,
    pub count: u32,
    pub allowed: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GateVerdict {
    pub passed: bool,
    pub violations: Vec<ThresholdViolation>,
}

impl GateVerdict {
    fn pass() -> Self {
        Self { passed: true, violations: Vec::new() }
    }

    fn fail(violations: Vec<ThresholdViolation>) -> Self {
        Self { passed: false, violations }
    }
}

fn severity_count(summary: &BTreeMap<String, u32>, severity: Severity) -> u32 {
    summary.get(&severity.to_string()).copied().unwrap_or(0)
}

/// Evaluates `report` against `config.vulnerability_thresholds[environment]`.
/// A severity strictly exceeding its allowance fails the gate only if that
/// severity is at or above `blocking_severity` (§4.10 step 4); an
/// over-allowance at a severity below the blocking floor is recorded nowhere
/// and does not fail the gate, matching the original's "advisory only" tiers
/// below the configured floor.
pub fn evaluate_threshold_gate(config: &AegisConfig, environment: &str, report: &VulnerabilityReport, blocking_severity: Severity) -> Result<GateVerdict> {
    let allowances = config
        .vulnerability_thresholds
        .get(environment)
        .ok_or_else(|| AegisError::Validation(format!("unknown environment '{environment}'")))?;

    let mut violations = Vec::new();
    for severity in SEVERITY_ORDER {
        if severity < blocking_severity {
            continue;
        }
        let allowed = allowances.get(&severity.to_string()).copied().unwrap_or(0);
        let count = severity_count(report.summary(), severity);
        if count > allowed {
            violations.push(ThresholdViolation { severity, count, allowed });
        }
    }

    if violations.is_empty() {
        Ok(GateVerdict::pass())
    } else {
        Ok(GateVerdict::fail(violations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Vulnerability;
    use chrono::Utc;

    fn vuln(severity: Severity) -> Vulnerability {
        Vulnerability {
            id: "CVE-2024-0001".to_string(),
            title: "t".to_string(),
            description: "d".to_string(),
            severity,
            cvss_score: 5.0,
            affected_component: "pkg@1.0.0".to_string(),
            fix_version: None,
            references: vec![],
        }
    }

    #[test]
    fn empty_report_trivially_passes() {
        let config = AegisConfig::default();
        let report = VulnerabilityReport::new("security-coordinator", Utc::now(), "target");
        let verdict = evaluate_threshold_gate(&config, "development", &report, Severity::High).unwrap();
        assert!(verdict.passed);
    }

    #[test]
    fn over_allowance_at_or_above_blocking_severity_fails() {
        let config = AegisConfig::default();
        let report = VulnerabilityReport::new("security-coordinator", Utc::now(), "target")
            .with_vulnerabilities(vec![vuln(Severity::Critical), vuln(Severity::Medium), vuln(Severity::Medium)]);
        let verdict = evaluate_threshold_gate(&config, "development", &report, Severity::High).unwrap();
        assert!(!verdict.passed);
        assert_eq!(verdict.violations.len(), 1);
        assert_eq!(verdict.violations[0].severity, Severity::Critical);
    }

    #[test]
    fn over_allowance_below_blocking_severity_is_ignored() {
        let config = AegisConfig::default();
        let report = VulnerabilityReport::new("security-coordinator", Utc::now(), "target")
            .with_vulnerabilities(vec![vuln(Severity::Medium); 50]);
        let verdict = evaluate_threshold_gate(&config, "development", &report, Severity::High).unwrap();
        assert!(verdict.passed);
    }

    #[test]
    fn unknown_environment_is_rejected() {
        let config = AegisConfig::default();
        let report = VulnerabilityReport::new("security-coordinator", Utc::now(), "target");
        let err = evaluate_threshold_gate(&config, "canary", &report, Severity::High).unwrap_err();
        assert!(matches!(err, AegisError::Validation(_)));
    }

    #[test]
    fn matches_spec_worked_example() {
        let config = AegisConfig::default();
        let report = VulnerabilityReport::new("security-coordinator", Utc::now(), "target")
            .with_vulnerabilities(vec![vuln(Severity::Critical), vuln(Severity::Medium), vuln(Severity::Medium)]);
        assert_eq!(report.summary()["critical"], 1);
        assert_eq!(report.summary()["medium"], 2);
        let verdict = evaluate_threshold_gate(&config, "development", &report, Severity::High).unwrap();
        assert!(!verdict.passed);
    }
}
