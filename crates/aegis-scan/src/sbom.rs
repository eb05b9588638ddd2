//! SBOM generation and detached signing (§4.10 step 5, §6 "SBOM").
//!
//! The component-graph document is hand-rolled `serde_json` rather than a
//! dependency on a CycloneDX crate — none of the retrieval pack's example
//! repos carries one, and the original Python `security_coordinator.py`'s
//! `cyclonedx`/`sigstore` usage is translated into the shape it produces
//! (one component per distinct `affected_component`, external references
//! linking vulnerabilities), not into a binding on those exact libraries.
//! Signing is grounded on `dropbox-dTOOL`'s `dashflow-registry::signature`
//! module, which is the one real Ed25519 signing pattern in the pack.

use std::collections::BTreeMap;

use ed25519_dalek::{Signature as Ed25519Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use aegis_core::error::{AegisError, Result};

use crate::domain::VulnerabilityReport;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalReference {
    pub reference_type: String,
    pub url: String,
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SbomComponent {
    pub name: String,
    pub version: String,
    pub external_references: Vec<ExternalReference>,
}

/// A standard component-graph document (§6): one component per distinct
/// `affected_component`, cross-linked to the vulnerabilities that name it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sbom {
    pub bom_format: String,
    pub spec_version: String,
    pub serial_number: String,
    pub target: String,
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub components: Vec<SbomComponent>,
}

/// Builds an [`Sbom`] from a consolidated [`VulnerabilityReport`]. One
/// component per distinct `name@version`; each vulnerability referencing
/// that component becomes an `issue-tracker` external reference.
pub fn generate_sbom(report: &VulnerabilityReport) -> Sbom {
    let mut by_component: BTreeMap<(String, String), Vec<ExternalReference>> = BTreeMap::new();
    for vuln in report.vulnerabilities() {
        let key = (vuln.component_name().to_string(), vuln.component_version().to_string());
        by_component.entry(key).or_default().push(ExternalReference {
            reference_type: "issue-tracker".to_string(),
            url: vuln.references.first().cloned().unwrap_or_default(),
            comment: format!("{}: {}", vuln.severity, vuln.title),
        });
    }

    let components = by_component
        .into_iter()
        .map(|((name, version), external_references)| SbomComponent {
            name,
            version,
            external_references,
        })
        .collect();

    Sbom {
        bom_format: "AegisBOM".to_string(),
        spec_version: "1.0".to_string(),
        serial_number: format!("urn:uuid:{}", uuid::Uuid::new_v4()),
        target: report.target.clone(),
        generated_at: report.scan_timestamp,
        components,
    }
}

pub fn serialize_sbom(sbom: &Sbom) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(sbom)?)
}

/// Wraps an injected Ed25519 signing key (§6 "the signing key source is
/// injected"); never generates its own key outside of tests.
pub struct SbomSigner {
    signing_key: SigningKey,
}

impl SbomSigner {
    pub fn new(signing_key: SigningKey) -> Self {
        Self { signing_key }
    }

    #[cfg(any(test, feature = "test-util"))]
    pub fn generate() -> Self {
        Self::new(SigningKey::generate(&mut rand::rngs::OsRng))
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Produces a detached signature over the raw SBOM bytes.
    pub fn sign(&self, sbom_bytes: &[u8]) -> Vec<u8> {
        let signature: Ed25519Signature = self.signing_key.sign(sbom_bytes);
        signature.to_bytes().to_vec()
    }
}

pub fn verify_signature(verifying_key: &VerifyingKey, sbom_bytes: &[u8], signature_bytes: &[u8]) -> Result<()> {
    let signature = Ed25519Signature::from_slice(signature_bytes).map_err(|e| AegisError::Validation(format!("malformed signature: {e}")))?;
    verifying_key
        .verify(sbom_bytes, &signature)
        .map_err(|e| AegisError::Validation(format!("signature verification failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Severity, Vulnerability, VulnerabilityReport};
    use chrono::Utc;

    fn sample_report() -> VulnerabilityReport {
        VulnerabilityReport::new("security-coordinator", Utc::now(), "repo@abc123").with_vulnerabilities(vec![Vulnerability {
            id: "CVE-2024-0001".to_string(),
            title: "vuln".to_string(),
            description: "desc".to_string(),
            severity: Severity::Critical,
            cvss_score: 9.1,
            affected_component: "requests@2.0.0".to_string(),
            fix_version: Some("2.1.0".to_string()),
            references: vec!["https://example.com/cve".to_string()],
        }])
    }

    #[test]
    fn one_component_per_distinct_affected_component() {
        let sbom = generate_sbom(&sample_report());
        assert_eq!(sbom.components.len(), 1);
        assert_eq!(sbom.components[0].name, "requests");
        assert_eq!(sbom.components[0].version, "2.0.0");
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let signer = SbomSigner::generate();
        let sbom = generate_sbom(&sample_report());
        let bytes = serialize_sbom(&sbom).unwrap();
        let signature = signer.sign(&bytes);
        verify_signature(&signer.verifying_key(), &bytes, &signature).unwrap();
    }

    #[test]
    fn tampered_bytes_fail_verification() {
        let signer = SbomSigner::generate();
        let sbom = generate_sbom(&sample_report());
        let bytes = serialize_sbom(&sbom).unwrap();
        let signature = signer.sign(&bytes);
        let err = verify_signature(&signer.verifying_key(), b"tampered", &signature).unwrap_err();
        assert!(matches!(err, AegisError::Validation(_)));
    }
}
