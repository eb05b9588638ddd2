//! Security Scan Orchestrator (§4.9-§4.10): Scanner Adapters over a
//! common capability trait, a threshold gate against configured policy,
//! and SBOM generation plus detached signing, with event-sourced
//! provenance via `aegis-scan-domain`.

pub mod adapters;
pub mod domain;
pub mod gate;
pub mod orchestrator;
pub mod sbom;

pub use adapters::ScannerAdapter;
pub use domain::{Vulnerability, VulnerabilityReport};
pub use gate::{evaluate_threshold_gate, GateVerdict, ThresholdViolation};
pub use orchestrator::{RegisteredAdapter, ScanOrchestrator, ScanOutcome, ScanRequest, ScanType};
pub use sbom::{generate_sbom, serialize_sbom, verify_signature, Sbom, SbomComponent, SbomSigner};
