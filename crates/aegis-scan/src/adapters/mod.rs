//! Scanner Adapters (C9): a uniform capability set over heterogeneous
//! scanners. Grounded on the teacher's small-capability-set design note
//! (§9 "Scanner has three methods") — no deep class hierarchy, just an
//! `async_trait` with default "not supported" bodies so an adapter that
//! only implements one capability doesn't have to stub the others with a
//! panic.

pub mod fs_scanner;
pub mod trivy;
pub mod webapp;

use std::time::Duration;

use async_trait::async_trait;

use aegis_core::error::{AegisError, Result};

use crate::domain::VulnerabilityReport;

fn not_supported(scanner: &str, capability: &str) -> AegisError {
    AegisError::Validation(format!("{scanner} does not support {capability}"))
}

/// Per-adapter timeout (§4.9 "run with a configurable timeout").
#[derive(Debug, Clone, Copy)]
pub struct AdapterTimeout(pub Duration);

impl Default for AdapterTimeout {
    fn default() -> Self {
        AdapterTimeout(Duration::from_secs(120))
    }
}

#[async_trait]
pub trait ScannerAdapter: Send + Sync {
    /// Preserved in every emitted report's `scanner_name` (§4.9).
    fn name(&self) -> &str;

    async fn scan_container(&self, _image_ref: &str) -> Result<VulnerabilityReport> {
        Err(not_supported(self.name(), "scan_container"))
    }

    async fn scan_project(&self, _repo_url: &str) -> Result<VulnerabilityReport> {
        Err(not_supported(self.name(), "scan_project"))
    }

    async fn scan_webapp(&self, _url: &str) -> Result<VulnerabilityReport> {
        Err(not_supported(self.name(), "scan_webapp"))
    }

    /// No-op for adapters that don't maintain a session (default).
    async fn connect(&self) -> Result<()> {
        Ok(())
    }
}
