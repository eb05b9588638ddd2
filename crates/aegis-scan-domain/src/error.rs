//! Error taxonomy for the scan event-sourcing layer, grounded on the
//! teacher's `aivcs-ci-domain::error` shape.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanDomainError {
    #[error("unknown scan run: {0}")]
    UnknownRun(String),

    #[error("event recorder error: {0}")]
    Recorder(String),
}

pub type Result<T> = std::result::Result<T, ScanDomainError>;
