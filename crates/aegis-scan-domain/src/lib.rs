//! Scan event-sourcing schema: append-only `ScanEvent`s, a recorder, and a
//! derived `ScanLedgerEntry`, mirroring the teacher's CI event-sourcing
//! split (`aivcs-ci-domain`) applied to a security-scan run instead of a
//! CI run.

pub mod error;
pub mod events;
pub mod recorder;

pub use error::{Result, ScanDomainError};
pub use events::{
    AdapterCompletedEvent, AdapterFailedEvent, GateEvaluatedEvent, ReportConsolidatedEvent,
    ScanEvent, ScanEventId, ScanEventRecord, ScanLedgerEntry, ScanRequestedEvent, SbomGeneratedEvent,
    SbomSignedEvent,
};
pub use recorder::ScanEventRecorder;
