//! Persistence traits for the Aegis platform: the historical errors store,
//! the applied-patches registry, and the ML model store, plus in-memory
//! reference implementations and filesystem-backed SBOM artifact storage.
//!
//! These traits are intentionally domain-agnostic (payloads are
//! `serde_json::Value`) so this crate has no dependency on `aegis-core`;
//! `aegis-core` depends on this crate instead, mirroring the teacher's
//! `oxidized-state` split from `aivcs-core`.

pub mod digest;
pub mod error;
pub mod historical_store;
pub mod memory;
pub mod model_store;
pub mod patch_registry;
pub mod sbom_store;
#[cfg(feature = "surreal")]
pub mod surreal_store;

pub use digest::ContentDigest;
pub use error::{StorageError, StorageResult};
pub use historical_store::{ErrorQuery, ErrorRecord, HistoricalErrorStore};
pub use memory::{MemoryAppliedPatchRegistry, MemoryHistoricalErrorStore, MemoryModelStore};
pub use model_store::{ModelKey, ModelStore, TrainingHistoryEntry};
pub use patch_registry::{AppliedPatchRecord, AppliedPatchRegistry};
pub use sbom_store::{FsSbomStore, SbomArtifactStore};
#[cfg(feature = "surreal")]
pub use surreal_store::SurrealHistoricalErrorStore;
