//! Aegis core: the Self-Healing Debugger subsystem (C1-C8) plus the shared
//! contracts (C12) every other workspace crate builds on.
//!
//! Module-to-component map:
//! - [`pattern_registry`] — C1 Pattern Registry
//! - [`feature_extractor`] — C2 Feature Extractor
//! - [`ml_classifier`] — C3 ML Classifier
//! - `aegis_llm` (sibling crate) — C4 LLM Client
//! - [`log_analyzer`] — C5 Log Analyzer
//! - [`patch_synthesizer`] — C6 Patch Synthesizer
//! - [`patch_runner`] — C7 Patch Runner
//! - [`debug_session`] — C8 Debug Session Core
//! - [`domain`], [`error`], [`clock`], [`ids`], [`value`], [`health`] — C12 Shared Contracts

pub mod clock;
pub mod config;
pub mod debug_session;
pub mod domain;
pub mod error;
pub mod feature_extractor;
pub mod health;
pub mod ids;
pub mod log_analyzer;
pub mod ml_classifier;
pub mod obs;
pub mod patch_runner;
pub mod patch_synthesizer;
pub mod pattern_registry;
pub mod sandbox;
pub mod telemetry;
pub mod value;

pub use error::{AegisError, Result};
