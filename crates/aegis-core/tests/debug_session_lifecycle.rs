//! Black-box lifecycle test over `DebugSessionCore`'s public API (§4.8,
//! §8 end-to-end scenarios 1, 2, and 6), exercised the way an external
//! caller (the CLI, or a future wire adapter) would — no access to crate
//! internals.

use std::sync::Arc;

use aegis_core::clock::SystemClock;
use aegis_core::config::AegisConfig;
use aegis_core::debug_session::{DebugSessionCore, ExportFormat};
use aegis_core::domain::{Category, SessionStatus, Severity, Stage};
use aegis_core::error::AegisError;
use aegis_core::log_analyzer::LogAnalyzer;
use aegis_core::patch_runner::PatchRunner;
use aegis_llm::{LlmClient, StubLlmClient};
use aegis_state::{MemoryAppliedPatchRegistry, MemoryHistoricalErrorStore, MemoryModelStore};

fn session() -> DebugSessionCore {
    let clock = Arc::new(SystemClock);
    let config = AegisConfig::default();
    let historical_store = Arc::new(MemoryHistoricalErrorStore::new());
    let model_store = Arc::new(MemoryModelStore::new());
    let applied_patches = Arc::new(MemoryAppliedPatchRegistry::new());
    let llm: Arc<dyn LlmClient> = Arc::new(StubLlmClient { response: "error: nothing further found".to_string() });
    let log_analyzer = Arc::new(LogAnalyzer::new(clock.clone(), historical_store.clone(), Some(llm.clone()), config.clone()));
    let patch_runner = Arc::new(PatchRunner::new(applied_patches, Arc::new(aegis_core::patch_runner::ShellExecutor)));
    DebugSessionCore::new("pipeline-e2e", clock, historical_store, model_store, log_analyzer, patch_runner, Some(llm), config)
}

#[tokio::test]
async fn dependency_error_gets_a_reversible_patch_with_rollback() {
    let session = session();

    let errors = session.analyze_error("ModuleNotFoundError: No module named 'requests'").await.unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].category, Category::Dependency);
    assert_eq!(errors[0].severity, Severity::High);
    assert_eq!(errors[0].stage, Stage::Build);

    let patch = session.generate_patch(&errors[0].error_id).await.unwrap();
    assert!(patch.is_reversible);
    assert!(patch.rollback_script.as_deref().unwrap_or("").to_lowercase().contains("uninstall"));
}

#[tokio::test]
async fn permission_error_patch_restores_mode_644_on_rollback() {
    let session = session();

    let errors = session.analyze_error("EACCES: permission denied, access '/var/log/app.log'").await.unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].category, Category::Permission);

    let patch = session.generate_patch(&errors[0].error_id).await.unwrap();
    let rollback = patch.rollback_script.expect("permission patch must be reversible");
    assert!(rollback.contains("/var/log/app.log"));
    assert!(rollback.contains("644"));
}

#[tokio::test]
async fn unknown_error_id_errors_without_aborting_the_session() {
    let session = session();

    let err = session.generate_patch("err-does-not-exist").await.unwrap_err();
    assert!(matches!(err, AegisError::NotFound(_)));

    // the session survives the failed command and still accepts `exit`.
    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.status, SessionStatus::Active);
    session.exit().await.unwrap();
    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.status, SessionStatus::Completed);
}

#[tokio::test]
async fn completed_session_rejects_further_commands() {
    let session = session();
    session.exit().await.unwrap();

    let err = session.analyze_error("anything").await.unwrap_err();
    assert!(matches!(err, AegisError::Validation(_)));
}

#[tokio::test]
async fn export_formats_preserve_session_identity_and_counts() {
    let session = session();
    session.analyze_error("ModuleNotFoundError: No module named 'requests'").await.unwrap();
    let session_id = session.session_id().await;

    for format in [ExportFormat::Json, ExportFormat::Markdown, ExportFormat::Text] {
        let exported = session.export_session(format).await.unwrap();
        assert!(exported.contains(&session_id), "export format {format:?} dropped the session_id");
    }
}
