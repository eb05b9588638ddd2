//! `aegis debug`: drives the Self-Healing Debugger subsystem (C5-C8) end
//! to end over one log file, using in-memory `aegis-state` fakes and a
//! canned LLM client so the demo runs with no external services.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use aegis_core::clock::SystemClock;
use aegis_core::config::AegisConfig;
use aegis_core::debug_session::{DebugSessionCore, ExportFormat};
use aegis_core::log_analyzer::LogAnalyzer;
use aegis_core::patch_runner::PatchRunner;
use aegis_llm::{LlmClient, StubLlmClient};
use aegis_state::{MemoryAppliedPatchRegistry, MemoryHistoricalErrorStore, MemoryModelStore};

pub async fn run(log_file: PathBuf, pipeline_id: String, apply: bool) -> Result<()> {
    let log_text = std::fs::read_to_string(&log_file).map_err(|e| anyhow::anyhow!("reading {}: {e}", log_file.display()))?;

    let clock = Arc::new(SystemClock);
    let config = AegisConfig::default();
    let historical_store = Arc::new(MemoryHistoricalErrorStore::new());
    let model_store = Arc::new(MemoryModelStore::new());
    let applied_patches = Arc::new(MemoryAppliedPatchRegistry::new());
    let llm: Arc<dyn LlmClient> = Arc::new(StubLlmClient {
        response: "error: no additional errors found outside the rule-matched regions".to_string(),
    });

    let log_analyzer = Arc::new(LogAnalyzer::new(clock.clone(), historical_store.clone(), Some(llm.clone()), config.clone()));
    let patch_runner = Arc::new(PatchRunner::new(applied_patches, crate::shell_executor()));

    let session = DebugSessionCore::new(pipeline_id, clock, historical_store, model_store, log_analyzer, patch_runner, Some(llm), config);

    let errors = session.analyze_error(&log_text).await?;
    println!("== analyze_error ==");
    println!("{}", serde_json::to_string_pretty(&errors)?);

    let Some(first) = errors.first() else {
        println!("no errors found in log; nothing to patch");
        println!("{}", session.export_session(ExportFormat::Json).await?);
        session.exit().await?;
        return Ok(());
    };

    let patch = session.generate_patch(&first.error_id).await?;
    println!("\n== generate_patch ==");
    println!("{}", serde_json::to_string_pretty(&patch)?);

    if patch.requires_approval && !apply {
        let refused = session.apply_patch(&patch.solution_id, false).await?;
        println!("\n== apply_patch(approved=false) ==");
        println!("applied={refused} (requires_approval=true, run with --apply to approve)");
    } else if apply {
        let applied = session.apply_patch(&patch.solution_id, true).await?;
        println!("\n== apply_patch(approved=true) ==");
        println!("applied={applied}");

        if applied && patch.is_reversible {
            let rolled_back = session.rollback_patch(&patch.solution_id).await?;
            println!("\n== rollback_patch ==");
            println!("rolled_back={rolled_back}");
        }
    }

    let summary = session.get_session_summary().await?;
    println!("\n== session_summary ==");
    println!("{}", serde_json::to_string_pretty(&summary)?);

    let exported = session.export_session(ExportFormat::Markdown).await?;
    println!("\n== export_session(markdown) ==");
    println!("{exported}");

    session.exit().await?;
    Ok(())
}
