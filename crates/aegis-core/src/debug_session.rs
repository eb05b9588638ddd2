//! Debug Session Core (C8): a serial command loop over one pipeline's
//! [`DebugSession`], wiring the Log Analyzer (C5), ML Classifier (C3), Patch
//! Synthesizer (C6), and Patch Runner (C7) behind a single per-session
//! exclusive lock.
//!
//! Grounded on `oxidized-state`'s single-writer ledger discipline for the
//! serialization, and on `aivcs-ci-domain::recorder::EventRecorder`'s
//! append-then-derive shape for how every command both mutates session state
//! and appends a [`SessionEvent`] to its trail.
//!
//! Command failures are recorded as an `error` event and returned to the
//! caller, but never flip the session out of `Active` — only `exit`/`abort`
//! terminate a session (§4.8 "Failure semantics").

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use aegis_llm::LlmClient;
use aegis_state::{ErrorQuery, HistoricalErrorStore, ModelKey, ModelStore};

use crate::clock::Clock;
use crate::config::AegisConfig;
use crate::domain::{AnalysisResult, Category, ClassificationResult, DebugSession, PatchSolution, PipelineError, Severity, SessionEvent, SessionStatus, Target, TargetPrediction};
use crate::error::{AegisError, Result};
use crate::log_analyzer::LogAnalyzer;
use crate::ml_classifier::{self, ClassifyTarget, EstimatorFamily, TrainOptions, TrainedModel};
use crate::obs;
use crate::patch_runner::PatchRunner;
use crate::patch_synthesizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Markdown,
    Text,
}

impl ExportFormat {
    fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Markdown => "markdown",
            ExportFormat::Text => "text",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandHistorySummary {
    pub total: usize,
    pub frequencies: BTreeMap<String, usize>,
    pub last: Vec<String>,
    pub top_transitions: Vec<(String, String, usize)>,
}

struct SessionState {
    session: DebugSession,
    /// Synthesized but not-yet-applied patches, keyed by `solution_id`.
    /// Kept outside the persisted `DebugSession` snapshot since only applied
    /// patches are part of that record (§3).
    pending_patches: BTreeMap<String, PatchSolution>,
    models: BTreeMap<ClassifyTarget, TrainedModel>,
}

/// One live debugging session over a single pipeline run. Every command
/// runs behind the same lock, so two commands against the same session
/// never interleave (§4.8 "Concurrency").
pub struct DebugSessionCore {
    state: Mutex<SessionState>,
    clock: Arc<dyn Clock>,
    historical_store: Arc<dyn HistoricalErrorStore>,
    model_store: Arc<dyn ModelStore>,
    log_analyzer: Arc<LogAnalyzer>,
    patch_runner: Arc<PatchRunner>,
    llm: Option<Arc<dyn LlmClient>>,
    config: AegisConfig,
}

impl DebugSessionCore {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pipeline_id: impl Into<String>,
        clock: Arc<dyn Clock>,
        historical_store: Arc<dyn HistoricalErrorStore>,
        model_store: Arc<dyn ModelStore>,
        log_analyzer: Arc<LogAnalyzer>,
        patch_runner: Arc<PatchRunner>,
        llm: Option<Arc<dyn LlmClient>>,
        config: AegisConfig,
    ) -> Self {
        let start_time = clock.now();
        Self {
            state: Mutex::new(SessionState {
                session: DebugSession::new(pipeline_id, start_time),
                pending_patches: BTreeMap::new(),
                models: BTreeMap::new(),
            }),
            clock,
            historical_store,
            model_store,
            log_analyzer,
            patch_runner,
            llm,
            config,
        }
    }

    pub async fn session_id(&self) -> String {
        self.state.lock().await.session.session_id.clone()
    }

    pub async fn snapshot(&self) -> DebugSession {
        self.state.lock().await.session.clone()
    }

    /// Records `command` in the history and, on failure, appends a generic
    /// `error` event — the uniform wrapper every public command routes
    /// through so none of them can forget the bookkeeping (§4.8).
    async fn record_command<T>(&self, command: &str, state: &mut SessionState, result: Result<(T, Vec<SessionEvent>)>) -> Result<T> {
        state.session.command_history.push(command.to_string());
        match result {
            Ok((value, events)) => {
                for event in events {
                    state.session.events_push(event);
                }
                obs::emit_session_command(&state.session.session_id, command);
                Ok(value)
            }
            Err(err) => {
                obs::emit_session_error(&state.session.session_id, &err.to_string());
                state.session.events_push(SessionEvent::Error { message: err.to_string() });
                Err(err)
            }
        }
    }

    fn require_active(state: &SessionState) -> Result<()> {
        if state.session.status.is_terminal() {
            return Err(AegisError::Validation(format!(
                "session {} is {:?} and accepts no further commands",
                state.session.session_id, state.session.status
            )));
        }
        Ok(())
    }

    pub async fn analyze_error(&self, log_text: &str) -> Result<Vec<PipelineError>> {
        let mut state = self.state.lock().await;
        Self::require_active(&state)?;
        let pipeline_id = state.session.pipeline_id.clone();
        let result = async {
            let outcome = self.log_analyzer.analyze(&pipeline_id, log_text).await?;
            let mut events = Vec::new();
            for error in &outcome.errors {
                let analysis = build_analysis(error);
                events.push(SessionEvent::AnalysisResult { analysis: analysis.clone() });
                state.session.analyses.push(analysis);
            }
            state.session.errors.extend(outcome.errors.clone());
            Ok((outcome.errors, events))
        }
        .await;
        self.record_command("analyze_error", &mut state, result).await
    }

    pub async fn generate_patch(&self, error_id: &str) -> Result<PatchSolution> {
        let mut state = self.state.lock().await;
        Self::require_active(&state)?;
        let llm = self.llm.clone();
        let llm_config = self.config.llm.clone();
        let result = async {
            let error = state
                .session
                .errors
                .iter()
                .find(|e| e.error_id == error_id)
                .cloned()
                .ok_or_else(|| AegisError::NotFound(format!("no error with id {error_id} in this session")))?;
            let ml_confidence = classify_with_models(&state.models, &error, &self.config).map(|c| c.overall_confidence());
            let patch = patch_synthesizer::synthesize(&error, llm.as_deref(), &llm_config, ml_confidence).await?;
            state.pending_patches.insert(patch.solution_id.clone(), patch.clone());
            Ok((patch.clone(), vec![SessionEvent::PatchSolution { patch }]))
        }
        .await;
        self.record_command("generate_patch", &mut state, result).await
    }

    /// Applies one previously synthesized patch. A patch-execution failure
    /// is a normal, non-aborting outcome: it's recorded via `PatchApplied{
    /// success: false }` and `Ok(false)` is returned — not an `Err` — since
    /// the command itself completed (§4.8).
    pub async fn apply_patch(&self, solution_id: &str, approved: bool) -> Result<bool> {
        let mut state = self.state.lock().await;
        Self::require_active(&state)?;
        let result = async {
            let patch = state
                .pending_patches
                .get(solution_id)
                .cloned()
                .ok_or_else(|| AegisError::NotFound(format!("no pending patch with solution_id {solution_id}")))?;
            match self.patch_runner.apply(&patch, approved).await {
                Ok(()) => {
                    state.pending_patches.remove(solution_id);
                    state.session.applied_patches.push(patch.clone());
                    Ok((true, vec![SessionEvent::PatchApplied { solution_id: solution_id.to_string(), success: true }]))
                }
                Err(err) => Ok((
                    false,
                    vec![
                        SessionEvent::PatchApplied { solution_id: solution_id.to_string(), success: false },
                        SessionEvent::Error { message: err.to_string() },
                    ],
                )),
            }
        }
        .await;
        self.record_command("apply_patch", &mut state, result).await
    }

    pub async fn apply_all_patches(&self, approved: bool) -> Result<(usize, usize)> {
        let mut state = self.state.lock().await;
        Self::require_active(&state)?;
        let result = async {
            let pending: Vec<PatchSolution> = state.pending_patches.values().cloned().collect();
            let mut events = Vec::new();
            let mut applied = 0usize;
            let mut failed = 0usize;
            for patch in pending {
                match self.patch_runner.apply(&patch, approved).await {
                    Ok(()) => {
                        applied += 1;
                        state.pending_patches.remove(&patch.solution_id);
                        state.session.applied_patches.push(patch.clone());
                        events.push(SessionEvent::PatchApplied { solution_id: patch.solution_id.clone(), success: true });
                    }
                    Err(err) => {
                        failed += 1;
                        events.push(SessionEvent::PatchApplied { solution_id: patch.solution_id.clone(), success: false });
                        events.push(SessionEvent::Error { message: err.to_string() });
                    }
                }
            }
            events.push(SessionEvent::BatchSummary { applied, failed });
            Ok(((applied, failed), events))
        }
        .await;
        self.record_command("apply_all_patches", &mut state, result).await
    }

    pub async fn rollback_patch(&self, solution_id: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        Self::require_active(&state)?;
        let result = async {
            match self.patch_runner.rollback(solution_id).await {
                Ok(()) => {
                    state.session.applied_patches.retain(|p| p.solution_id != solution_id);
                    Ok((true, vec![SessionEvent::PatchRollback { solution_id: solution_id.to_string(), success: true }]))
                }
                Err(err) => Ok((
                    false,
                    vec![
                        SessionEvent::PatchRollback { solution_id: solution_id.to_string(), success: false },
                        SessionEvent::Error { message: err.to_string() },
                    ],
                )),
            }
        }
        .await;
        self.record_command("rollback_patch", &mut state, result).await
    }

    pub async fn train_ml_models(&self, target: ClassifyTarget, family: EstimatorFamily, options: TrainOptions) -> Result<ml_classifier::TrainReport> {
        let mut state = self.state.lock().await;
        Self::require_active(&state)?;
        let result = async {
            let records = self.historical_store.query(&ErrorQuery::default()).await?;
            let pipeline_errors: std::result::Result<Vec<PipelineError>, _> = records.into_iter().map(|r| serde_json::from_value::<PipelineError>(r.payload)).collect();
            let pipeline_errors = pipeline_errors.map_err(AegisError::from)?;

            let (model, report) = ml_classifier::train(&pipeline_errors, target, family, &options)?;

            let key = ModelKey::new(target_name(target), family.to_string());
            let bytes = serde_json::to_vec(&model).map_err(AegisError::from)?;
            self.model_store.put_model(&key, bytes).await?;
            self.model_store
                .record_training(aegis_state::TrainingHistoryEntry {
                    key,
                    precision: report.precision,
                    recall: report.recall,
                    f1: report.f1,
                    cv_score: report.cv_score,
                    best_params: report.best_params.clone(),
                    class_distribution: serde_json::to_value(&report.class_distribution)?,
                    trained_at: self.clock.now(),
                })
                .await?;

            state.models.insert(target, model);
            let event = SessionEvent::MlResult { result: serde_json::to_value(&report)? };
            Ok((report, vec![event]))
        }
        .await;
        self.record_command("train_ml_models", &mut state, result).await
    }

    pub async fn get_ml_model_info(&self, target: ClassifyTarget) -> Result<Option<aegis_state::TrainingHistoryEntry>> {
        let mut state = self.state.lock().await;
        Self::require_active(&state)?;
        let result = async {
            let history = self.model_store.training_history().await?;
            let latest = history.into_iter().filter(|entry| entry.key.target == target_name(target)).max_by_key(|entry| entry.trained_at);
            Ok((latest, vec![]))
        }
        .await;
        self.record_command("get_ml_model_info", &mut state, result).await
    }

    pub async fn classify_error_ml(&self, error_id: &str) -> Result<ClassificationResult> {
        let mut state = self.state.lock().await;
        Self::require_active(&state)?;
        let result = async {
            let error = state
                .session
                .errors
                .iter()
                .find(|e| e.error_id == error_id)
                .cloned()
                .ok_or_else(|| AegisError::NotFound(format!("no error with id {error_id} in this session")))?;

            if state.models.is_empty() {
                return Err(AegisError::Validation("no trained ml models available for this session; call train_ml_models first".to_string()));
            }

            let classification = classify_with_models(&state.models, &error, &self.config).expect("checked non-empty above");
            obs::emit_classification(error_id, classification.overall_confidence());
            let event = SessionEvent::MlResult { result: serde_json::to_value(&classification)? };
            Ok((classification, vec![event]))
        }
        .await;
        self.record_command("classify_error_ml", &mut state, result).await
    }

    pub async fn export_session(&self, format: ExportFormat) -> Result<String> {
        let mut state = self.state.lock().await;
        let result: Result<(String, Vec<SessionEvent>)> = (|| {
            let content = match format {
                ExportFormat::Json => serde_json::to_string_pretty(&state.session).map_err(AegisError::from)?,
                ExportFormat::Markdown => render_markdown(&state.session),
                ExportFormat::Text => render_text(&state.session),
            };
            Ok((content.clone(), vec![SessionEvent::SessionExported { format: format.as_str().to_string(), content }]))
        })();
        self.record_command("export_session", &mut state, result).await
    }

    pub async fn get_session_summary(&self) -> Result<serde_json::Value> {
        let mut state = self.state.lock().await;
        let result: Result<(serde_json::Value, Vec<SessionEvent>)> = (|| {
            let mut by_category: BTreeMap<String, usize> = BTreeMap::new();
            let mut by_severity: BTreeMap<String, usize> = BTreeMap::new();
            for error in &state.session.errors {
                *by_category.entry(error.category.to_string()).or_insert(0) += 1;
                *by_severity.entry(error.severity.to_string()).or_insert(0) += 1;
            }
            let summary = serde_json::json!({
                "session_id": state.session.session_id,
                "pipeline_id": state.session.pipeline_id,
                "status": state.session.status,
                "error_count": state.session.errors.len(),
                "errors_by_category": by_category,
                "errors_by_severity": by_severity,
                "applied_patch_count": state.session.applied_patches.len(),
                "pending_patch_count": state.pending_patches.len(),
                "command_count": state.session.command_history.len(),
            });
            Ok((summary.clone(), vec![SessionEvent::SessionSummary { summary }]))
        })();
        self.record_command("get_session_summary", &mut state, result).await
    }

    pub async fn get_command_history(&self, last_n: usize) -> Result<CommandHistorySummary> {
        let mut state = self.state.lock().await;
        let result: Result<(CommandHistorySummary, Vec<SessionEvent>)> = (|| {
            let commands = &state.session.command_history;
            let mut frequencies: BTreeMap<String, usize> = BTreeMap::new();
            for command in commands {
                *frequencies.entry(command.clone()).or_insert(0) += 1;
            }
            let mut transition_counts: BTreeMap<(String, String), usize> = BTreeMap::new();
            for pair in commands.windows(2) {
                *transition_counts.entry((pair[0].clone(), pair[1].clone())).or_insert(0) += 1;
            }
            let mut top_transitions: Vec<(String, String, usize)> = transition_counts.into_iter().map(|((a, b), n)| (a, b, n)).collect();
            top_transitions.sort_by(|a, b| b.2.cmp(&a.2));
            top_transitions.truncate(5);

            let last = commands.iter().rev().take(last_n).rev().cloned().collect();
            let summary = CommandHistorySummary {
                total: commands.len(),
                frequencies,
                last,
                top_transitions,
            };
            Ok((summary, vec![SessionEvent::CommandHistory { commands: commands.clone() }]))
        })();
        self.record_command("get_command_history", &mut state, result).await
    }

    pub async fn exit(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let end_time = self.clock.now();
        let result: Result<((), Vec<SessionEvent>)> = (|| {
            state.session.status = SessionStatus::Completed;
            state.session.end_time = Some(end_time);
            Ok(((), vec![]))
        })();
        self.record_command("exit", &mut state, result).await
    }

    pub async fn abort(&self, reason: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let end_time = self.clock.now();
        let result: Result<((), Vec<SessionEvent>)> = (|| {
            state.session.status = SessionStatus::Aborted;
            state.session.end_time = Some(end_time);
            Ok(((), vec![SessionEvent::Error { message: format!("session aborted: {reason}") }]))
        })();
        self.record_command("abort", &mut state, result).await
    }
}

/// Runs every trained model over `error`, returning `None` when no models
/// are trained yet. Shared between `classify_error_ml` (which requires a
/// classification) and `generate_patch` (which only wants the overall
/// confidence to scale the LLM path's `estimated_success_rate`, §4.6).
fn classify_with_models(models: &BTreeMap<ClassifyTarget, TrainedModel>, error: &PipelineError, config: &AegisConfig) -> Option<ClassificationResult> {
    if models.is_empty() {
        return None;
    }
    let mut predictions = Vec::new();
    for (target, model) in models {
        let (prediction, confidence, class_probabilities) = model.predict(error, true, config.ml_confidence_threshold);
        predictions.push(TargetPrediction {
            target: classification_target(*target),
            prediction,
            confidence,
            class_probabilities,
            meets_threshold: confidence >= config.ml_confidence_threshold,
        });
    }
    Some(ClassificationResult { error_id: error.error_id.clone(), predictions })
}

fn target_name(target: ClassifyTarget) -> &'static str {
    match target {
        ClassifyTarget::Category => "category",
        ClassifyTarget::Severity => "severity",
        ClassifyTarget::Stage => "stage",
    }
}

fn classification_target(target: ClassifyTarget) -> Target {
    match target {
        ClassifyTarget::Category => Target::Category,
        ClassifyTarget::Severity => Target::Severity,
        ClassifyTarget::Stage => Target::Stage,
    }
}

/// Derives a human-facing root-cause summary for a classified error. No
/// teacher analogue trains a real root-cause model, so this stays a
/// deterministic category lookup mirroring `patch_synthesizer`'s template
/// families (§4.6) rather than guessing at free-form prose.
fn build_analysis(error: &PipelineError) -> AnalysisResult {
    let (suggested_solutions, prevention_measures): (Vec<String>, Vec<String>) = match error.category {
        Category::Dependency => (
            vec!["install the missing dependency".to_string(), "pin dependency versions in the lockfile".to_string()],
            vec!["add a dependency-audit step to the pipeline".to_string()],
        ),
        Category::Permission => (
            vec!["grant the pipeline user the required file permissions".to_string()],
            vec!["run the pipeline under a dedicated, least-privilege service account".to_string()],
        ),
        Category::Configuration => (
            vec!["generate or restore the missing configuration file".to_string()],
            vec!["validate required configuration before the stage runs".to_string()],
        ),
        Category::Network => (
            vec!["increase the connection timeout and retry count".to_string()],
            vec!["add a network reachability check before the stage".to_string()],
        ),
        Category::Resource => (
            vec!["increase the memory/disk limit allocated to the job".to_string()],
            vec!["alert on resource usage trending toward the limit".to_string()],
        ),
        Category::Test => (
            vec!["quarantine the failing test and open a follow-up ticket".to_string()],
            vec!["track test flakiness over time".to_string()],
        ),
        Category::Security => (
            vec!["pin the affected dependency to its patched version".to_string()],
            vec!["run a security scan on every pull request".to_string()],
        ),
        Category::Build | Category::Deployment | Category::Unknown => (
            vec!["review the pipeline logs manually".to_string()],
            vec!["add targeted diagnostics around this stage".to_string()],
        ),
    };

    AnalysisResult {
        error_id: error.error_id.clone(),
        root_cause: error.message.clone(),
        confidence_score: match error.severity {
            Severity::Critical => 0.9,
            Severity::High => 0.8,
            Severity::Medium => 0.6,
            Severity::Low => 0.4,
            Severity::Info => 0.2,
        },
        suggested_solutions,
        prevention_measures,
    }
}

fn render_markdown(session: &DebugSession) -> String {
    let mut out = format!("# Debug session {}\n\n", session.session_id);
    out.push_str(&format!("- pipeline: {}\n- status: {:?}\n- errors: {}\n- applied patches: {}\n\n", session.pipeline_id, session.status, session.errors.len(), session.applied_patches.len()));
    out.push_str("## Errors\n\n");
    for error in &session.errors {
        out.push_str(&format!("- `{}` [{}/{}] {}\n", error.error_id, error.category, error.severity, error.message));
    }
    out.push_str("\n## Applied patches\n\n");
    for patch in &session.applied_patches {
        out.push_str(&format!("- `{}` ({:?})\n", patch.solution_id, patch.patch_type));
    }
    out
}

fn render_text(session: &DebugSession) -> String {
    let mut out = format!("session {} pipeline={} status={:?}\n", session.session_id, session.pipeline_id, session.status);
    for error in &session.errors {
        out.push_str(&format!("error {} category={} severity={}: {}\n", error.error_id, error.category, error.severity, error.message));
    }
    for patch in &session.applied_patches {
        out.push_str(&format!("applied patch {} type={:?}\n", patch.solution_id, patch.patch_type));
    }
    out
}
