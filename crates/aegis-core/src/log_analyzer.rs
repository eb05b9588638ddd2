//! Log Analyzer (C5): turns raw log text into a deduplicated, classified
//! list of [`PipelineError`]s and persists them for future similarity
//! queries. Orchestrates a rule pass (Pattern Registry, C1), a gap-filling
//! LLM pass (C4), ML classification refinement (C3), edit-distance
//! deduplication, and historical persistence (`aegis-state`).
//!
//! Grounded on the teacher's `ci_diagnostics::parse_stage_diagnostics`
//! fallback chain (error field → output-line scan → generic message) for
//! the "degrade, don't abort" failure semantics, and on
//! `aivcs-ci-domain::recorder::EventRecorder`'s append-and-query pattern
//! for the historical store wiring.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use aegis_llm::{ChatMessage, ChatRequest, LlmClient};
use aegis_state::{ErrorRecord, HistoricalErrorStore};

use crate::clock::Clock;
use crate::config::AegisConfig;
use crate::domain::{Category, PipelineError, Severity, Stage};
use crate::error::{AegisError, Result};
use crate::ml_classifier::{ClassifyTarget, TrainedModel};
use crate::pattern_registry::{PatternMatch, PatternRegistry};
use crate::sandbox::{execute_with_controls, CircuitBreaker, ExecutionConfig};
use crate::value::{Context, Value};

/// Historical store index prefix (§6 "append one document per error under
/// index `<prefix><YYYY-MM>`").
pub const HISTORICAL_INDEX_PREFIX: &str = "errors-";

const CONTEXT_WINDOW_CHARS: usize = 200;
const GAP_LINE_BUFFER: usize = 5;

/// Keyword-driven severity determination (§4.5 "Severity determination").
/// Per the spec's explicit resolution of the source ambiguity: "failed"
/// maps to `critical`, not a high-equivalent.
pub fn severity_from_text(text: &str) -> Severity {
    let lower = text.to_lowercase();
    let critical_words = ["critical", "fatal", "crash", "exception", "failed"];
    let high_words = ["error", "invalid", "missing"];
    let medium_words = ["warning", "deprecated"];

    if critical_words.iter().any(|w| lower.contains(w)) {
        Severity::Critical
    } else if high_words.iter().any(|w| lower.contains(w)) {
        Severity::High
    } else if medium_words.iter().any(|w| lower.contains(w)) {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Keyword-driven stage determination (§4.5 "Stage determination").
/// `post_deploy` keywords are checked first so they cannot be shadowed by
/// an earlier stage's keyword appearing in the same line (e.g. "deploy").
pub fn stage_from_text(text: &str) -> Stage {
    let lower = text.to_lowercase();
    let groups: [(Stage, &[&str]); 6] = [
        (Stage::PostDeploy, &["post-deploy", "post deploy", "smoke test", "rollback verification", "production monitor"]),
        (Stage::Deploy, &["deploy", "kubectl apply", "helm upgrade", "terraform apply", "rollout"]),
        (Stage::SecurityScan, &["security scan", "vulnerability scan", "trivy", "snyk", "sast", "dast", "cve-"]),
        (Stage::Test, &["test", "pytest", "jest", "assertion"]),
        (Stage::Build, &["build", "compile", "webpack", "cargo build", "make"]),
        (Stage::Checkout, &["checkout", "git clone", "git fetch", "git pull"]),
    ];
    for (stage, keywords) in groups {
        if keywords.iter().any(|k| lower.contains(k)) {
            return stage;
        }
    }
    Stage::Build
}

fn line_number_of(text: &str, byte_offset: usize) -> usize {
    text[..byte_offset.min(text.len())].matches('\n').count() + 1
}

fn context_window(text: &str, span: (usize, usize)) -> String {
    let start = span.0.saturating_sub(CONTEXT_WINDOW_CHARS);
    let end = (span.1 + CONTEXT_WINDOW_CHARS).min(text.len());
    text[start..end].to_string()
}

fn candidate_from_match(pipeline_id: &str, log_text: &str, m: &PatternMatch, timestamp: DateTime<Utc>) -> PipelineError {
    let window = context_window(log_text, m.span);
    let severity = severity_from_text(&window);
    let stage = stage_from_text(&window);
    let line_number = line_number_of(log_text, m.span.0);

    let mut context = Context::new();
    context.insert("line_number".to_string(), Value::from(line_number as i64));
    context.insert("surrounding_context".to_string(), Value::from(window));

    PipelineError::new(pipeline_id, m.matched_text.clone(), severity, m.category, stage, timestamp).with_context(context)
}

/// Degradation flags the caller uses to learn which passes succeeded
/// (§4.5 "Failure semantics": a failure in one pass degrades but does not
/// abort the others).
#[derive(Debug, Clone, Default)]
pub struct AnalysisMetadata {
    pub rule_matches: usize,
    pub llm_pass_ran: bool,
    pub llm_pass_degraded: bool,
    pub classification_degraded: bool,
    pub persistence_degraded: bool,
}

#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub errors: Vec<PipelineError>,
    pub metadata: AnalysisMetadata,
}

pub struct LogAnalyzer {
    clock: Arc<dyn Clock>,
    historical_store: Arc<dyn HistoricalErrorStore>,
    llm: Option<Arc<dyn LlmClient>>,
    models: BTreeMap<ClassifyTarget, TrainedModel>,
    config: AegisConfig,
}

impl LogAnalyzer {
    pub fn new(clock: Arc<dyn Clock>, historical_store: Arc<dyn HistoricalErrorStore>, llm: Option<Arc<dyn LlmClient>>, config: AegisConfig) -> Self {
        Self {
            clock,
            historical_store,
            llm,
            models: BTreeMap::new(),
            config,
        }
    }

    pub fn with_model(mut self, model: TrainedModel) -> Self {
        self.models.insert(model.target, model);
        self
    }

    /// Runs the rule → gap-fill LLM → classification-refinement →
    /// dedup → persist pipeline described in §4.5.
    pub async fn analyze(&self, pipeline_id: &str, log_text: &str) -> Result<AnalysisOutcome> {
        let timestamp = self.clock.now();
        let mut metadata = AnalysisMetadata::default();

        // 1. Rule pass.
        let rule_matches = PatternRegistry::global().scan_all(log_text);
        metadata.rule_matches = rule_matches.len();
        let mut candidates: Vec<PipelineError> = rule_matches
            .iter()
            .map(|m| candidate_from_match(pipeline_id, log_text, m, timestamp))
            .collect();

        // 2 & 3. Gap identification + LLM pass.
        if let Some(llm) = &self.llm {
            let gaps = uncovered_line_ranges(log_text, &rule_matches);
            if !gaps.is_empty() {
                metadata.llm_pass_ran = true;
                match self.run_llm_gap_pass(pipeline_id, log_text, &gaps, llm.as_ref(), timestamp).await {
                    Ok(mut llm_candidates) => candidates.append(&mut llm_candidates),
                    Err(err) => {
                        warn!(error = %err, "llm gap pass degraded");
                        metadata.llm_pass_degraded = true;
                    }
                }
            }
        }

        // 4. Classification refinement.
        for candidate in &mut candidates {
            if let Err(err) = self.refine_classification(candidate) {
                warn!(error = %err, "classification refinement degraded for candidate");
                metadata.classification_degraded = true;
            }
        }

        // 5. Deduplication.
        let deduped = dedup_by_similarity(candidates, self.config.similarity_threshold);

        // 6. Persistence.
        for error in &deduped {
            if let Err(err) = self.persist(error).await {
                warn!(error = %err, error_id = %error.error_id, "failed to persist error to historical store");
                metadata.persistence_degraded = true;
            }
        }

        Ok(AnalysisOutcome { errors: deduped, metadata })
    }

    async fn run_llm_gap_pass(
        &self,
        pipeline_id: &str,
        log_text: &str,
        gaps: &[(usize, usize)],
        llm: &dyn LlmClient,
        timestamp: DateTime<Utc>,
    ) -> Result<Vec<PipelineError>> {
        let lines: Vec<&str> = log_text.lines().collect();
        let gap_text: String = gaps
            .iter()
            .flat_map(|&(start, end)| lines[start.min(lines.len())..end.min(lines.len())].iter())
            .cloned()
            .collect::<Vec<_>>()
            .join("\n");

        if gap_text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let prompt = ChatMessage::user(format!(
            "Enumerate any additional pipeline errors in the following log excerpt. \
             List each distinct error on its own line prefixed with 'error:', \
             'exception:', or 'failed:'.\n\n{gap_text}"
        ));
        let system = ChatMessage::system("You are a CI/CD log analysis assistant.");

        let breaker = CircuitBreaker::new(self.config.llm.retries.max(1) + 1);
        let exec_config = ExecutionConfig {
            timeout_ms: 30_000,
            max_retries: self.config.llm.retries,
            backoff_base_ms: 500,
        };

        let llm_config = self.config.llm.clone();
        let result = execute_with_controls(&exec_config, &breaker, || {
            let request = ChatRequest {
                messages: vec![system.clone(), prompt.clone()],
                model: llm_config.model.clone(),
                temperature: llm_config.temperature,
                max_tokens: llm_config.max_tokens,
            };
            async {
                llm.chat(request).await.map_err(|e| match e {
                    aegis_llm::LlmError::Auth(msg) => AegisError::Auth(msg),
                    aegis_llm::LlmError::Validation(msg) => AegisError::Validation(msg),
                    other => AegisError::Transient(other.to_string()),
                })
            }
        })
        .await?;

        Ok(parse_llm_candidates(pipeline_id, &result.value.text, timestamp))
    }

    /// Runs the ML classifier over a candidate and applies the override
    /// rules from §4.5.4: category is overridden when ML confidence exceeds
    /// threshold, severity always keeps the rule text's determination, and
    /// stage keeps the rule determination (ML agreement changes nothing;
    /// disagreement is a tie the rule wins).
    fn refine_classification(&self, candidate: &mut PipelineError) -> Result<()> {
        if let Some(model) = self.models.get(&ClassifyTarget::Category) {
            let (prediction, confidence, _) = model.predict(candidate, false, self.config.ml_confidence_threshold);
            if let Some(predicted) = prediction {
                if confidence >= self.config.ml_confidence_threshold {
                    if let Some(category) = parse_category(&predicted) {
                        candidate.category = category;
                    }
                }
            }
        }
        Ok(())
    }

    async fn persist(&self, error: &PipelineError) -> Result<()> {
        let record = ErrorRecord {
            error_id: error.error_id.clone(),
            pipeline_id: error.pipeline_id.clone(),
            category: error.category.to_string(),
            stage: error.stage.to_string(),
            message: error.message.clone(),
            timestamp: error.timestamp,
            payload: serde_json::to_value(error)?,
        };
        self.historical_store.record(HISTORICAL_INDEX_PREFIX, record).await?;
        Ok(())
    }
}

fn parse_category(name: &str) -> Option<Category> {
    match name {
        "dependency" => Some(Category::Dependency),
        "permission" => Some(Category::Permission),
        "configuration" => Some(Category::Configuration),
        "network" => Some(Category::Network),
        "resource" => Some(Category::Resource),
        "build" => Some(Category::Build),
        "test" => Some(Category::Test),
        "deployment" => Some(Category::Deployment),
        "security" => Some(Category::Security),
        "unknown" => Some(Category::Unknown),
        _ => None,
    }
}

/// Computes the set of line ranges not covered by any rule match, with a
/// `GAP_LINE_BUFFER`-line buffer around each covered region (§4.5 "Gap
/// identification"). Returns `(start_line, end_line)` half-open ranges.
fn uncovered_line_ranges(log_text: &str, matches: &[PatternMatch]) -> Vec<(usize, usize)> {
    let total_lines = log_text.lines().count();
    if total_lines == 0 {
        return Vec::new();
    }

    let mut covered = vec![false; total_lines];
    for m in matches {
        let line = line_number_of(log_text, m.span.0).saturating_sub(1);
        let start = line.saturating_sub(GAP_LINE_BUFFER);
        let end = (line + GAP_LINE_BUFFER + 1).min(total_lines);
        for slot in covered.iter_mut().take(end).skip(start) {
            *slot = true;
        }
    }

    let mut gaps = Vec::new();
    let mut i = 0;
    while i < total_lines {
        if !covered[i] {
            let start = i;
            while i < total_lines && !covered[i] {
                i += 1;
            }
            gaps.push((start, i));
        } else {
            i += 1;
        }
    }
    gaps
}

/// Permissive line-oriented parser for the LLM's enumerated-errors
/// response: a new candidate starts on any line containing "error:",
/// "exception:", or "failed:" (case-insensitive); subsequent non-marker
/// lines are appended to the current candidate's message until the next
/// marker (§4.5 "LLM pass").
fn parse_llm_candidates(pipeline_id: &str, response_text: &str, timestamp: DateTime<Utc>) -> Vec<PipelineError> {
    let markers = ["error:", "exception:", "failed:"];
    let mut candidates: Vec<String> = Vec::new();

    for line in response_text.lines() {
        let lower = line.to_lowercase();
        if markers.iter().any(|m| lower.contains(m)) {
            candidates.push(line.trim().to_string());
        } else if let Some(last) = candidates.last_mut() {
            if !line.trim().is_empty() {
                last.push(' ');
                last.push_str(line.trim());
            }
        }
    }

    candidates
        .into_iter()
        .map(|message| {
            let severity = severity_from_text(&message);
            let stage = stage_from_text(&message);
            let category = classify_category_from_text(&message);
            PipelineError::new(pipeline_id, message, severity, category, stage, timestamp)
        })
        .collect()
}

fn classify_category_from_text(text: &str) -> Category {
    PatternRegistry::global()
        .scan(text)
        .into_iter()
        .next()
        .map(|m| m.category)
        .unwrap_or(Category::Unknown)
}

/// Pairwise edit-distance dedup: retains the first of any similar cluster.
/// A `similarity_threshold` of 1.0 preserves every distinct message; 0.0
/// collapses everything into the first candidate seen (§8 boundary cases).
fn dedup_by_similarity(candidates: Vec<PipelineError>, similarity_threshold: f64) -> Vec<PipelineError> {
    let mut retained: Vec<PipelineError> = Vec::new();
    'candidate: for candidate in candidates {
        for existing in &retained {
            let ratio = strsim::normalized_levenshtein(&candidate.message, &existing.message);
            if ratio >= similarity_threshold {
                continue 'candidate;
            }
        }
        retained.push(candidate);
    }
    retained
}
