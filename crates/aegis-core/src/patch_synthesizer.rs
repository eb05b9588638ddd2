//! Patch Synthesizer (C6): produces a [`PatchSolution`] for a classified
//! error, preferring a deterministic template over an LLM-generated script.
//!
//! Grounded on the teacher's `domain::ci::repair` builder chain for the
//! template family shapes, and on `sandbox::execution`'s retry/backoff
//! plumbing (already duplicated in `aegis-llm`) for the LLM fallback call.
//! The safety denylist is grounded on the design note that a patch script
//! must never weaken an existing safety posture — the check runs against
//! both template and LLM output, with no exemption for either path.

use aegis_llm::{ChatMessage, ChatRequest, LlmClient};

use crate::config::LlmConfig;
use crate::domain::{Category, PatchSolution, PatchType, PipelineError};
use crate::error::{AegisError, Result};
use crate::pattern_registry::PatternRegistry;

/// Case-insensitive substrings that disqualify a patch script outright,
/// regardless of which path produced it.
const DENYLIST: &[&str] = &[
    "rm -rf",
    "sudo ",
    "chmod 777",
    "chmod -r 777",
    "eval(",
    "exec(",
    ":(){ :|:& };:",
    "dd if=",
    "mkfs",
    "> /dev/sd",
    "curl | sh",
    "wget | sh",
];

/// Rejects a script containing any denylisted construct (§9 "must not
/// weaken"). Applies to both the patch script and the rollback script.
pub fn validate_safety(script: &str) -> Result<()> {
    let lower = script.to_lowercase();
    for pattern in DENYLIST {
        if lower.contains(pattern) {
            return Err(AegisError::Safety(format!("patch script contains denylisted construct: {pattern}")));
        }
    }
    Ok(())
}

fn patch_type_for(category: Category) -> Option<PatchType> {
    match category {
        Category::Dependency => Some(PatchType::Dependency),
        Category::Permission => Some(PatchType::Permission),
        Category::Configuration => Some(PatchType::Configuration),
        Category::Network => Some(PatchType::Network),
        Category::Resource => Some(PatchType::Resource),
        Category::Test => Some(PatchType::Test),
        Category::Security => Some(PatchType::Security),
        Category::Build | Category::Deployment | Category::Unknown => None,
    }
}

struct Template {
    patch_script: String,
    rollback_script: Option<String>,
    is_reversible: bool,
    requires_approval: bool,
    estimated_success_rate: f64,
    dependencies: Vec<String>,
    validation_steps: Vec<String>,
}

fn first_capture(error: &PipelineError) -> Option<String> {
    PatternRegistry::global()
        .scan(&error.message)
        .into_iter()
        .find(|m| m.category == error.category)
        .and_then(|m| m.captures.into_iter().flatten().next())
}

/// Builds a deterministic template for the categories that admit one.
/// Returns `None` for categories that always fall through to the LLM path
/// (§4.6 "Template families").
fn template_for(error: &PipelineError) -> Option<Template> {
    let slot = first_capture(error);

    match error.category {
        Category::Dependency => {
            let package = slot.unwrap_or_else(|| "unknown-package".to_string());
            let (install, uninstall) = if error.message.to_lowercase().contains("modulenotfounderror") {
                (format!("pip install {package}"), format!("pip uninstall -y {package}"))
            } else {
                (format!("npm install {package}"), format!("npm uninstall {package}"))
            };
            Some(Template {
                patch_script: install,
                rollback_script: Some(uninstall),
                is_reversible: true,
                requires_approval: true,
                estimated_success_rate: 0.85,
                dependencies: vec![package],
                validation_steps: vec!["re-run the failing stage".to_string()],
            })
        }
        Category::Permission => {
            let path = slot.unwrap_or_else(|| "<unresolved-path>".to_string());
            Some(Template {
                patch_script: format!("chmod u+rw {path}"),
                rollback_script: Some(format!("chmod 644 {path}")),
                is_reversible: true,
                requires_approval: true,
                estimated_success_rate: 0.95,
                dependencies: vec![],
                validation_steps: vec![format!("verify the pipeline user can access {path}")],
            })
        }
        Category::Configuration => {
            let path = slot.unwrap_or_else(|| "<unresolved-config-path>".to_string());
            Some(Template {
                patch_script: format!("touch {path} && echo '{{}}' > {path}"),
                rollback_script: Some(format!("rm {path}")),
                is_reversible: true,
                requires_approval: true,
                estimated_success_rate: 0.5,
                dependencies: vec![],
                validation_steps: vec!["re-run the failing stage".to_string(), format!("review generated placeholder {path}")],
            })
        }
        Category::Network => Some(Template {
            patch_script: "increase the connection timeout and retry count in the pipeline's network client configuration".to_string(),
            rollback_script: None,
            is_reversible: false,
            requires_approval: true,
            estimated_success_rate: 0.4,
            dependencies: vec![],
            validation_steps: vec!["re-run the failing stage".to_string()],
        }),
        Category::Resource => Some(Template {
            patch_script: "increase the memory/disk limit allocated to the failing job".to_string(),
            rollback_script: None,
            is_reversible: false,
            requires_approval: true,
            estimated_success_rate: 0.45,
            dependencies: vec![],
            validation_steps: vec!["re-run the failing stage".to_string(), "monitor resource usage".to_string()],
        }),
        Category::Test => Some(Template {
            patch_script: "quarantine the failing test and open a follow-up ticket".to_string(),
            rollback_script: Some("remove the quarantine marker from the failing test".to_string()),
            is_reversible: true,
            requires_approval: true,
            estimated_success_rate: 0.3,
            dependencies: vec![],
            validation_steps: vec!["confirm the remaining suite passes".to_string()],
        }),
        Category::Security => Some(Template {
            patch_script: "pin the affected dependency to the patched version reported by the scanner".to_string(),
            rollback_script: Some("revert the dependency pin to its previous version".to_string()),
            is_reversible: true,
            requires_approval: true,
            estimated_success_rate: 0.6,
            dependencies: vec![],
            validation_steps: vec!["re-run the security scan".to_string()],
        }),
        Category::Build | Category::Deployment | Category::Unknown => None,
    }
}

const LANGUAGE_KEYWORDS: &[(&str, &[&str])] = &[
    ("python", &["python", "pip ", ".py", "traceback", "modulenotfounderror"]),
    ("javascript", &["node", "npm ", "javascript", ".js", "typeerror"]),
    ("java", &["java", "maven", "gradle", "nullpointerexception", ".jar"]),
    ("go", &["golang", "go build", "go.mod", "panic:"]),
    ("ruby", &["ruby", "gem ", "rake", ".rb"]),
    ("c++", &["g++", "clang++", "segmentation fault", "undefined reference", ".cpp"]),
    ("bash", &["bash", "/bin/sh", "command not found"]),
    ("docker", &["docker", "dockerfile", "image pull", "container"]),
];

/// Scores each known language by keyword occurrence in the error message
/// and surrounding context, returning the top hit (§4.6 "LLM path").
fn detect_language_hint(error: &PipelineError) -> &'static str {
    let mut haystack = error.message.to_lowercase();
    if let Some(crate::value::Value::String(ctx)) = error.context.get("surrounding_context") {
        haystack.push(' ');
        haystack.push_str(&ctx.to_lowercase());
    }

    let mut best = ("unknown", 0usize);
    for (language, keywords) in LANGUAGE_KEYWORDS {
        let score = keywords.iter().filter(|k| haystack.contains(*k)).count();
        if score > best.1 {
            best = (language, score);
        }
    }
    best.0
}

/// Scales `estimated_success_rate` with the ML classifier's overall
/// confidence, per §4.6 "LLM path": 0.85 above 0.8, 0.75 above 0.6,
/// else 0.7. A missing classification (no trained models yet) falls
/// into the `else` tier.
fn success_rate_from_ml_confidence(ml_confidence: Option<f64>) -> f64 {
    match ml_confidence {
        Some(confidence) if confidence > 0.8 => 0.85,
        Some(confidence) if confidence > 0.6 => 0.75,
        _ => 0.7,
    }
}

async fn synthesize_via_llm(error: &PipelineError, llm: &dyn LlmClient, llm_config: &LlmConfig, ml_confidence: Option<f64>) -> Result<PatchSolution> {
    let language_hint = detect_language_hint(error);
    let confidence_hint = match ml_confidence {
        Some(confidence) => format!("The ML classifier's overall confidence in this error's category/severity/stage is {confidence:.2}.\n"),
        None => String::new(),
    };
    let prompt = ChatMessage::user(format!(
        "Write a minimal shell command to fix the following {language_hint} pipeline error:\n\n{confidence_hint}{}",
        error.message
    ));
    let system = ChatMessage::system("You are a CI/CD auto-remediation assistant. Never suggest destructive or privilege-escalating commands.");

    let request = ChatRequest {
        messages: vec![system, prompt],
        model: llm_config.model.clone(),
        temperature: llm_config.temperature,
        max_tokens: llm_config.max_tokens,
    };

    let response = llm.chat(request).await.map_err(|e| match e {
        aegis_llm::LlmError::Auth(msg) => AegisError::Auth(msg),
        aegis_llm::LlmError::Validation(msg) => AegisError::Validation(msg),
        other => AegisError::Transient(other.to_string()),
    })?;

    let patch_script = response.text.trim().to_string();
    validate_safety(&patch_script)?;

    // §4.6 "LLM path": `is_reversible=false`, no rollback synthesized.
    PatchSolution::new(
        error.error_id.clone(),
        PatchType::AiGenerated,
        patch_script,
        false,
        true,
        success_rate_from_ml_confidence(ml_confidence),
        vec![],
        vec!["manual review required before applying an AI-generated patch".to_string()],
        None,
    )
    .map_err(|_| AegisError::internal("ai-generated patch construction failed"))
}

/// Synthesizes a patch for `error`, trying the template path first and
/// falling back to the LLM path when no template applies (§4.6).
/// `ml_confidence` is the ML classifier's `overall_confidence` for this
/// error, when available, and only affects the LLM path's
/// `estimated_success_rate` (§4.6).
pub async fn synthesize(error: &PipelineError, llm: Option<&dyn LlmClient>, llm_config: &LlmConfig, ml_confidence: Option<f64>) -> Result<PatchSolution> {
    if let Some(template) = template_for(error) {
        validate_safety(&template.patch_script)?;
        if let Some(rollback) = &template.rollback_script {
            validate_safety(rollback)?;
        }
        let patch_type = patch_type_for(error.category).expect("template_for only returns Some for mapped categories");
        return PatchSolution::new(
            error.error_id.clone(),
            patch_type,
            template.patch_script,
            template.is_reversible,
            template.requires_approval,
            template.estimated_success_rate,
            template.dependencies,
            template.validation_steps,
            template.rollback_script,
        )
        .map_err(|_| AegisError::internal("template patch missing rollback script"));
    }

    match llm {
        Some(llm) => synthesize_via_llm(error, llm, llm_config, ml_confidence).await,
        None => Err(AegisError::Policy(format!(
            "no template available for category {} and no llm client configured",
            error.category
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Severity, Stage};
    use async_trait::async_trait;
    use chrono::Utc;

    fn dependency_error() -> PipelineError {
        PipelineError::new(
            "run-1",
            "ModuleNotFoundError: No module named 'requests'",
            Severity::High,
            Category::Dependency,
            Stage::Build,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn template_path_produces_reversible_dependency_patch() {
        let error = dependency_error();
        let solution = synthesize(&error, None, &LlmConfig::default(), None).await.unwrap();
        assert_eq!(solution.patch_type, PatchType::Dependency);
        assert!(solution.is_reversible);
        assert!(solution.patch_script.contains("pip install requests"));
    }

    #[tokio::test]
    async fn permission_template_is_reversible_and_restores_mode_644() {
        let error = PipelineError::new(
            "run-1",
            "EACCES: permission denied, access '/var/log/app.log'",
            Severity::High,
            Category::Permission,
            Stage::Build,
            Utc::now(),
        );
        let solution = synthesize(&error, None, &LlmConfig::default(), None).await.unwrap();
        assert_eq!(solution.patch_type, PatchType::Permission);
        assert!(solution.is_reversible);
        let rollback = solution.rollback_script.expect("permission patch must carry a rollback script");
        assert!(rollback.contains("644"));
        assert!(rollback.contains("/var/log/app.log"));
    }

    #[tokio::test]
    async fn build_category_falls_through_to_llm_or_errors() {
        let error = PipelineError::new("run-1", "generic build failure", Severity::High, Category::Build, Stage::Build, Utc::now());
        let result = synthesize(&error, None, &LlmConfig::default(), None).await;
        assert!(matches!(result, Err(AegisError::Policy(_))));
    }

    struct CannedLlm(&'static str);

    #[async_trait]
    impl LlmClient for CannedLlm {
        async fn chat(&self, _request: ChatRequest) -> std::result::Result<aegis_llm::ChatResponse, aegis_llm::LlmError> {
            Ok(aegis_llm::ChatResponse {
                text: self.0.to_string(),
                usage: aegis_llm::Usage::default(),
            })
        }
    }

    #[tokio::test]
    async fn llm_path_rejects_denylisted_script() {
        let error = PipelineError::new("run-1", "generic build failure", Severity::High, Category::Build, Stage::Build, Utc::now());
        let llm = CannedLlm("rm -rf / --no-preserve-root");
        let result = synthesize(&error, Some(&llm), &LlmConfig::default(), None).await;
        assert!(matches!(result, Err(AegisError::Safety(_))));
    }

    #[tokio::test]
    async fn llm_path_is_never_reversible() {
        let error = PipelineError::new("run-1", "generic build failure", Severity::High, Category::Build, Stage::Build, Utc::now());
        let llm = CannedLlm("echo fixed");
        let solution = synthesize(&error, Some(&llm), &LlmConfig::default(), None).await.unwrap();
        assert_eq!(solution.patch_type, PatchType::AiGenerated);
        assert!(!solution.is_reversible);
        assert!(solution.rollback_script.is_none());
    }

    #[tokio::test]
    async fn llm_path_success_rate_scales_with_ml_confidence() {
        let error = PipelineError::new("run-1", "generic build failure", Severity::High, Category::Build, Stage::Build, Utc::now());
        let llm = CannedLlm("echo fixed");

        let high = synthesize(&error, Some(&llm), &LlmConfig::default(), Some(0.95)).await.unwrap();
        assert!((high.estimated_success_rate - 0.85).abs() < 1e-9);

        let medium = synthesize(&error, Some(&llm), &LlmConfig::default(), Some(0.65)).await.unwrap();
        assert!((medium.estimated_success_rate - 0.75).abs() < 1e-9);

        let low = synthesize(&error, Some(&llm), &LlmConfig::default(), Some(0.3)).await.unwrap();
        assert!((low.estimated_success_rate - 0.7).abs() < 1e-9);

        let unknown = synthesize(&error, Some(&llm), &LlmConfig::default(), None).await.unwrap();
        assert!((unknown.estimated_success_rate - 0.7).abs() < 1e-9);
    }

    #[test]
    fn detects_python_language_hint() {
        let error = dependency_error();
        assert_eq!(detect_language_hint(&error), "python");
    }
}
