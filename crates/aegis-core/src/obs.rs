//! Structured observability events, namespaced dot-separated like the
//! teacher's `aivcs.run` events (`event = "..."` field convention).

use tracing::{info, warn};

pub fn emit_session_command(session_id: &str, command: &str) {
    info!(event = "debug_session.command_processed", session_id, command);
}

pub fn emit_session_error(session_id: &str, error: &str) {
    warn!(event = "debug_session.command_failed", session_id, error);
}

pub fn emit_patch_applied(solution_id: &str, success: bool) {
    info!(event = "patch.applied", solution_id, success);
}

pub fn emit_patch_rolled_back(solution_id: &str) {
    info!(event = "patch.rolled_back", solution_id);
}

pub fn emit_gate_evaluated(target: &str, passed: bool) {
    info!(event = "scan.gate_evaluated", target, passed);
}

pub fn emit_classification(error_id: &str, overall_confidence: f64) {
    info!(event = "log_analyzer.classified", error_id, overall_confidence);
}
