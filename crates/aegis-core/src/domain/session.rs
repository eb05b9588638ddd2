//! DebugSession data model (§3). Mutation is owned exclusively by the
//! Debug Session Core (C8, see `crate::debug_session`); this module only
//! defines the shape readers snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::analysis::AnalysisResult;
use super::patch::PatchSolution;
use super::pipeline_error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
    Aborted,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Aborted)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    AnalysisResult { analysis: AnalysisResult },
    PatchSolution { patch: PatchSolution },
    PatchApplied { solution_id: String, success: bool },
    PatchRollback { solution_id: String, success: bool },
    BatchSummary { applied: usize, failed: usize },
    SessionExported { format: String, content: String },
    SessionSummary { summary: serde_json::Value },
    CommandHistory { commands: Vec<String> },
    MlResult { result: serde_json::Value },
    Error { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugSession {
    pub session_id: String,
    pub pipeline_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub errors: Vec<PipelineError>,
    pub analyses: Vec<AnalysisResult>,
    pub applied_patches: Vec<PatchSolution>,
    pub command_history: Vec<String>,
    /// Append-only trail of every event a command produced, oldest first.
    pub events: Vec<SessionEvent>,
}

impl DebugSession {
    pub fn new(pipeline_id: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            session_id: crate::ids::new_session_id(),
            pipeline_id: pipeline_id.into(),
            start_time,
            end_time: None,
            status: SessionStatus::Active,
            errors: Vec::new(),
            analyses: Vec::new(),
            applied_patches: Vec::new(),
            command_history: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn events_push(&mut self, event: SessionEvent) {
        self.events.push(event);
    }
}
