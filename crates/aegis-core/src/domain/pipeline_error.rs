//! PipelineError and its enumerations (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Dependency,
    Permission,
    Configuration,
    Network,
    Resource,
    Build,
    Test,
    Deployment,
    Security,
    Unknown,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Category::Dependency => "dependency",
            Category::Permission => "permission",
            Category::Configuration => "configuration",
            Category::Network => "network",
            Category::Resource => "resource",
            Category::Build => "build",
            Category::Test => "test",
            Category::Deployment => "deployment",
            Category::Security => "security",
            Category::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Checkout,
    Build,
    Test,
    SecurityScan,
    Deploy,
    PostDeploy,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Checkout => "checkout",
            Stage::Build => "build",
            Stage::Test => "test",
            Stage::SecurityScan => "security_scan",
            Stage::Deploy => "deploy",
            Stage::PostDeploy => "post_deploy",
        };
        write!(f, "{s}")
    }
}

/// Immutable once created; `error_id` unique within a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineError {
    pub error_id: String,
    pub pipeline_id: String,
    pub message: String,
    pub stack_trace: Option<String>,
    pub severity: Severity,
    pub category: Category,
    pub stage: Stage,
    pub timestamp: DateTime<Utc>,
    pub context: Context,
}

impl PipelineError {
    pub fn new(
        pipeline_id: impl Into<String>,
        message: impl Into<String>,
        severity: Severity,
        category: Category,
        stage: Stage,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            error_id: crate::ids::new_error_id(),
            pipeline_id: pipeline_id.into(),
            message: message.into(),
            stack_trace: None,
            severity,
            category,
            stage,
            timestamp,
            context: Context::new(),
        }
    }

    pub fn with_stack_trace(mut self, trace: impl Into<String>) -> Self {
        self.stack_trace = Some(trace.into());
        self
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }
}
