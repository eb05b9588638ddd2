//! AnalysisResult (§3).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub error_id: String,
    pub root_cause: String,
    pub confidence_score: f64,
    pub suggested_solutions: Vec<String>,
    pub prevention_measures: Vec<String>,
}
