//! PatchSolution (§3). Grounded on the teacher's `domain::ci::repair`
//! builder-style construction (`PatchCommit`/`RepairPlan`), generalized to
//! the richer PatchSolution shape the spec describes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchType {
    Dependency,
    Permission,
    Configuration,
    Network,
    Resource,
    Test,
    Security,
    AiGenerated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchSolution {
    pub solution_id: String,
    pub error_id: String,
    pub patch_type: PatchType,
    pub patch_script: String,
    pub is_reversible: bool,
    pub requires_approval: bool,
    pub estimated_success_rate: f64,
    pub dependencies: Vec<String>,
    pub validation_steps: Vec<String>,
    pub rollback_script: Option<String>,
}

/// Construction-time violation of the `is_reversible` ⟹ `rollback_script`
/// invariant (§3).
#[derive(Debug)]
pub struct MissingRollbackScript;

impl PatchSolution {
    /// Builds a `PatchSolution`, enforcing the invariant that a reversible
    /// patch always carries a rollback script.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        error_id: impl Into<String>,
        patch_type: PatchType,
        patch_script: impl Into<String>,
        is_reversible: bool,
        requires_approval: bool,
        estimated_success_rate: f64,
        dependencies: Vec<String>,
        validation_steps: Vec<String>,
        rollback_script: Option<String>,
    ) -> Result<Self, MissingRollbackScript> {
        if is_reversible && rollback_script.as_deref().unwrap_or("").is_empty() {
            return Err(MissingRollbackScript);
        }
        Ok(Self {
            solution_id: crate::ids::new_solution_id(),
            error_id: error_id.into(),
            patch_type,
            patch_script: patch_script.into(),
            is_reversible,
            requires_approval,
            estimated_success_rate,
            dependencies,
            validation_steps,
            rollback_script,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reversible_without_rollback_script_is_rejected() {
        let result = PatchSolution::new(
            "err-1",
            PatchType::Dependency,
            "pip install requests",
            true,
            false,
            0.9,
            vec![],
            vec![],
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn reversible_with_rollback_script_succeeds() {
        let result = PatchSolution::new(
            "err-1",
            PatchType::Dependency,
            "pip install requests",
            true,
            false,
            0.9,
            vec![],
            vec![],
            Some("pip uninstall -y requests".to_string()),
        );
        assert!(result.is_ok());
    }
}
