//! Patch Runner (C7): dry-run, apply, validate, and rollback of
//! [`PatchSolution`]s.
//!
//! State machine (§4.7):
//!
//! ```text
//!          synthesize
//! candidate ─────────► staged
//! staged ── dry_run ──► simulated(ok|fail)
//! staged ── apply(approved?) ──► applied(ok|fail)
//! applied ── rollback(if reversible) ──► rolled_back
//! ```
//!
//! Grounded on the teacher's `sandbox::execution` timeout/backoff shape for
//! the bounded wall-clock execution, and on `oxidized-state`'s
//! single-writer-many-readers ledger discipline for the applied-patches
//! registry (`aegis_state::AppliedPatchRegistry`).

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use aegis_state::{AppliedPatchRecord, AppliedPatchRegistry, StorageError};

use crate::domain::PatchSolution;
use crate::error::{AegisError, Result};
use crate::obs;
use crate::patch_synthesizer::validate_safety;

/// Default wall-clock timeout for executing a patch or rollback script
/// (§4.7 "apply ... bounded wall-clock timeout (default 300s)").
pub const DEFAULT_APPLY_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Executes a single shell command, bounded by a wall-clock timeout.
/// Abstracted so tests can supply a canned executor instead of shelling out.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn run(&self, command: &str, timeout: Duration) -> Result<CommandOutcome>;
}

/// Shells out to `/bin/sh -c <command>`; the child process is killed if the
/// timeout elapses before it exits (§5 "aborts the child process").
pub struct ShellExecutor;

#[async_trait]
impl CommandExecutor for ShellExecutor {
    async fn run(&self, command: &str, timeout: Duration) -> Result<CommandOutcome> {
        let child = tokio::process::Command::new("/bin/sh")
            .arg("-c")
            .arg(command)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let mut child = child.map_err(|e| AegisError::internal(format!("failed to spawn patch script: {e}")))?;

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(CommandOutcome {
                success: output.status.success(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }),
            Ok(Err(e)) => Err(AegisError::internal(format!("patch script execution failed: {e}"))),
            Err(_elapsed) => Err(AegisError::Transient("patch script timed out".to_string())),
        }
    }
}

/// Which package manager a declared dependency is routed to, determined by
/// a `pip:`/`npm:` prefix; a bare name is `Unspecified` (§4.7 "prefix-
/// dispatched to pip / npm / unspecified").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyManager {
    Pip(String),
    Npm(String),
    Unspecified(String),
}

pub fn dependency_manager(dependency: &str) -> DependencyManager {
    if let Some(pkg) = dependency.strip_prefix("pip:") {
        DependencyManager::Pip(pkg.to_string())
    } else if let Some(pkg) = dependency.strip_prefix("npm:") {
        DependencyManager::Npm(pkg.to_string())
    } else {
        DependencyManager::Unspecified(dependency.to_string())
    }
}

impl DependencyManager {
    /// The install command for this dependency, or `None` for an
    /// unspecified manager — the dry-run still treats it as resolvable
    /// (no manager to fail against), but apply has nothing to execute.
    fn install_command(&self) -> Option<String> {
        match self {
            DependencyManager::Pip(pkg) => Some(format!("pip install {pkg}")),
            DependencyManager::Npm(pkg) => Some(format!("npm install {pkg}")),
            DependencyManager::Unspecified(_) => None,
        }
    }
}

pub struct PatchRunner {
    registry: std::sync::Arc<dyn AppliedPatchRegistry>,
    executor: std::sync::Arc<dyn CommandExecutor>,
    timeout: Duration,
    /// Guards "at most one apply per solution_id at a time" (§4.7
    /// "Concurrency"); dry_run does not participate in this guard since
    /// multiple dry_runs may proceed in parallel.
    applying: Mutex<HashSet<String>>,
}

impl PatchRunner {
    pub fn new(registry: std::sync::Arc<dyn AppliedPatchRegistry>, executor: std::sync::Arc<dyn CommandExecutor>) -> Self {
        Self {
            registry,
            executor,
            timeout: DEFAULT_APPLY_TIMEOUT,
            applying: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validates safety and dependency resolvability without executing any
    /// side-effecting command. Returns `true` on success (§4.7 "returns
    /// `true` on success").
    pub fn dry_run(&self, patch: &PatchSolution) -> Result<bool> {
        if patch.patch_script.trim().is_empty() {
            return Err(AegisError::Validation("patch script is empty".to_string()));
        }
        validate_safety(&patch.patch_script)?;
        if let Some(rollback) = &patch.rollback_script {
            validate_safety(rollback)?;
        }
        for dependency in &patch.dependencies {
            if dependency.trim().is_empty() {
                return Err(AegisError::Validation("dependency name is empty".to_string()));
            }
            // Resolvability is a name-shape check only; dry_run never
            // contacts a real package index.
            let _ = dependency_manager(dependency);
        }
        Ok(true)
    }

    /// Installs dependencies, executes the patch script, then each
    /// validation step in order; on any failure the apply is aborted
    /// without recording the patch (§4.7 "apply").
    pub async fn apply(&self, patch: &PatchSolution, approved: bool) -> Result<()> {
        if patch.requires_approval && !approved {
            return Err(AegisError::Policy(format!(
                "patch {} requires approval before it can be applied",
                patch.solution_id
            )));
        }

        {
            let mut applying = self.applying.lock().unwrap();
            if !applying.insert(patch.solution_id.clone()) {
                return Err(AegisError::Conflict(format!("patch {} is already being applied", patch.solution_id)));
            }
        }

        let result = self.apply_inner(patch).await;

        self.applying.lock().unwrap().remove(&patch.solution_id);
        obs::emit_patch_applied(&patch.solution_id, result.is_ok());
        result
    }

    async fn apply_inner(&self, patch: &PatchSolution) -> Result<()> {
        if self.registry.get(&patch.solution_id).await?.is_some() {
            return Err(AegisError::Conflict(format!("patch {} has already been applied", patch.solution_id)));
        }

        self.dry_run(patch)?;

        for dependency in &patch.dependencies {
            if let Some(install) = dependency_manager(dependency).install_command() {
                let outcome = self.executor.run(&install, self.timeout).await?;
                if !outcome.success {
                    return Err(AegisError::Validation(format!(
                        "dependency install failed for {dependency}: {}",
                        outcome.stderr
                    )));
                }
            }
        }

        let outcome = self.executor.run(&patch.patch_script, self.timeout).await?;
        if !outcome.success {
            return Err(AegisError::Validation(format!("patch script failed: {}", outcome.stderr)));
        }

        for step in &patch.validation_steps {
            let outcome = self.executor.run(step, self.timeout).await?;
            if !outcome.success {
                return Err(AegisError::Validation(format!("validation step failed: {step}")));
            }
        }

        let record = AppliedPatchRecord {
            solution_id: patch.solution_id.clone(),
            error_id: patch.error_id.clone(),
            applied_at: Utc::now(),
            payload: serde_json::to_value(patch)?,
        };
        match self.registry.insert(record).await {
            Ok(()) => Ok(()),
            Err(StorageError::AlreadyApplied { solution_id }) => Err(AegisError::Conflict(format!("patch {solution_id} has already been applied"))),
            Err(other) => Err(other.into()),
        }
    }

    /// Looks up the applied patch by `solution_id`, requires it is
    /// reversible with a rollback script, executes the rollback, then
    /// removes it from the registry. Idempotent: rolling back twice
    /// returns `NotFound` the second time (§4.7 "Idempotency").
    pub async fn rollback(&self, solution_id: &str) -> Result<()> {
        let record = self
            .registry
            .get(solution_id)
            .await?
            .ok_or_else(|| AegisError::NotFound(format!("no applied patch with solution_id {solution_id}")))?;

        let patch: PatchSolution = serde_json::from_value(record.payload)?;
        if !patch.is_reversible {
            return Err(AegisError::Validation(format!("patch {solution_id} is not reversible")));
        }
        let rollback_script = patch
            .rollback_script
            .as_deref()
            .ok_or_else(|| AegisError::Validation(format!("patch {solution_id} has no rollback script")))?;

        validate_safety(rollback_script)?;
        let outcome = self.executor.run(rollback_script, self.timeout).await?;
        if !outcome.success {
            return Err(AegisError::Validation(format!("rollback script failed: {}", outcome.stderr)));
        }

        self.registry.remove(solution_id).await?;
        obs::emit_patch_rolled_back(solution_id);
        Ok(())
    }

    pub async fn applied_patches(&self) -> Result<Vec<AppliedPatchRecord>> {
        Ok(self.registry.list().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PatchType;
    use aegis_state::MemoryAppliedPatchRegistry;
    use std::sync::Arc;
    use tokio::sync::Mutex as AsyncMutex;

    struct FakeExecutor {
        fail_commands: Vec<String>,
        calls: AsyncMutex<Vec<String>>,
    }

    impl FakeExecutor {
        fn new(fail_commands: Vec<&str>) -> Self {
            Self {
                fail_commands: fail_commands.into_iter().map(String::from).collect(),
                calls: AsyncMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CommandExecutor for FakeExecutor {
        async fn run(&self, command: &str, _timeout: Duration) -> Result<CommandOutcome> {
            self.calls.lock().await.push(command.to_string());
            let success = !self.fail_commands.iter().any(|f| command.contains(f.as_str()));
            Ok(CommandOutcome {
                success,
                stdout: String::new(),
                stderr: if success { String::new() } else { "simulated failure".to_string() },
            })
        }
    }

    fn reversible_patch() -> PatchSolution {
        PatchSolution::new(
            "err-1",
            PatchType::Dependency,
            "pip install requests",
            true,
            false,
            0.9,
            vec!["pip:requests".to_string()],
            vec!["echo ok".to_string()],
            Some("pip uninstall -y requests".to_string()),
        )
        .unwrap()
    }

    fn runner(fail: Vec<&str>) -> PatchRunner {
        PatchRunner::new(Arc::new(MemoryAppliedPatchRegistry::new()), Arc::new(FakeExecutor::new(fail)))
    }

    #[test]
    fn dry_run_accepts_a_well_formed_patch() {
        let runner = runner(vec![]);
        assert!(runner.dry_run(&reversible_patch()).unwrap());
    }

    #[test]
    fn dry_run_rejects_denylisted_script() {
        let runner = runner(vec![]);
        let mut patch = reversible_patch();
        patch.patch_script = "rm -rf /".to_string();
        assert!(matches!(runner.dry_run(&patch), Err(AegisError::Safety(_))));
    }

    #[tokio::test]
    async fn apply_requires_approval_when_flagged() {
        let runner = runner(vec![]);
        let mut patch = reversible_patch();
        patch.requires_approval = true;
        let err = runner.apply(&patch, false).await.unwrap_err();
        assert!(matches!(err, AegisError::Policy(_)));
    }

    #[tokio::test]
    async fn apply_then_reapply_is_rejected() {
        let runner = runner(vec![]);
        let patch = reversible_patch();
        runner.apply(&patch, true).await.unwrap();
        let err = runner.apply(&patch, true).await.unwrap_err();
        assert!(matches!(err, AegisError::Conflict(_)));
    }

    #[tokio::test]
    async fn failed_validation_step_aborts_apply() {
        let runner = runner(vec!["echo ok"]);
        let patch = reversible_patch();
        let err = runner.apply(&patch, true).await.unwrap_err();
        assert!(matches!(err, AegisError::Validation(_)));
        assert!(runner.applied_patches().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn apply_then_rollback_removes_from_registry() {
        let runner = runner(vec![]);
        let patch = reversible_patch();
        runner.apply(&patch, true).await.unwrap();
        runner.rollback(&patch.solution_id).await.unwrap();
        assert!(runner.applied_patches().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rollback_is_idempotent_second_call_not_found() {
        let runner = runner(vec![]);
        let patch = reversible_patch();
        runner.apply(&patch, true).await.unwrap();
        runner.rollback(&patch.solution_id).await.unwrap();
        let err = runner.rollback(&patch.solution_id).await.unwrap_err();
        assert!(matches!(err, AegisError::NotFound(_)));
    }

    #[tokio::test]
    async fn rollback_of_irreversible_patch_is_rejected() {
        let runner = runner(vec![]);
        let mut patch = reversible_patch();
        patch.is_reversible = false;
        patch.rollback_script = None;
        // bypass the constructor invariant to exercise the runner's own guard
        runner.apply(&patch, true).await.unwrap();
        let err = runner.rollback(&patch.solution_id).await.unwrap_err();
        assert!(matches!(err, AegisError::Validation(_)));
    }
}
