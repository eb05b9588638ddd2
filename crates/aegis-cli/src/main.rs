//! Thin demonstration harness wiring the Aegis library crates together.
//!
//! Carries no business logic of its own (§1 "Out of scope"): every
//! subcommand below is a direct call into `aegis-core`, `aegis-scan`, or
//! `aegis-gateway`, with just enough local state (adapters, stores,
//! registries) to make the call meaningful from a terminal. Modeled on the
//! teacher's `aivcs-cli` subcommand layout.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::Level;

mod debug;
mod gateway;
mod scan;

#[derive(Parser)]
#[command(name = "aegis")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Aegis: AI-assisted CI/CD self-healing, scanning, and gateway core", long_about = None)]
struct Cli {
    /// Enable verbose (debug-level) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Self-Healing Debugger: analyze a log, synthesize and dry-run a
    /// patch for the first classified error, then print a session summary.
    Debug {
        /// Path to a pipeline log file
        #[arg(short, long)]
        log_file: PathBuf,

        /// Pipeline identifier this log belongs to
        #[arg(short, long, default_value = "local-pipeline")]
        pipeline_id: String,

        /// Apply (not just dry-run) the synthesized patch for the first error
        #[arg(long)]
        apply: bool,
    },

    /// Security Scan Orchestrator: run the configured adapters against a
    /// repo/commit, gate the result, and emit + sign an SBOM on pass.
    Scan {
        #[arg(short, long)]
        repo_url: String,

        #[arg(short, long)]
        commit_sha: String,

        /// Comma-separated scan types: container,project,webapp
        #[arg(long, default_value = "project")]
        scan_types: String,

        /// Lowest severity that can fail the gate
        #[arg(long, default_value = "high")]
        blocking_severity: String,

        /// Policy environment: development, staging, or production
        #[arg(long, default_value = "development")]
        environment: String,

        /// Directory SBOM + signature artifacts are written under
        #[arg(long, default_value = "artifacts")]
        artifact_storage_path: PathBuf,
    },

    /// Gateway Policy Engine: issue a token, then route one demo request
    /// through the full auth → rate-limit → circuit-breaker → cache → \
    /// forward pipeline.
    Gateway {
        /// Backend URL the demo route forwards GET /status to
        #[arg(long, default_value = "https://httpbin.org/get")]
        backend_url: String,
    },

    /// Print a rollup health report over the wired-up subsystems.
    Health,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    aegis_core::telemetry::init_tracing(cli.json, level);

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(run(cli.command))
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Debug { log_file, pipeline_id, apply } => debug::run(log_file, pipeline_id, apply).await,
        Commands::Scan {
            repo_url,
            commit_sha,
            scan_types,
            blocking_severity,
            environment,
            artifact_storage_path,
        } => {
            scan::run(scan::ScanArgs {
                repo_url,
                commit_sha,
                scan_types,
                blocking_severity,
                environment,
                artifact_storage_path,
            })
            .await
        }
        Commands::Gateway { backend_url } => gateway::run(backend_url).await,
        Commands::Health => health().await,
    }
}

async fn health() -> Result<()> {
    use aegis_core::health::{ComponentHealth, ComponentStatus, HealthReport};
    use chrono::Utc;

    let now = Utc::now();
    let report = HealthReport {
        components: vec![
            ComponentHealth {
                name: "historical-error-store".to_string(),
                status: ComponentStatus::Healthy,
                last_checked: now,
                detail: None,
            },
            ComponentHealth {
                name: "llm-client".to_string(),
                status: ComponentStatus::Healthy,
                last_checked: now,
                detail: Some("stub client: no provider configured".to_string()),
            },
        ],
        computed_at: now,
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    println!("overall: {:?}", report.overall());
    Ok(())
}

/// Constructs an `Arc<aegis_core::patch_runner::ShellExecutor>` once so
/// every subcommand that needs to shell out (patch application, scanner
/// adapters) shares the same executor type.
pub(crate) fn shell_executor() -> Arc<dyn aegis_core::patch_runner::CommandExecutor> {
    Arc::new(aegis_core::patch_runner::ShellExecutor)
}
