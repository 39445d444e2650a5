//! depsync - dependency-ordered artifact deployment
//!
//! ## Commands
//!
//! - `list`: Collect artifacts from the configured source and print them
//! - `plan`: Print the structural (folder-depth) deployment order
//! - `deploy`: Deploy every artifact to the configured target

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};

use depsync_core::config::CONFIG_FILE;
use depsync_core::{
    AdaptiveRetryDeployer, CancelFlag, Collection, DependencyGraphBuilder, DeployMode,
    DeploymentReport, DepsyncConfig, StructuralDeployer, TopologicalSequencer,
};

#[derive(Parser, Debug)]
#[command(name = "depsync")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Deploy automation artifacts in dependency order", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true, env = "DEPSYNC_CONFIG", default_value = CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Collect artifacts and print them with their kind and depth
    List,

    /// Print the structural deployment order without deploying
    Plan,

    /// Deploy all artifacts to the configured target
    Deploy {
        /// Ordering strategy (overrides the config file)
        #[arg(short, long)]
        mode: Option<DeployMode>,

        /// Print the run report as JSON
        #[arg(long)]
        report_json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    depsync_core::telemetry::init_tracing(cli.json, level);

    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::List => cmd_list(&config).await,
        Commands::Plan => cmd_plan(&config).await,
        Commands::Deploy { mode, report_json } => {
            let cancel = CancelFlag::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received; stopping after the current artifact");
                    on_interrupt.cancel();
                }
            });

            let report = cmd_deploy(&config, mode, cancel).await?;
            print_report(&report, report_json)?;
            if !report.is_success() {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

fn load_config(path: &Path) -> Result<DepsyncConfig> {
    DepsyncConfig::load(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

async fn collect(config: &DepsyncConfig) -> Result<Collection> {
    let source = config
        .source()
        .context("Failed to set up artifact source")?;
    let collector = config
        .collector(source.fetcher.clone())
        .context("Failed to prepare scratch storage")?;
    let collection = collector
        .collect_from(source.listing.as_ref())
        .await
        .context("Artifact collection failed")?;
    Ok(collection)
}

async fn cmd_list(config: &DepsyncConfig) -> Result<()> {
    let collection = collect(config).await?;

    println!("Artifacts ({}):", collection.artifacts.len());
    for artifact in &collection.artifacts {
        println!(
            "  {:<32} {:<16} depth {:<3} {}",
            artifact.name, artifact.kind, artifact.folder_depth, artifact.source_path
        );
    }
    print_failures(&collection);
    Ok(())
}

async fn cmd_plan(config: &DepsyncConfig) -> Result<()> {
    let collection = collect(config).await?;
    print_failures(&collection);

    let graph = DependencyGraphBuilder::build(collection.artifacts)
        .context("Failed to build dependency graph")?;
    let plan = TopologicalSequencer::plan(&graph).context("Failed to sequence artifacts")?;

    println!(
        "Deployment order ({} artifacts, {} edges):",
        plan.len(),
        graph.edge_count()
    );
    for step in &plan {
        if step.depends_on.is_empty() {
            println!(
                "  {:>3}. {} (depth {})",
                step.position + 1,
                step.name,
                step.folder_depth
            );
        } else {
            println!(
                "  {:>3}. {} (depth {}) after {}",
                step.position + 1,
                step.name,
                step.folder_depth,
                step.depends_on.join(", ")
            );
        }
    }
    Ok(())
}

async fn cmd_deploy(
    config: &DepsyncConfig,
    mode: Option<DeployMode>,
    cancel: CancelFlag,
) -> Result<DeploymentReport> {
    let mode = mode.unwrap_or(config.mode);
    let client = Arc::new(
        config
            .deployment_client()
            .context("Failed to set up deployment target")?,
    );

    let collection = collect(config).await?;
    print_failures(&collection);
    info!(mode = %mode, artifacts = collection.artifacts.len(), "starting deployment");

    let report = match mode {
        DeployMode::Structural => StructuralDeployer::new(client)
            .with_cancel(cancel)
            .run(collection.artifacts)
            .await
            .context("Structural deployment aborted")?,
        DeployMode::Adaptive => AdaptiveRetryDeployer::new(client)
            .with_cancel(cancel)
            .run(&collection.artifacts)
            .await
            .context("Adaptive deployment aborted")?,
    };
    Ok(report)
}

fn print_failures(collection: &Collection) {
    if collection.failures.is_empty() {
        return;
    }
    println!("Not retrieved ({}):", collection.failures.len());
    for failure in &collection.failures {
        println!("  {}: {}", failure.source_path, failure.detail);
    }
}

fn print_report(report: &DeploymentReport, as_json: bool) -> Result<()> {
    if as_json {
        println!(
            "{}",
            serde_json::to_string_pretty(report).context("Failed to serialize report")?
        );
        return Ok(());
    }

    println!("Run {} ({}): {:?}", report.run_id, report.mode, report.outcome);
    println!(
        "  passes: {}  deployed: {}  failed: {}  pending: {}  ({} ms)",
        report.passes,
        report.deployed_count(),
        report.failed_count(),
        report.pending.len(),
        report.duration_ms()
    );
    for name in &report.deployed {
        println!("  ✓ {}", name);
    }
    for failed in &report.failed {
        println!(
            "  ✗ {} after {} attempt(s): {}",
            failed.name,
            failed.attempts,
            failed.last_error.as_deref().unwrap_or("unknown error")
        );
    }
    for name in &report.pending {
        println!("  - {} (not attempted)", name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config(dir: &Path, command: &str) -> DepsyncConfig {
        let raw = format!(
            r#"
mode = "structural"
scratch_dir = "{scratch}"

[source]
type = "local"
path = "{source}"
root = "runbooks"

[target]
command = ["sh", "-c", "{command}"]
"#,
            scratch = dir.join("scratch").display(),
            source = dir.join("repo").display(),
            command = command,
        );
        DepsyncConfig::from_toml_str(&raw).unwrap()
    }

    fn seed(dir: &Path) {
        let runbooks = dir.join("repo/runbooks");
        std::fs::create_dir_all(runbooks.join("Child")).unwrap();
        std::fs::write(runbooks.join("Parent.ps1"), "Write-Output parent").unwrap();
        std::fs::write(runbooks.join("Child/Leaf.ps1"), "Write-Output leaf").unwrap();
    }

    #[test]
    fn test_parse_deploy_flags() {
        let cli = Cli::try_parse_from([
            "depsync",
            "--json",
            "--config",
            "other.toml",
            "deploy",
            "--mode",
            "structural",
            "--report-json",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.config, PathBuf::from("other.toml"));
        match cli.command {
            Commands::Deploy { mode, report_json } => {
                assert_eq!(mode, Some(DeployMode::Structural));
                assert!(report_json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_mode() {
        assert!(Cli::try_parse_from(["depsync", "deploy", "--mode", "sideways"]).is_err());
    }

    #[test]
    fn test_parse_plan_with_verbose_after_subcommand() {
        let cli = Cli::try_parse_from(["depsync", "plan", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Plan));
    }

    #[tokio::test]
    async fn test_list_and_plan_local_source() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());
        let config = local_config(dir.path(), "exit 0");

        cmd_list(&config).await.unwrap();
        cmd_plan(&config).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_deploy_structural_success() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());
        let config = local_config(dir.path(), "exit 0");

        let report = cmd_deploy(&config, None, CancelFlag::new()).await.unwrap();
        assert!(report.is_success());
        assert_eq!(report.mode, DeployMode::Structural);
        assert_eq!(report.deployed, vec!["Leaf", "Parent"]);
        print_report(&report, true).unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_deploy_adaptive_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());
        let config = local_config(dir.path(), "echo refused >&2; exit 1");

        let report = cmd_deploy(&config, Some(DeployMode::Adaptive), CancelFlag::new())
            .await
            .unwrap();
        assert!(!report.is_success());
        assert_eq!(report.failed_count(), 2);
        assert_eq!(report.failed[0].name, "Leaf");
        assert_eq!(
            report.failed[1].last_error.as_deref(),
            Some("deployment of Parent rejected: refused")
        );
        print_report(&report, false).unwrap();
    }

    #[tokio::test]
    async fn test_missing_config_file_has_context() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(&dir.path().join("depsync.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to load configuration"));
    }
}
