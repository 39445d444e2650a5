//! Structured observability hooks for deployment runs.
//!
//! This module provides:
//! - Run-scoped tracing spans via the `RunSpan` RAII guard
//! - Emission functions for run, pass and per-artifact lifecycle events
//!
//! Events are emitted at `info!` level unless noted. Filtering follows
//! `RUST_LOG`; see [`crate::telemetry::init_tracing`].

use tracing::{debug, info, warn};

use crate::record::{DeployMode, RunOutcome};

/// RAII guard that enters a run-scoped tracing span for the duration of a run.
///
/// # Example
///
/// ```ignore
/// let _span = RunSpan::enter("3f0c...", DeployMode::Adaptive);
/// // Every tracing call is now tagged with run_id and mode.
/// ```
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    /// Create and enter a span tagged with the run id and mode.
    pub fn enter(run_id: &str, mode: DeployMode) -> Self {
        let span = tracing::info_span!("depsync.run", run_id = %run_id, mode = %mode);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: run started with the number of artifacts.
pub fn emit_run_started(run_id: &str, mode: DeployMode, artifacts: usize) {
    info!(event = "run.started", run_id = %run_id, mode = %mode, artifacts = artifacts);
}

/// Emit event: adaptive pass started.
pub fn emit_pass_started(pass: u32, pending: usize) {
    info!(event = "pass.started", pass = pass, pending = pending);
}

/// Emit event: adaptive pass finished with its progress count.
pub fn emit_pass_finished(pass: u32, progress: usize, remaining: usize) {
    info!(
        event = "pass.finished",
        pass = pass,
        progress = progress,
        remaining = remaining,
    );
}

/// Emit event: the target accepted an artifact.
pub fn emit_artifact_deployed(name: &str, attempts: u32) {
    info!(event = "artifact.deployed", artifact = %name, attempts = attempts);
}

/// Emit event: the target rejected an attempt (debug level; rejections are
/// expected while dependencies are still missing).
pub fn emit_artifact_rejected(name: &str, attempts: u32, error: &dyn std::fmt::Display) {
    debug!(event = "artifact.rejected", artifact = %name, attempts = attempts, error = %error);
}

/// Emit event: an artifact ended the run failed (warning level).
pub fn emit_artifact_failed(name: &str, attempts: u32, error: Option<&str>) {
    warn!(
        event = "artifact.failed",
        artifact = %name,
        attempts = attempts,
        error = error.unwrap_or("unknown"),
    );
}

/// Emit event: run finished.
pub fn emit_run_finished(
    run_id: &str,
    outcome: RunOutcome,
    deployed: usize,
    failed: usize,
    passes: u32,
    duration_ms: u64,
) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        outcome = ?outcome,
        deployed = deployed,
        failed = failed,
        passes = passes,
        duration_ms = duration_ms,
    );
}
