//! Per-run deployment state and the end-of-run report.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a single artifact within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Pending,
    Deployed,
    Failed,
}

/// Mutable per-artifact state owned by a deployer for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRecord {
    pub status: DeploymentStatus,
    /// Number of deploy calls made for this artifact.
    pub attempts: u32,
    pub last_error: Option<String>,
    /// Pass in which the target accepted the artifact (adaptive mode).
    pub deployed_in_pass: Option<u32>,
}

impl Default for DeploymentRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl DeploymentRecord {
    pub fn new() -> Self {
        Self {
            status: DeploymentStatus::Pending,
            attempts: 0,
            last_error: None,
            deployed_in_pass: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == DeploymentStatus::Pending
    }

    pub(crate) fn mark_deployed(&mut self, pass: Option<u32>) {
        self.attempts += 1;
        self.status = DeploymentStatus::Deployed;
        self.deployed_in_pass = pass;
    }

    /// Record a rejected attempt; the artifact stays `Pending`.
    pub(crate) fn record_failure(&mut self, error: String) {
        self.attempts += 1;
        self.last_error = Some(error);
    }

    pub(crate) fn mark_failed(&mut self) {
        self.status = DeploymentStatus::Failed;
    }
}

/// Which strategy produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployMode {
    /// Order derived from folder depth.
    Structural,
    /// Order discovered by repeated trial deployment.
    Adaptive,
}

impl fmt::Display for DeployMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployMode::Structural => f.write_str("structural"),
            DeployMode::Adaptive => f.write_str("adaptive"),
        }
    }
}

impl std::str::FromStr for DeployMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "structural" => Ok(DeployMode::Structural),
            "adaptive" | "flat" => Ok(DeployMode::Adaptive),
            other => Err(format!("unknown deploy mode: {}", other)),
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every artifact was attempted (structural) or deployed (adaptive).
    Completed,
    /// Adaptive mode: a full pass made no progress.
    Stalled,
    /// The cancellation flag was raised; remaining artifacts stay pending.
    Cancelled,
}

/// An artifact that ended the run `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedArtifact {
    pub name: String,
    pub attempts: u32,
    pub last_error: Option<String>,
}

/// End-of-run summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentReport {
    pub run_id: String,
    pub mode: DeployMode,
    pub outcome: RunOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Passes executed (structural runs always report one).
    pub passes: u32,
    /// Deployed artifact names in deployment order.
    pub deployed: Vec<String>,
    pub failed: Vec<FailedArtifact>,
    /// Artifacts never resolved (only after cancellation).
    pub pending: Vec<String>,
}

impl DeploymentReport {
    pub fn deployed_count(&self) -> usize {
        self.deployed.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    /// Zero failures and not cancelled.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.pending.is_empty() && self.outcome != RunOutcome::Cancelled
    }

    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }
}
