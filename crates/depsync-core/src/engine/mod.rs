//! Deployment engines.
//!
//! [`AdaptiveRetryDeployer`] discovers a valid order by repeated trial
//! deployment. [`StructuralDeployer`] deploys an order derived from folder
//! depth exactly once. Both own their per-artifact [`DeploymentRecord`]s for
//! the duration of one run and return a [`DeploymentReport`].

mod adaptive;
mod structural;

pub use adaptive::AdaptiveRetryDeployer;
pub use structural::StructuralDeployer;

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::artifact::Artifact;
use crate::error::{DeployError, DeployResult};
use crate::metrics::METRICS;
use crate::obs;
use crate::record::{
    DeployMode, DeploymentRecord, DeploymentReport, DeploymentStatus, FailedArtifact, RunOutcome,
};

/// Reject runs in which an artifact has no name or two artifacts share one.
///
/// Records are keyed by name, so a duplicate would silently merge two
/// artifacts' state.
pub(crate) fn ensure_unique_names(artifacts: &[Artifact]) -> DeployResult<()> {
    let mut seen: HashMap<&str, &Artifact> = HashMap::with_capacity(artifacts.len());
    for artifact in artifacts {
        if artifact.name.is_empty() {
            return Err(DeployError::UnnamedArtifact {
                path: artifact.source_path.clone(),
            });
        }
        if let Some(first) = seen.insert(artifact.name.as_str(), artifact) {
            return Err(DeployError::DuplicateArtifact {
                name: artifact.name.clone(),
                first: first.source_path.clone(),
                second: artifact.source_path.clone(),
            });
        }
    }
    Ok(())
}

pub(crate) fn new_run_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Per-run state shared by both engines.
pub(crate) struct RunState {
    pub run_id: String,
    pub mode: DeployMode,
    pub started_at: DateTime<Utc>,
    pub records: HashMap<String, DeploymentRecord>,
    /// Deployed names in the order the target accepted them.
    pub deployed: Vec<String>,
}

impl RunState {
    pub fn new(mode: DeployMode, artifacts: &[Artifact]) -> Self {
        Self {
            run_id: new_run_id(),
            mode,
            started_at: Utc::now(),
            records: artifacts
                .iter()
                .map(|a| (a.name.clone(), DeploymentRecord::new()))
                .collect(),
            deployed: Vec::new(),
        }
    }

    pub fn pending_count(&self) -> usize {
        self.records.values().filter(|r| r.is_pending()).count()
    }

    /// Build the report, listing failed and pending artifacts in `order`.
    pub fn finish(self, order: &[Artifact], outcome: RunOutcome, passes: u32) -> DeploymentReport {
        let mut failed = Vec::new();
        let mut pending = Vec::new();
        let mut listed = HashSet::new();

        for artifact in order {
            if !listed.insert(artifact.name.as_str()) {
                continue;
            }
            let Some(record) = self.records.get(&artifact.name) else {
                continue;
            };
            match record.status {
                DeploymentStatus::Deployed => {}
                DeploymentStatus::Pending => pending.push(artifact.name.clone()),
                DeploymentStatus::Failed => {
                    obs::emit_artifact_failed(
                        &artifact.name,
                        record.attempts,
                        record.last_error.as_deref(),
                    );
                    METRICS.inc_failed();
                    failed.push(FailedArtifact {
                        name: artifact.name.clone(),
                        attempts: record.attempts,
                        last_error: record.last_error.clone(),
                    });
                }
            }
        }

        let report = DeploymentReport {
            run_id: self.run_id,
            mode: self.mode,
            outcome,
            started_at: self.started_at,
            finished_at: Utc::now(),
            passes,
            deployed: self.deployed,
            failed,
            pending,
        };

        obs::emit_run_finished(
            &report.run_id,
            report.outcome,
            report.deployed_count(),
            report.failed_count(),
            report.passes,
            report.duration_ms(),
        );
        METRICS.flush();
        report
    }
}
