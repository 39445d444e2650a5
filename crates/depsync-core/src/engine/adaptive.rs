use std::sync::Arc;

use tracing::info;

use crate::artifact::Artifact;
use crate::cancel::CancelFlag;
use crate::client::DeploymentClient;
use crate::error::DeployResult;
use crate::metrics::METRICS;
use crate::obs::{self, RunSpan};
use crate::record::{DeployMode, DeploymentReport, RunOutcome};

use super::{ensure_unique_names, RunState};

/// Deploys without a precomputed order by retrying rejected artifacts in
/// passes until every artifact is accepted or a pass makes no progress.
///
/// Each pass walks the still-pending artifacts in collection order. An
/// accepted artifact is never attempted again. For a target that accepts an
/// artifact exactly when its dependencies are present, a dependency chain of
/// length `k` converges in at most `k + 1` passes.
///
/// A pass with zero progress ends the run as [`RunOutcome::Stalled`] and turns
/// every remaining artifact into a failure. This cannot distinguish a cycle
/// from a permanently broken artifact or a flaky target.
pub struct AdaptiveRetryDeployer {
    client: Arc<dyn DeploymentClient>,
    cancel: Option<CancelFlag>,
}

impl AdaptiveRetryDeployer {
    pub fn new(client: Arc<dyn DeploymentClient>) -> Self {
        Self {
            client,
            cancel: None,
        }
    }

    /// Check `flag` before every deploy call.
    pub fn with_cancel(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled)
    }

    /// Run passes over `artifacts` (in collection order) until done.
    ///
    /// Only a duplicate artifact name is an error; every deploy failure is
    /// recorded in the report instead.
    pub async fn run(&self, artifacts: &[Artifact]) -> DeployResult<DeploymentReport> {
        ensure_unique_names(artifacts)?;

        let mut state = RunState::new(DeployMode::Adaptive, artifacts);
        let _span = RunSpan::enter(&state.run_id, DeployMode::Adaptive);
        obs::emit_run_started(&state.run_id, DeployMode::Adaptive, artifacts.len());

        let mut pass: u32 = 0;
        let outcome = 'passes: loop {
            let pending = state.pending_count();
            if pending == 0 {
                break RunOutcome::Completed;
            }

            pass += 1;
            obs::emit_pass_started(pass, pending);
            let mut progress = 0usize;

            for artifact in artifacts {
                let Some(record) = state.records.get_mut(&artifact.name) else {
                    continue;
                };
                if !record.is_pending() {
                    continue;
                }
                if self.cancelled() {
                    info!(pass = pass, artifact = %artifact.name, "cancellation requested");
                    break 'passes RunOutcome::Cancelled;
                }

                METRICS.inc_deploy_attempts();
                match self.client.deploy(artifact).await {
                    Ok(()) => {
                        record.mark_deployed(Some(pass));
                        obs::emit_artifact_deployed(&artifact.name, record.attempts);
                        METRICS.inc_deployed();
                        state.deployed.push(artifact.name.clone());
                        progress += 1;
                    }
                    Err(err) => {
                        record.record_failure(err.to_string());
                        obs::emit_artifact_rejected(&artifact.name, record.attempts, &err);
                    }
                }
            }

            METRICS.inc_passes();
            let remaining = state.pending_count();
            obs::emit_pass_finished(pass, progress, remaining);

            if progress == 0 {
                for record in state.records.values_mut().filter(|r| r.is_pending()) {
                    record.mark_failed();
                }
                break RunOutcome::Stalled;
            }
        };

        Ok(state.finish(artifacts, outcome, pass))
    }
}
