use std::sync::Arc;

use tracing::info;

use crate::artifact::Artifact;
use crate::cancel::CancelFlag;
use crate::client::DeploymentClient;
use crate::error::DeployResult;
use crate::graph::DependencyGraphBuilder;
use crate::metrics::METRICS;
use crate::obs::{self, RunSpan};
use crate::record::{DeployMode, DeploymentReport, RunOutcome};
use crate::sequencer::TopologicalSequencer;

use super::{ensure_unique_names, RunState};

/// Deploys artifacts once each in an order derived from folder depth.
///
/// A rejected artifact is marked failed and the run continues with the next
/// one; nothing is retried and nothing downstream is skipped.
pub struct StructuralDeployer {
    client: Arc<dyn DeploymentClient>,
    cancel: Option<CancelFlag>,
}

impl StructuralDeployer {
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

    /// Build the depth graph over `artifacts`, sequence it and deploy.
    ///
    /// Fails without deploying anything on duplicate names or a cycle.
    pub async fn run(&self, artifacts: Vec<Artifact>) -> DeployResult<DeploymentReport> {
        let graph = DependencyGraphBuilder::build(artifacts)?;
        let ordered = TopologicalSequencer::sequence(graph)?;
        self.deploy_ordered(&ordered).await
    }

    /// Deploy an already sequenced list, front to back.
    pub async fn deploy_ordered(&self, ordered: &[Artifact]) -> DeployResult<DeploymentReport> {
        ensure_unique_names(ordered)?;

        let mut state = RunState::new(DeployMode::Structural, ordered);
        let _span = RunSpan::enter(&state.run_id, DeployMode::Structural);
        obs::emit_run_started(&state.run_id, DeployMode::Structural, ordered.len());

        let mut outcome = RunOutcome::Completed;
        for (position, artifact) in ordered.iter().enumerate() {
            if self
                .cancel
                .as_ref()
                .is_some_and(CancelFlag::is_cancelled)
            {
                info!(position = position, artifact = %artifact.name, "cancellation requested");
                outcome = RunOutcome::Cancelled;
                break;
            }
            let Some(record) = state.records.get_mut(&artifact.name) else {
                continue;
            };

            METRICS.inc_deploy_attempts();
            match self.client.deploy(artifact).await {
                Ok(()) => {
                    record.mark_deployed(None);
                    obs::emit_artifact_deployed(&artifact.name, record.attempts);
                    METRICS.inc_deployed();
                    state.deployed.push(artifact.name.clone());
                }
                Err(err) => {
                    record.record_failure(err.to_string());
                    record.mark_failed();
                    obs::emit_artifact_rejected(&artifact.name, record.attempts, &err);
                }
            }
        }

        METRICS.inc_passes();
        Ok(state.finish(ordered, outcome, 1))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::error::DeployError;

    /// Rejects the named artifacts and records every call.
    struct RejectingClient {
        reject: Vec<&'static str>,
        calls: Mutex<Vec<String>>,
        cancel_after: Option<(usize, CancelFlag)>,
    }

    impl RejectingClient {
        fn new(reject: Vec<&'static str>) -> Self {
            Self {
                reject,
                calls: Mutex::new(Vec::new()),
                cancel_after: None,
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl DeploymentClient for RejectingClient {
        async fn deploy(&self, artifact: &Artifact) -> DeployResult<()> {
            let count = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(artifact.name.clone());
                calls.len()
            };
            if let Some((limit, flag)) = &self.cancel_after {
                if count >= *limit {
                    flag.cancel();
                }
            }
            if self.reject.contains(&artifact.name.as_str()) {
                return Err(DeployError::Rejected {
                    artifact: artifact.name.clone(),
                    reason: "refused".to_string(),
                });
            }
            Ok(())
        }
    }

    fn tree() -> Vec<Artifact> {
        vec![
            Artifact::fixture("Top", &[]),
            Artifact::fixture("Mid", &["Top"]),
            Artifact::fixture("Leaf", &["Top", "Mid"]),
        ]
    }

    #[tokio::test]
    async fn test_deploys_deepest_first() {
        let client = Arc::new(RejectingClient::new(vec![]));
        let report = StructuralDeployer::new(client.clone())
            .run(tree())
            .await
            .unwrap();
        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.passes, 1);
        assert_eq!(client.calls(), vec!["Leaf", "Mid", "Top"]);
        assert!(report.is_success());
    }

    #[tokio::test]
    async fn test_failure_recorded_and_run_continues() {
        let client = Arc::new(RejectingClient::new(vec!["Mid"]));
        let report = StructuralDeployer::new(client.clone())
            .run(tree())
            .await
            .unwrap();
        assert_eq!(client.calls(), vec!["Leaf", "Mid", "Top"]);
        assert_eq!(report.deployed, vec!["Leaf", "Top"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].name, "Mid");
        assert_eq!(report.failed[0].attempts, 1);
        assert_eq!(report.outcome, RunOutcome::Completed);
        assert!(!report.is_success());
    }

    #[tokio::test]
    async fn test_cancellation_leaves_rest_pending() {
        let flag = CancelFlag::new();
        let mut client = RejectingClient::new(vec![]);
        client.cancel_after = Some((1, flag.clone()));
        let client = Arc::new(client);

        let report = StructuralDeployer::new(client.clone())
            .with_cancel(flag)
            .run(tree())
            .await
            .unwrap();
        assert_eq!(report.outcome, RunOutcome::Cancelled);
        assert_eq!(report.deployed, vec!["Leaf"]);
        assert_eq!(report.pending, vec!["Mid", "Top"]);
        assert!(report.failed.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_names_are_fatal() {
        let client = Arc::new(RejectingClient::new(vec![]));
        let artifacts = vec![
            Artifact::fixture("Twin", &["a"]),
            Artifact::fixture("Twin", &["b"]),
        ];
        let err = StructuralDeployer::new(client.clone())
            .run(artifacts)
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::DuplicateArtifact { .. }));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_name_is_fatal() {
        let client = Arc::new(RejectingClient::new(vec![]));
        let mut artifacts = tree();
        artifacts[1].name = String::new();

        let err = StructuralDeployer::new(client.clone())
            .run(artifacts.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::UnnamedArtifact { .. }));

        let err = StructuralDeployer::new(client.clone())
            .deploy_ordered(&artifacts)
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(client.calls().is_empty());
    }
}
