//! The deployment target, seen through a narrow trait.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::artifact::Artifact;
use crate::error::{DeployError, DeployResult};

/// Deploys one artifact to the target.
///
/// The engine never calls `deploy` again for an artifact that already
/// succeeded in the current run. It makes no assumption about why a call
/// fails: failure is retryable in principle, success is durable.
///
/// Inject a real implementation that talks to the automation target, or a
/// stub for tests.
#[async_trait::async_trait]
pub trait DeploymentClient: Send + Sync {
    async fn deploy(&self, artifact: &Artifact) -> DeployResult<()>;
}

/// Deploys by running an external command once per artifact.
///
/// The artifact's scratch path is appended as the last argument and exposed,
/// together with its name and kind, through `DEPSYNC_ARTIFACT_*` environment
/// variables. Exit status zero means the target accepted the artifact.
#[derive(Debug, Clone)]
pub struct CommandDeploymentClient {
    command: Vec<String>,
    timeout: Option<Duration>,
}

impl CommandDeploymentClient {
    pub fn new(command: Vec<String>) -> DeployResult<Self> {
        if command.first().map_or(true, |exe| exe.trim().is_empty()) {
            return Err(DeployError::Config(
                "deployment command must not be empty".to_string(),
            ));
        }
        Ok(Self {
            command,
            timeout: None,
        })
    }

    /// Zero disables the timeout.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        self
    }

    fn rejected(artifact: &Artifact, reason: impl Into<String>) -> DeployError {
        DeployError::Rejected {
            artifact: artifact.name.clone(),
            reason: reason.into(),
        }
    }
}

#[async_trait::async_trait]
impl DeploymentClient for CommandDeploymentClient {
    async fn deploy(&self, artifact: &Artifact) -> DeployResult<()> {
        let Some(path) = artifact.local_path.as_ref() else {
            return Err(Self::rejected(artifact, "artifact has no local copy"));
        };

        let exe = &self.command[0];
        let args = &self.command[1..];
        debug!(artifact = %artifact.name, command = %exe, "running deployment command");

        let child = Command::new(exe)
            .args(args)
            .arg(path)
            .env("DEPSYNC_ARTIFACT_NAME", &artifact.name)
            .env("DEPSYNC_ARTIFACT_KIND", artifact.kind.name())
            .env("DEPSYNC_ARTIFACT_PATH", path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| {
                    Self::rejected(
                        artifact,
                        format!("timed out after {} seconds", limit.as_secs()),
                    )
                })??,
            None => child.wait_with_output().await?,
        };

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let reason = if stderr.is_empty() {
            format!("exit code {}", output.status.code().unwrap_or(-1))
        } else {
            stderr
        };
        Err(Self::rejected(artifact, reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_local_copy(dir: &tempfile::TempDir, name: &str) -> Artifact {
        let path = dir.path().join(format!("{}.ps1", name));
        std::fs::write(&path, "Write-Output 1").unwrap();
        let mut artifact = Artifact::fixture(name, &[]);
        artifact.local_path = Some(path);
        artifact
    }

    #[test]
    fn test_empty_command_is_config_error() {
        assert!(matches!(
            CommandDeploymentClient::new(vec![]),
            Err(DeployError::Config(_))
        ));
        assert!(CommandDeploymentClient::new(vec!["  ".to_string()]).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_zero_exit_is_success() {
        let dir = tempfile::tempdir().unwrap();
        let client = CommandDeploymentClient::new(vec!["true".to_string()]).unwrap();
        client.deploy(&with_local_copy(&dir, "Ok")).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let client = CommandDeploymentClient::new(vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo \"module $DEPSYNC_ARTIFACT_NAME not ready\" >&2; exit 3".to_string(),
        ])
        .unwrap();
        match client.deploy(&with_local_copy(&dir, "Needy")).await {
            Err(DeployError::Rejected { artifact, reason }) => {
                assert_eq!(artifact, "Needy");
                assert_eq!(reason, "module Needy not ready");
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_is_rejection() {
        let dir = tempfile::tempdir().unwrap();
        let client = CommandDeploymentClient::new(vec![
            "sh".to_string(),
            "-c".to_string(),
            "sleep 5".to_string(),
        ])
        .unwrap()
        .with_timeout_secs(1);
        let err = client.deploy(&with_local_copy(&dir, "Slow")).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_missing_local_copy_is_rejection() {
        let client = CommandDeploymentClient::new(vec!["true".to_string()]).unwrap();
        let err = client
            .deploy(&Artifact::fixture("Remote", &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::Rejected { .. }));
    }
}
