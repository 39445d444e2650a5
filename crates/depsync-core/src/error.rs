//! Error taxonomy for collection, sequencing and deployment.
//!
//! Variants split into two groups. Fatal errors abort a whole run
//! (`Credential`, `Source`, `DuplicateArtifact`, `UnnamedArtifact`,
//! `CyclicDependency`, `UnrecognizedKind`, `Config`). Per-artifact errors (`Rejected`, `Transport`,
//! `Io`) are caught at the artifact boundary and stored on its record.

use thiserror::Error;

/// Errors produced by the deployment engine and its collaborators.
#[derive(Debug, Error)]
pub enum DeployError {
    /// A credential could not be resolved for a collaborator.
    #[error("credential error: {0}")]
    Credential(String),

    /// The source tree could not be listed or returned an error status.
    #[error("source error: {0}")]
    Source(String),

    /// Two distinct source paths resolve to the same artifact name.
    #[error("duplicate artifact name '{name}': {first} and {second}")]
    DuplicateArtifact {
        name: String,
        first: String,
        second: String,
    },

    /// An artifact reached an engine with an empty name.
    #[error("artifact at '{path}' has an empty name")]
    UnnamedArtifact { path: String },

    /// Depth data implies a dependency cycle.
    #[error("dependency cycle detected involving artifacts: {artifacts:?}")]
    CyclicDependency { artifacts: Vec<String> },

    /// A configured extension has no matching artifact kind.
    #[error("unrecognized artifact kind for {path} (extension '{extension}')")]
    UnrecognizedKind { path: String, extension: String },

    /// An edge referenced an artifact that is not in the graph.
    #[error("artifact not found in graph: {0}")]
    UnknownArtifact(String),

    /// The deployment target refused the artifact.
    #[error("deployment of {artifact} rejected: {reason}")]
    Rejected { artifact: String, reason: String },

    /// HTTP transport failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Invalid or incomplete configuration.
    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl From<reqwest::Error> for DeployError {
    fn from(err: reqwest::Error) -> Self {
        DeployError::Transport(err.to_string())
    }
}

impl DeployError {
    /// `true` for errors that must abort the whole run rather than a single
    /// artifact.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DeployError::Credential(_)
                | DeployError::Source(_)
                | DeployError::DuplicateArtifact { .. }
                | DeployError::UnnamedArtifact { .. }
                | DeployError::CyclicDependency { .. }
                | DeployError::UnrecognizedKind { .. }
                | DeployError::UnknownArtifact(_)
                | DeployError::Config(_)
                | DeployError::ConfigParse(_)
        )
    }
}

/// Convenience result alias.
pub type DeployResult<T> = std::result::Result<T, DeployError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_error_displays_artifact_names() {
        let err = DeployError::CyclicDependency {
            artifacts: vec!["Setup-Env".to_string(), "Invoke-Job".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("cycle"));
        assert!(msg.contains("Setup-Env"));
        assert!(msg.contains("Invoke-Job"));
    }

    #[test]
    fn test_duplicate_error_displays_both_paths() {
        let err = DeployError::DuplicateArtifact {
            name: "Common".to_string(),
            first: "runbooks/a/Common.ps1".to_string(),
            second: "runbooks/b/Common.ps1".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("runbooks/a/Common.ps1"));
        assert!(msg.contains("runbooks/b/Common.ps1"));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(DeployError::Credential("GITHUB_TOKEN not set".into()).is_fatal());
        assert!(DeployError::CyclicDependency { artifacts: vec![] }.is_fatal());
        assert!(DeployError::UnnamedArtifact {
            path: "runbooks/.ps1".into()
        }
        .is_fatal());
        assert!(!DeployError::Rejected {
            artifact: "A".into(),
            reason: "missing module".into(),
        }
        .is_fatal());
        assert!(!DeployError::Transport("timeout".into()).is_fatal());
    }
}
