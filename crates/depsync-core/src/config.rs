//! `depsync.toml` configuration.
//!
//! ```toml
//! mode = "adaptive"
//! scratch_dir = ".depsync/scratch"
//!
//! [source]
//! type = "github"
//! owner = "org"
//! repo = "automation"
//! root = "runbooks"
//! token_env = "GITHUB_TOKEN"
//!
//! [target]
//! command = ["pwsh", "-File", "publish.ps1"]
//! timeout_secs = 300
//! ```
//!
//! `DEPSYNC_MODE` and `DEPSYNC_SCRATCH_DIR` override the file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactKind;
use crate::client::CommandDeploymentClient;
use crate::collector::{ArtifactCollector, DEFAULT_EXTENSIONS};
use crate::error::{DeployError, DeployResult};
use crate::record::DeployMode;
use crate::scratch::FsScratchStore;
use crate::source::github::DEFAULT_API_URL;
use crate::source::{ArtifactFetcher, GitHubConfig, GitHubSource, LocalSource, SourceListing};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "depsync.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Github,
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(rename = "type")]
    pub source_type: SourceType,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(rename = "ref", default = "default_ref")]
    pub git_ref: String,
    /// Folder inside the source tree that holds the artifacts.
    #[serde(default)]
    pub root: String,
    /// Name of the environment variable holding the API token.
    #[serde(default)]
    pub token_env: Option<String>,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Directory to walk for a local source.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    #[serde(default)]
    pub command: Vec<String>,
    /// Per-artifact timeout; zero disables it.
    #[serde(default)]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepsyncConfig {
    #[serde(default = "default_mode")]
    pub mode: DeployMode,
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
    pub source: SourceConfig,
    #[serde(default)]
    pub target: TargetConfig,
}

fn default_mode() -> DeployMode {
    DeployMode::Adaptive
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from(".depsync/scratch")
}

fn default_ref() -> String {
    "main".to_string()
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

/// A configured source, usable both for listing and retrieval.
#[derive(Clone)]
pub struct SourceHandles {
    pub listing: Arc<dyn SourceListing>,
    pub fetcher: Arc<dyn ArtifactFetcher>,
}

impl DepsyncConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(raw: &str) -> DeployResult<Self> {
        let config: DepsyncConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Read `path`, apply environment overrides and validate.
    pub fn load(path: impl AsRef<Path>) -> DeployResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DeployError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let mut config: DepsyncConfig = toml::from_str(&raw)?;
        config.apply_env_with(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `DEPSYNC_MODE` / `DEPSYNC_SCRATCH_DIR` as returned by `lookup`.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> DeployResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(mode) = lookup("DEPSYNC_MODE").filter(|v| !v.trim().is_empty()) {
            self.mode = mode
                .parse::<DeployMode>()
                .map_err(|e: String| DeployError::Config(format!("DEPSYNC_MODE: {}", e)))?;
        }
        if let Some(dir) = lookup("DEPSYNC_SCRATCH_DIR").filter(|v| !v.trim().is_empty()) {
            self.scratch_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    pub fn validate(&self) -> DeployResult<()> {
        let source = &self.source;
        match source.source_type {
            SourceType::Github => {
                if blank(&source.owner) || blank(&source.repo) {
                    return Err(DeployError::Config(
                        "github source requires owner and repo".to_string(),
                    ));
                }
            }
            SourceType::Local => {
                if source.path.is_none() {
                    return Err(DeployError::Config(
                        "local source requires path".to_string(),
                    ));
                }
            }
        }
        if source.extensions.is_empty() {
            return Err(DeployError::Config(
                "source.extensions must not be empty".to_string(),
            ));
        }
        if let Some(ext) = source
            .extensions
            .iter()
            .find(|ext| ArtifactKind::for_extension(ext).is_none())
        {
            return Err(DeployError::Config(format!(
                "source.extensions: no artifact kind for '{}'",
                ext
            )));
        }
        Ok(())
    }

    /// Build the configured source. Resolves the GitHub token, so a missing
    /// credential surfaces here.
    pub fn source(&self) -> DeployResult<SourceHandles> {
        let source = &self.source;
        match source.source_type {
            SourceType::Github => {
                let github = GitHubConfig::new(
                    source.owner.as_deref().unwrap_or_default(),
                    source.repo.as_deref().unwrap_or_default(),
                )
                .with_ref(&source.git_ref)
                .with_api_url(&source.api_url)
                .with_token_from_env(source.token_env.as_deref())?;
                let client = Arc::new(GitHubSource::new(github)?);
                Ok(SourceHandles {
                    listing: client.clone(),
                    fetcher: client,
                })
            }
            SourceType::Local => {
                let path = source
                    .path
                    .clone()
                    .ok_or_else(|| DeployError::Config("local source requires path".to_string()))?;
                let local = Arc::new(LocalSource::new(path));
                Ok(SourceHandles {
                    listing: local.clone(),
                    fetcher: local,
                })
            }
        }
    }

    /// A collector for the configured root and extensions, persisting content
    /// under `scratch_dir`.
    pub fn collector(&self, fetcher: Arc<dyn ArtifactFetcher>) -> DeployResult<ArtifactCollector> {
        let scratch = FsScratchStore::new(&self.scratch_dir)?;
        Ok(ArtifactCollector::new(fetcher)
            .with_root(&self.source.root)
            .with_extensions(&self.source.extensions)
            .with_scratch(Arc::new(scratch)))
    }

    /// The deployment client for `[target]`; an empty command is a config error.
    pub fn deployment_client(&self) -> DeployResult<CommandDeploymentClient> {
        Ok(CommandDeploymentClient::new(self.target.command.clone())?
            .with_timeout_secs(self.target.timeout_secs))
    }
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const GITHUB: &str = r#"
[source]
type = "github"
owner = "contoso"
repo = "automation"
root = "runbooks"

[target]
command = ["pwsh", "-File", "publish.ps1"]
timeout_secs = 300
"#;

    #[test]
    fn test_defaults_applied() {
        let config = DepsyncConfig::from_toml_str(GITHUB).unwrap();
        assert_eq!(config.mode, DeployMode::Adaptive);
        assert_eq!(config.scratch_dir, PathBuf::from(".depsync/scratch"));
        assert_eq!(config.source.git_ref, "main");
        assert_eq!(config.source.api_url, "https://api.github.com");
        assert_eq!(config.source.extensions, vec![".ps1", ".graphrunbook"]);
        assert_eq!(config.source.token_env, None);
        assert_eq!(config.target.timeout_secs, 300);
    }

    #[test]
    fn test_explicit_values() {
        let raw = r#"
mode = "structural"
scratch_dir = "/tmp/depsync"

[source]
type = "local"
path = "./runbooks"
extensions = ["ps1"]
"#;
        let config = DepsyncConfig::from_toml_str(raw).unwrap();
        assert_eq!(config.mode, DeployMode::Structural);
        assert_eq!(config.source.source_type, SourceType::Local);
        assert_eq!(config.source.path, Some(PathBuf::from("./runbooks")));
        assert!(config.target.command.is_empty());
    }

    #[test]
    fn test_github_requires_owner_and_repo() {
        let raw = "[source]\ntype = \"github\"\nowner = \"contoso\"\n";
        assert!(matches!(
            DepsyncConfig::from_toml_str(raw),
            Err(DeployError::Config(_))
        ));
    }

    #[test]
    fn test_local_requires_path() {
        let raw = "[source]\ntype = \"local\"\n";
        assert!(matches!(
            DepsyncConfig::from_toml_str(raw),
            Err(DeployError::Config(_))
        ));
    }

    #[test]
    fn test_unknown_source_type_is_parse_error() {
        let raw = "[source]\ntype = \"ftp\"\n";
        assert!(matches!(
            DepsyncConfig::from_toml_str(raw),
            Err(DeployError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = DepsyncConfig::from_toml_str(GITHUB).unwrap();
        config
            .apply_env_with(|key| match key {
                "DEPSYNC_MODE" => Some("structural".to_string()),
                "DEPSYNC_SCRATCH_DIR" => Some("/var/tmp/scratch".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.mode, DeployMode::Structural);
        assert_eq!(config.scratch_dir, PathBuf::from("/var/tmp/scratch"));

        let err = config
            .apply_env_with(|key| (key == "DEPSYNC_MODE").then(|| "sideways".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("DEPSYNC_MODE"));
    }

    #[test]
    fn test_extension_without_kind_rejected() {
        let raw = "[source]\ntype = \"local\"\npath = \".\"\nextensions = [\"PS1\", \".py\"]\n";
        match DepsyncConfig::from_toml_str(raw) {
            Err(DeployError::Config(msg)) => assert!(msg.contains("'.py'"), "{msg}"),
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_target_command_rejected() {
        let raw = "[source]\ntype = \"local\"\npath = \".\"\n";
        let config = DepsyncConfig::from_toml_str(raw).unwrap();
        assert!(matches!(
            config.deployment_client(),
            Err(DeployError::Config(_))
        ));
    }

    #[test]
    fn test_missing_token_is_credential_error() {
        let raw = format!(
            "{}\n",
            GITHUB.replace(
                "root = \"runbooks\"",
                "root = \"runbooks\"\ntoken_env = \"DEPSYNC_TEST_TOKEN_THAT_IS_NEVER_SET\""
            )
        );
        let config = DepsyncConfig::from_toml_str(&raw).unwrap();
        assert!(matches!(config.source(), Err(DeployError::Credential(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, GITHUB).unwrap();
        let config = DepsyncConfig::load(&path).unwrap();
        assert_eq!(config.source.owner.as_deref(), Some("contoso"));

        let missing = DepsyncConfig::load(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, DeployError::Config(_)));
    }
}
