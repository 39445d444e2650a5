//! GitHub source: recursive git-trees listing and raw blob retrieval.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ArtifactFetcher, SourceEntry, SourceListing};
use crate::error::{DeployError, DeployResult};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Connection settings for a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitHubConfig {
    pub api_url: String,
    pub owner: String,
    pub repo: String,
    /// Branch, tag or commit SHA.
    pub git_ref: String,
    /// Bearer token (optional for public repositories).
    #[serde(skip_serializing)]
    pub token: Option<String>,
}

impl GitHubConfig {
    pub fn new(owner: &str, repo: &str) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            git_ref: "main".to_string(),
            token: None,
        }
    }

    pub fn with_ref(mut self, git_ref: &str) -> Self {
        self.git_ref = git_ref.to_string();
        self
    }

    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    /// Resolve the token from the environment variable `token_env`.
    ///
    /// A configured variable that is unset or empty is a
    /// [`DeployError::Credential`]; no variable configured means anonymous access.
    pub fn with_token_from_env(self, token_env: Option<&str>) -> DeployResult<Self> {
        let Some(var) = token_env else {
            return Ok(self);
        };
        match std::env::var(var) {
            Ok(token) if !token.trim().is_empty() => Ok(self.with_token(token.trim())),
            _ => Err(DeployError::Credential(format!(
                "environment variable {} is not set",
                var
            ))),
        }
    }

    /// `{api}/repos/{owner}/{repo}/git/trees/{ref}?recursive=1`
    pub fn trees_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/git/trees/{}?recursive=1",
            self.api_url.trim_end_matches('/'),
            self.owner,
            self.repo,
            self.git_ref
        )
    }
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    tree: Vec<SourceEntry>,
    #[serde(default)]
    truncated: bool,
}

/// Lists and fetches artifacts from a GitHub repository.
pub struct GitHubSource {
    config: GitHubConfig,
    http_client: reqwest::Client,
}

impl GitHubSource {
    pub fn new(config: GitHubConfig) -> DeployResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(format!("depsync/{}", crate::VERSION))
            .build()?;
        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &GitHubConfig {
        &self.config
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let builder = self.http_client.get(url);
        match &self.config.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

fn parse_tree_response(body: &[u8]) -> DeployResult<Vec<SourceEntry>> {
    let response: TreeResponse = serde_json::from_slice(body)?;
    if response.truncated {
        warn!(
            entries = response.tree.len(),
            "source listing was truncated by the server; some artifacts may be missing"
        );
    }
    Ok(response.tree)
}

#[async_trait::async_trait]
impl SourceListing for GitHubSource {
    async fn list_entries(&self) -> DeployResult<Vec<SourceEntry>> {
        let url = self.config.trees_url();
        debug!(url = %url, "listing source tree");

        let response = self
            .request(&url)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| DeployError::Source(format!("failed to list {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(DeployError::Source(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let body = response.bytes().await?;
        parse_tree_response(&body)
    }
}

#[async_trait::async_trait]
impl ArtifactFetcher for GitHubSource {
    async fn fetch(&self, url: &str) -> DeployResult<Vec<u8>> {
        let response = self
            .request(url)
            .header("Accept", "application/vnd.github.raw")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DeployError::Transport(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        Ok(response.bytes().await?.to_vec())
    }
}
