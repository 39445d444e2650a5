//! Source-tree collaborators: listing and retrieval.
//!
//! Provides:
//! - [`SourceListing`] / [`ArtifactFetcher`]: the narrow traits the collector depends on
//! - [`github::GitHubSource`]: git-trees listing and raw blob retrieval over HTTP
//! - [`local::LocalSource`]: a directory on disk

pub mod github;
pub mod local;

use serde::{Deserialize, Serialize};

use crate::error::DeployResult;

pub use github::{GitHubConfig, GitHubSource};
pub use local::LocalSource;

/// Whether a listed entry is a folder or a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Tree,
    Blob,
    /// Anything else the listing reports (e.g. submodule commits).
    #[serde(other)]
    Other,
}

/// A single entry of a source-tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntry {
    /// Path relative to the repository root, `/`-separated.
    pub path: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    /// Retrieval location for blobs.
    #[serde(default)]
    pub url: String,
}

impl SourceEntry {
    pub fn blob(path: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            entry_type: EntryType::Blob,
            url: url.into(),
        }
    }

    pub fn tree(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            entry_type: EntryType::Tree,
            url: String::new(),
        }
    }
}

/// Lists every entry of the source tree.
#[async_trait::async_trait]
pub trait SourceListing: Send + Sync {
    async fn list_entries(&self) -> DeployResult<Vec<SourceEntry>>;
}

/// Retrieves raw content for a listed blob.
#[async_trait::async_trait]
pub trait ArtifactFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> DeployResult<Vec<u8>>;
}
