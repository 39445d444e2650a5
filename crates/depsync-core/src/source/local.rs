//! Local directory source.

use std::fs;
use std::path::{Path, PathBuf};

use super::{ArtifactFetcher, SourceEntry, SourceListing};
use crate::error::{DeployError, DeployResult};

/// Lists a directory on disk as if it were a source tree.
///
/// Entry paths are relative to `base` and `/`-separated; blob urls are the
/// absolute file paths.
pub struct LocalSource {
    base: PathBuf,
}

impl LocalSource {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    fn walk(&self, dir: &Path, out: &mut Vec<SourceEntry>) -> DeployResult<()> {
        let mut children: Vec<PathBuf> = fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<_>>()?;
        children.sort();

        for child in children {
            let relative = relative_path(&self.base, &child)?;
            let file_type = fs::symlink_metadata(&child)?.file_type();
            if file_type.is_dir() {
                out.push(SourceEntry::tree(relative));
                self.walk(&child, out)?;
            } else if file_type.is_file() {
                out.push(SourceEntry::blob(relative, child.display().to_string()));
            }
        }
        Ok(())
    }
}

fn relative_path(base: &Path, path: &Path) -> DeployResult<String> {
    let rel = path
        .strip_prefix(base)
        .map_err(|_| DeployError::Source(format!("{} escapes {}", path.display(), base.display())))?;
    Ok(rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/"))
}

#[async_trait::async_trait]
impl SourceListing for LocalSource {
    async fn list_entries(&self) -> DeployResult<Vec<SourceEntry>> {
        if !self.base.is_dir() {
            return Err(DeployError::Source(format!(
                "source directory not found: {}",
                self.base.display()
            )));
        }
        let mut entries = Vec::new();
        self.walk(&self.base, &mut entries)?;
        Ok(entries)
    }
}

#[async_trait::async_trait]
impl ArtifactFetcher for LocalSource {
    async fn fetch(&self, url: &str) -> DeployResult<Vec<u8>> {
        Ok(tokio::fs::read(url).await?)
    }
}
