//! Scratch storage for retrieved artifact content.
//!
//! Content is keyed by the SHA-256 of the artifact's full source path, not by
//! its file name, so same-named files from different folders never overwrite
//! each other.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest as Sha2Digest, Sha256};
use tempfile::NamedTempFile;

use crate::error::DeployResult;

/// SHA-256 of a source path, used as the storage key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PathKey([u8; 32]);

impl PathKey {
    pub fn compute(source_path: &str) -> Self {
        let hash = Sha256::digest(source_path.as_bytes());
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hash);
        Self(bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PathKey({})", self.to_hex().chars().take(12).collect::<String>())
    }
}

/// Write-once local storage for artifact content.
pub trait ScratchStore: Send + Sync {
    /// Persist `data` for `source_path` and return where it was written.
    fn put(&self, source_path: &str, extension: &str, data: &[u8]) -> DeployResult<PathBuf>;
}

/// Filesystem scratch store with git-style 2-char sharding.
///
/// Layout: `<root>/<first 2 hex chars>/<remaining hex chars><extension>`
pub struct FsScratchStore {
    root: PathBuf,
}

impl FsScratchStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> DeployResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &PathKey, extension: &str) -> PathBuf {
        let hex = key.to_hex();
        self.root
            .join(&hex[..2])
            .join(format!("{}{}", &hex[2..], extension))
    }
}

impl ScratchStore for FsScratchStore {
    fn put(&self, source_path: &str, extension: &str, data: &[u8]) -> DeployResult<PathBuf> {
        let key = PathKey::compute(source_path);
        let path = self.entry_path(&key, extension);
        let shard_dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(shard_dir)?;

        // Atomic write: temp file in the same directory, then rename.
        let mut tmp = NamedTempFile::new_in(shard_dir)?;
        tmp.write_all(data)?;
        tmp.persist(&path).map_err(|e| e.error)?;

        Ok(path)
    }
}
