//! Turns a source-tree listing into typed [`Artifact`]s.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::artifact::{split_source_path, Artifact, ArtifactKind};
use crate::error::{DeployError, DeployResult};
use crate::scratch::ScratchStore;
use crate::source::{ArtifactFetcher, EntryType, SourceEntry, SourceListing};

/// Extensions recognised when none are configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &[".ps1", ".graphrunbook"];

/// A blob that matched but could not be retrieved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetrievalFailure {
    pub source_path: String,
    pub detail: String,
}

/// Result of a collection pass.
#[derive(Debug, Default)]
pub struct Collection {
    /// Artifacts in listing order.
    pub artifacts: Vec<Artifact>,
    /// Matching blobs excluded because retrieval failed.
    pub failures: Vec<RetrievalFailure>,
}

/// A matching blob, before retrieval.
struct Candidate<'a> {
    entry: &'a SourceEntry,
    name: String,
    extension: String,
    ancestors: Vec<String>,
}

/// Collects artifacts under `root` from a source listing.
pub struct ArtifactCollector {
    root: String,
    extensions: Vec<String>,
    fetcher: Arc<dyn ArtifactFetcher>,
    scratch: Option<Arc<dyn ScratchStore>>,
}

impl ArtifactCollector {
    pub fn new(fetcher: Arc<dyn ArtifactFetcher>) -> Self {
        Self {
            root: String::new(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            fetcher,
            scratch: None,
        }
    }

    /// Only entries below `root` (a `/`-separated source path) are collected.
    pub fn with_root(mut self, root: &str) -> Self {
        self.root = root.trim_matches('/').to_string();
        self
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| normalize_extension(e.as_ref()))
            .collect();
        self
    }

    pub fn with_scratch(mut self, scratch: Arc<dyn ScratchStore>) -> Self {
        self.scratch = Some(scratch);
        self
    }

    /// List the source and collect every matching artifact.
    pub async fn collect_from(&self, listing: &dyn SourceListing) -> DeployResult<Collection> {
        let entries = listing.list_entries().await?;
        self.collect(&entries).await
    }

    /// Collect artifacts from an already-fetched listing.
    ///
    /// Aborts before any retrieval with [`DeployError::DuplicateArtifact`] if two
    /// distinct paths share a name, and with [`DeployError::UnrecognizedKind`] if
    /// a configured extension maps to no kind. Retrieval failures are recorded
    /// in [`Collection::failures`] and do not abort.
    pub async fn collect(&self, entries: &[SourceEntry]) -> DeployResult<Collection> {
        let candidates = self.select(entries)?;
        let mut collection = Collection::default();

        for candidate in candidates {
            let path = &candidate.entry.path;
            let content = match self.fetcher.fetch(&candidate.entry.url).await {
                Ok(content) => content,
                Err(e) => {
                    warn!(path = %path, error = %e, "artifact retrieval failed; excluding");
                    collection.failures.push(RetrievalFailure {
                        source_path: path.clone(),
                        detail: e.to_string(),
                    });
                    continue;
                }
            };

            let kind = ArtifactKind::classify(path, &candidate.extension, &content)?;

            let local_path = match &self.scratch {
                Some(store) => match store.put(path, &candidate.extension, &content) {
                    Ok(p) => Some(p),
                    Err(e) => {
                        warn!(path = %path, error = %e, "failed to persist artifact; excluding");
                        collection.failures.push(RetrievalFailure {
                            source_path: path.clone(),
                            detail: e.to_string(),
                        });
                        continue;
                    }
                },
                None => None,
            };

            debug!(name = %candidate.name, kind = %kind, depth = candidate.ancestors.len(), "collected artifact");
            collection.artifacts.push(Artifact {
                name: candidate.name,
                source_path: path.clone(),
                source_url: candidate.entry.url.clone(),
                kind,
                folder_depth: candidate.ancestors.len(),
                ancestor_path: candidate.ancestors,
                content,
                local_path,
            });
        }

        info!(
            collected = collection.artifacts.len(),
            failed = collection.failures.len(),
            "artifact collection finished"
        );
        Ok(collection)
    }

    /// Filter the listing down to matching blobs and reject ambiguous names
    /// and configured extensions with no kind.
    fn select<'a>(&self, entries: &'a [SourceEntry]) -> DeployResult<Vec<Candidate<'a>>> {
        let unsupported = self
            .extensions
            .iter()
            .find(|ext| ArtifactKind::for_extension(ext).is_none());
        let mut seen: HashMap<String, &'a str> = HashMap::new();
        let mut candidates = Vec::new();
        let mut skipped = 0usize;

        for entry in entries {
            if entry.entry_type != EntryType::Blob {
                skipped += 1;
                continue;
            }
            let Some(relative) = self.relative_to_root(&entry.path) else {
                skipped += 1;
                continue;
            };
            let Some((name, extension, ancestors)) = split_source_path(relative) else {
                skipped += 1;
                continue;
            };
            let extension = normalize_extension(&extension);
            if !self.extensions.contains(&extension) {
                skipped += 1;
                continue;
            }
            if unsupported == Some(&extension) {
                return Err(DeployError::UnrecognizedKind {
                    path: entry.path.clone(),
                    extension,
                });
            }

            match seen.get(&name) {
                Some(first) if *first == entry.path => {
                    debug!(path = %entry.path, "path listed twice; ignoring repeat");
                    continue;
                }
                Some(first) => {
                    return Err(DeployError::DuplicateArtifact {
                        name,
                        first: first.to_string(),
                        second: entry.path.clone(),
                    });
                }
                None => {
                    seen.insert(name.clone(), entry.path.as_str());
                }
            }

            candidates.push(Candidate {
                entry,
                name,
                extension,
                ancestors,
            });
        }

        if let Some(extension) = unsupported {
            return Err(DeployError::UnrecognizedKind {
                path: format!("{}/", self.root),
                extension: extension.clone(),
            });
        }

        debug!(matched = candidates.len(), skipped, "source listing filtered");
        Ok(candidates)
    }

    fn relative_to_root<'p>(&self, path: &'p str) -> Option<&'p str> {
        let path = path.trim_start_matches('/');
        if self.root.is_empty() {
            return Some(path);
        }
        path.strip_prefix(self.root.as_str())?.strip_prefix('/')
    }
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_ascii_lowercase();
    if ext.is_empty() || ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}
