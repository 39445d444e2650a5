//! Typed deployable artifacts.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{DeployError, DeployResult};

/// The closed set of deployable artifact kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Plain PowerShell script.
    Script,
    /// PowerShell workflow (`workflow Name { ... }`).
    WorkflowScript,
    /// Graphical runbook definition.
    GraphDefinition,
}

impl ArtifactKind {
    /// The kind an extension maps to before content is known.
    ///
    /// `extension` is compared case-insensitively, with or without the
    /// leading dot. `.ps1` maps to [`ArtifactKind::Script`]; whether it is a
    /// workflow needs the content (see [`ArtifactKind::classify`]).
    pub fn for_extension(extension: &str) -> Option<Self> {
        let ext = extension.trim().trim_start_matches('.').to_ascii_lowercase();
        match ext.as_str() {
            "ps1" => Some(ArtifactKind::Script),
            "graphrunbook" => Some(ArtifactKind::GraphDefinition),
            _ => None,
        }
    }

    /// Classify an artifact from its extension and content.
    ///
    /// Anything outside the known extensions is an
    /// [`DeployError::UnrecognizedKind`].
    pub fn classify(path: &str, extension: &str, content: &[u8]) -> DeployResult<Self> {
        match Self::for_extension(extension) {
            Some(ArtifactKind::Script) if declares_workflow(content) => {
                Ok(ArtifactKind::WorkflowScript)
            }
            Some(kind) => Ok(kind),
            None => Err(DeployError::UnrecognizedKind {
                path: path.to_string(),
                extension: extension.to_string(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ArtifactKind::Script => "script",
            ArtifactKind::WorkflowScript => "workflow_script",
            ArtifactKind::GraphDefinition => "graph_definition",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// True when the first significant line opens a `workflow` block.
fn declares_workflow(content: &[u8]) -> bool {
    let text = String::from_utf8_lossy(content);
    let mut in_block_comment = false;
    for line in text.lines() {
        let line = line.trim().trim_start_matches('\u{feff}');
        if in_block_comment {
            if line.contains("#>") {
                in_block_comment = false;
            }
            continue;
        }
        if line.is_empty() {
            continue;
        }
        if line.starts_with("<#") {
            in_block_comment = !line.contains("#>");
            continue;
        }
        if line.starts_with('#') {
            continue;
        }
        let keyword = line.split_whitespace().next().unwrap_or_default();
        return keyword.eq_ignore_ascii_case("workflow");
    }
    false
}

/// A single deployable unit discovered in the source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// File name without extension. Unique within a run.
    pub name: String,
    /// Full path in the source tree.
    pub source_path: String,
    /// Retrieval location.
    pub source_url: String,
    pub kind: ArtifactKind,
    /// Directory segments between the configured root and the file.
    pub folder_depth: usize,
    /// The directory segments themselves, outermost first.
    pub ancestor_path: Vec<String>,
    /// Retrieved content.
    pub content: Vec<u8>,
    /// Scratch location the content was persisted to, if any.
    pub local_path: Option<PathBuf>,
}

impl Artifact {
    /// `true` when `self` lives in `other`'s folder or one of its subfolders.
    pub fn is_nested_under(&self, other: &Artifact) -> bool {
        self.ancestor_path.len() >= other.ancestor_path.len()
            && self.ancestor_path[..other.ancestor_path.len()] == other.ancestor_path[..]
    }
}

#[cfg(test)]
impl Artifact {
    /// Script artifact nested under `folders`, with empty content.
    pub(crate) fn fixture(name: &str, folders: &[&str]) -> Self {
        let ancestor_path: Vec<String> = folders.iter().map(|s| s.to_string()).collect();
        let mut source_path = ancestor_path.join("/");
        if !source_path.is_empty() {
            source_path.push('/');
        }
        source_path.push_str(name);
        source_path.push_str(".ps1");
        Self {
            name: name.to_string(),
            source_url: format!("u:{}", source_path),
            source_path,
            kind: ArtifactKind::Script,
            folder_depth: ancestor_path.len(),
            ancestor_path,
            content: Vec::new(),
            local_path: None,
        }
    }
}

/// Splits `path` (relative to the root) into the artifact name, its extension
/// and its ancestor directory segments.
///
/// Returns `None` for paths without a usable file stem.
pub fn split_source_path(relative: &str) -> Option<(String, String, Vec<String>)> {
    let mut segments: Vec<&str> = relative.split('/').filter(|s| !s.is_empty()).collect();
    let file = segments.pop()?;
    let (stem, ext) = match file.rfind('.') {
        Some(0) => return None,
        Some(idx) => (&file[..idx], &file[idx..]),
        None => (file, ""),
    };
    if stem.is_empty() {
        return None;
    }
    Some((
        stem.to_string(),
        ext.to_string(),
        segments.into_iter().map(str::to_string).collect(),
    ))
}
