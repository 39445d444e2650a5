//! Artifact dependency graph for structural mode.
//!
//! Models artifacts as nodes in a directed graph. An edge `A → B` means
//! "B depends on A": A must be deployed before B.
//!
//! [`DependencyGraphBuilder`] infers edges from folder nesting: an artifact at
//! depth *d* is a dependency of every artifact at depth *d-1* whose folder
//! contains it. This is a heuristic. Siblings that reference each other are
//! invisible to it.

use std::collections::{HashMap, HashSet};

use crate::artifact::Artifact;
use crate::error::{DeployError, DeployResult};

/// Directed dependency graph over [`Artifact`]s.
///
/// Nodes keep their insertion order. Edges are stored as
/// `dependency → dependents` adjacency lists, plus the reverse direction.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<Artifact>,
    index: HashMap<String, usize>,
    /// `dependency → {dependent, ...}` (downstream adjacency)
    downstream: Vec<Vec<usize>>,
    /// `dependent → {dependency, ...}` (upstream adjacency)
    upstream: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an artifact. Re-registering an existing name replaces the
    /// node but keeps its position and edges.
    pub fn add_node(&mut self, artifact: Artifact) {
        if let Some(&idx) = self.index.get(&artifact.name) {
            self.nodes[idx] = artifact;
            return;
        }
        self.index.insert(artifact.name.clone(), self.nodes.len());
        self.nodes.push(artifact);
        self.downstream.push(Vec::new());
        self.upstream.push(Vec::new());
    }

    /// Add a directed edge: `dependent` depends on `dependency`.
    ///
    /// Both nodes must already be registered. Cycles are not rejected here;
    /// [`crate::sequencer::TopologicalSequencer`] refuses to order them.
    pub fn add_dependency(&mut self, dependency: &str, dependent: &str) -> DeployResult<()> {
        let from = self.position(dependency)?;
        let to = self.position(dependent)?;
        if !self.downstream[from].contains(&to) {
            self.downstream[from].push(to);
            self.upstream[to].push(from);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> &[Artifact] {
        &self.nodes
    }

    pub fn get(&self, name: &str) -> Option<&Artifact> {
        self.index.get(name).map(|&idx| &self.nodes[idx])
    }

    /// Every edge as `(dependency, dependent)` names.
    pub fn edges(&self) -> Vec<(&str, &str)> {
        self.downstream
            .iter()
            .enumerate()
            .flat_map(|(from, tos)| {
                tos.iter()
                    .map(move |&to| (self.nodes[from].name.as_str(), self.nodes[to].name.as_str()))
            })
            .collect()
    }

    pub fn edge_count(&self) -> usize {
        self.downstream.iter().map(Vec::len).sum()
    }

    /// Direct dependencies of `name` (artifacts it must follow).
    pub fn dependencies_of(&self, name: &str) -> DeployResult<Vec<&Artifact>> {
        let idx = self.position(name)?;
        Ok(self.upstream[idx].iter().map(|&i| &self.nodes[i]).collect())
    }

    /// Direct dependents of `name` (artifacts that must follow it).
    pub fn dependents_of(&self, name: &str) -> DeployResult<Vec<&Artifact>> {
        let idx = self.position(name)?;
        Ok(self.downstream[idx].iter().map(|&i| &self.nodes[i]).collect())
    }

    pub(crate) fn position(&self, name: &str) -> DeployResult<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| DeployError::UnknownArtifact(name.to_string()))
    }

    pub(crate) fn downstream_of(&self, idx: usize) -> &[usize] {
        &self.downstream[idx]
    }

    pub(crate) fn upstream_of(&self, idx: usize) -> &[usize] {
        &self.upstream[idx]
    }

    pub(crate) fn into_nodes(self) -> Vec<Artifact> {
        self.nodes
    }
}

/// Derives a [`DependencyGraph`] from folder depth.
pub struct DependencyGraphBuilder;

impl DependencyGraphBuilder {
    /// Build the graph for `artifacts`, preserving input order.
    ///
    /// For every pair where `deep` sits exactly one level below `shallow` and
    /// inside `shallow`'s folder, adds `deep → shallow`.
    pub fn build(artifacts: Vec<Artifact>) -> DeployResult<DependencyGraph> {
        let mut graph = DependencyGraph::new();
        let mut names: HashSet<String> = HashSet::new();

        for artifact in artifacts {
            if artifact.name.is_empty() {
                return Err(DeployError::UnnamedArtifact {
                    path: artifact.source_path,
                });
            }
            if !names.insert(artifact.name.clone()) {
                return Err(DeployError::DuplicateArtifact {
                    name: artifact.name.clone(),
                    first: graph
                        .get(&artifact.name)
                        .map(|a| a.source_path.clone())
                        .unwrap_or_default(),
                    second: artifact.source_path.clone(),
                });
            }
            graph.add_node(artifact);
        }

        // Bucket by depth so each node is only compared against the level above.
        let mut by_depth: HashMap<usize, Vec<usize>> = HashMap::new();
        for (idx, artifact) in graph.nodes.iter().enumerate() {
            by_depth.entry(artifact.folder_depth).or_default().push(idx);
        }

        let mut edges = Vec::new();
        for (idx, deep) in graph.nodes.iter().enumerate() {
            if deep.folder_depth == 0 {
                continue;
            }
            let Some(parents) = by_depth.get(&(deep.folder_depth - 1)) else {
                continue;
            };
            for &p in parents {
                if deep.is_nested_under(&graph.nodes[p]) {
                    edges.push((idx, p));
                }
            }
        }

        for (from, to) in edges {
            graph.downstream[from].push(to);
            graph.upstream[to].push(from);
        }

        tracing::debug!(
            nodes = graph.len(),
            edges = graph.edge_count(),
            "dependency graph built from folder depth"
        );
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(name: &str, folders: &[&str]) -> Artifact {
        Artifact::fixture(name, folders)
    }

    #[test]
    fn test_builder_rejects_empty_name() {
        let mut unnamed = artifact("Gone", &["svc"]);
        unnamed.name.clear();
        let err = DependencyGraphBuilder::build(vec![artifact("App", &[]), unnamed]).unwrap_err();
        assert_eq!(err.to_string(), "artifact at 'svc/Gone.ps1' has an empty name");
    }

    #[test]
    fn test_nested_artifact_is_dependency_of_parent_level() {
        let g = DependencyGraphBuilder::build(vec![
            artifact("App", &["svc"]),
            artifact("Lib", &["svc", "lib"]),
        ])
        .unwrap();
        assert_eq!(g.edges(), vec![("Lib", "App")]);
        let deps: Vec<&str> = g
            .dependencies_of("App")
            .unwrap()
            .iter()
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(deps, vec!["Lib"]);
    }

    #[test]
    fn test_siblings_impose_no_order() {
        let g = DependencyGraphBuilder::build(vec![
            artifact("A", &["alpha"]),
            artifact("B", &["beta"]),
            artifact("C", &["alpha", "x"]),
        ])
        .unwrap();
        // C only feeds A, never B.
        assert_eq!(g.edges(), vec![("C", "A")]);
    }

    #[test]
    fn test_equal_depth_has_no_edges_and_keeps_order() {
        let g = DependencyGraphBuilder::build(vec![
            artifact("Z", &["f"]),
            artifact("A", &["f"]),
            artifact("M", &["f"]),
        ])
        .unwrap();
        assert_eq!(g.edge_count(), 0);
        let names: Vec<&str> = g.nodes().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Z", "A", "M"]);
    }

    #[test]
    fn test_root_level_depends_on_every_first_level_artifact() {
        let g = DependencyGraphBuilder::build(vec![
            artifact("Main", &[]),
            artifact("One", &["a"]),
            artifact("Two", &["b"]),
        ])
        .unwrap();
        let mut deps: Vec<&str> = g
            .dependencies_of("Main")
            .unwrap()
            .iter()
            .map(|a| a.name.as_str())
            .collect();
        deps.sort();
        assert_eq!(deps, vec!["One", "Two"]);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let result = DependencyGraphBuilder::build(vec![
            artifact("Common", &["a"]),
            artifact("Common", &["b"]),
        ]);
        assert!(matches!(result, Err(DeployError::DuplicateArtifact { .. })));
    }

    #[test]
    fn test_add_dependency_unknown_node() {
        let mut g = DependencyGraph::new();
        g.add_node(artifact("A", &[]));
        let r = g.add_dependency("A", "missing");
        assert!(matches!(r, Err(DeployError::UnknownArtifact(_))));
    }

    #[test]
    fn test_add_dependency_is_idempotent() {
        let mut g = DependencyGraph::new();
        g.add_node(artifact("A", &[]));
        g.add_node(artifact("B", &[]));
        g.add_dependency("A", "B").unwrap();
        g.add_dependency("A", "B").unwrap();
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.dependents_of("A").unwrap()[0].name, "B");
    }
}
