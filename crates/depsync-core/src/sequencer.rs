//! Total deploy order for structural mode.
//!
//! The depth-derived graph is layered by construction, so a bucket sort by
//! decreasing folder depth already satisfies every edge. The order is still
//! checked edge by edge; when depth data disagrees with the edges the
//! sequencer falls back to Kahn's algorithm, and a cycle aborts with
//! [`DeployError::CyclicDependency`]. No partial order is ever returned.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use serde::Serialize;
use tracing::warn;

use crate::artifact::Artifact;
use crate::error::{DeployError, DeployResult};
use crate::graph::DependencyGraph;

/// A step in a structural deployment plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SequenceStep {
    /// 0-indexed position in the plan.
    pub position: usize,
    pub name: String,
    pub folder_depth: usize,
    pub source_path: String,
    /// Artifacts this step waits for.
    pub depends_on: Vec<String>,
}

/// Orders a [`DependencyGraph`] so dependencies precede dependents.
pub struct TopologicalSequencer;

impl TopologicalSequencer {
    /// Consume the graph and return its artifacts in deploy order.
    pub fn sequence(graph: DependencyGraph) -> DeployResult<Vec<Artifact>> {
        let order = Self::order(&graph)?;
        let mut slots: Vec<Option<Artifact>> = graph.into_nodes().into_iter().map(Some).collect();
        Ok(order
            .into_iter()
            .filter_map(|idx| slots[idx].take())
            .collect())
    }

    /// Describe the deploy order without consuming the graph.
    pub fn plan(graph: &DependencyGraph) -> DeployResult<Vec<SequenceStep>> {
        let order = Self::order(graph)?;
        let nodes = graph.nodes();
        Ok(order
            .into_iter()
            .enumerate()
            .map(|(position, idx)| SequenceStep {
                position,
                name: nodes[idx].name.clone(),
                folder_depth: nodes[idx].folder_depth,
                source_path: nodes[idx].source_path.clone(),
                depends_on: graph
                    .upstream_of(idx)
                    .iter()
                    .map(|&u| nodes[u].name.clone())
                    .collect(),
            })
            .collect())
    }

    /// Node indices in deploy order.
    fn order(graph: &DependencyGraph) -> DeployResult<Vec<usize>> {
        let by_depth = depth_order(graph.nodes());
        if respects_edges(graph, &by_depth) {
            return Ok(by_depth);
        }
        warn!(
            nodes = graph.len(),
            "folder depth disagrees with dependency edges; falling back to Kahn ordering"
        );
        kahn_order(graph)
    }
}

/// Stable bucket sort by decreasing depth (deepest first).
fn depth_order(nodes: &[Artifact]) -> Vec<usize> {
    let max_depth = nodes.iter().map(|a| a.folder_depth).max().unwrap_or(0);
    let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); max_depth + 1];
    for (idx, artifact) in nodes.iter().enumerate() {
        buckets[artifact.folder_depth].push(idx);
    }
    buckets.into_iter().rev().flatten().collect()
}

fn respects_edges(graph: &DependencyGraph, order: &[usize]) -> bool {
    let mut position = vec![0usize; order.len()];
    for (pos, &idx) in order.iter().enumerate() {
        position[idx] = pos;
    }
    (0..graph.len()).all(|from| {
        graph
            .downstream_of(from)
            .iter()
            .all(|&to| position[from] < position[to])
    })
}

/// Kahn's algorithm; ties broken by insertion order.
fn kahn_order(graph: &DependencyGraph) -> DeployResult<Vec<usize>> {
    let n = graph.len();
    let mut in_degree: Vec<usize> = (0..n).map(|idx| graph.upstream_of(idx).len()).collect();
    let mut ready: BinaryHeap<Reverse<usize>> = (0..n)
        .filter(|&idx| in_degree[idx] == 0)
        .map(Reverse)
        .collect();

    let mut sorted = Vec::with_capacity(n);
    while let Some(Reverse(idx)) = ready.pop() {
        sorted.push(idx);
        for &dependent in graph.downstream_of(idx) {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }

    if sorted.len() != n {
        let nodes = graph.nodes();
        return Err(DeployError::CyclicDependency {
            artifacts: (0..n)
                .filter(|&idx| in_degree[idx] > 0)
                .map(|idx| nodes[idx].name.clone())
                .collect(),
        });
    }
    Ok(sorted)
}
