//! Pipeline graph: validation, edit directives and execution order
//!
//! Resolution is a two-phase pipeline. The configured nodes are never
//! mutated; directives are applied to a copy, the copy is validated and
//! checked for loops, and only then frozen into a [`ResolvedGraph`] that the
//! scheduler reads.

mod cycle;
mod edits;
mod error;
mod nodes;
mod validation;

#[cfg(test)]
mod tests;

use serde::Serialize;
use std::collections::{HashMap, VecDeque};

pub use cycle::{detect_cycles, CycleCheck};
pub use error::GraphError;
pub use nodes::{EditDirective, NodeSpec, ResolvedNode};

/// Validated, immutable node set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedGraph {
    /// Surviving nodes in declaration order
    nodes: Vec<ResolvedNode>,
    /// Nodes removed by disable directives, in declaration order
    disabled: Vec<String>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

/// Validate `nodes` and apply `edits`.
///
/// Fails atomically: either every check passes and the whole graph is
/// returned, or nothing is.
pub fn resolve(nodes: &[NodeSpec], edits: &[EditDirective]) -> Result<ResolvedGraph, GraphError> {
    let mut errors = validation::check_ids(nodes);
    if errors.is_empty() {
        errors.extend(edits::check_directives(nodes, edits));
    }
    if let Some(err) = GraphError::from_list(errors) {
        return Err(err);
    }

    let edited = edits::apply(nodes, edits);

    if let Some(err) = GraphError::from_list(validation::check_edges(&edited.nodes)) {
        return Err(err);
    }

    if let CycleCheck::CycleAt { node, path } = detect_cycles(&edited.nodes) {
        return Err(GraphError::Cycle { node, path });
    }

    let nodes: Vec<ResolvedNode> = edited
        .nodes
        .into_iter()
        .map(|n| {
            let mut wait_for: Vec<String> = Vec::with_capacity(n.wait_for.len());
            for dep in n.wait_for {
                if !wait_for.contains(&dep) {
                    wait_for.push(dep);
                }
            }
            ResolvedNode {
                pipe_from: n.pipe_from.into_iter().next(),
                id: n.id,
                wait_for,
                command: n.command,
            }
        })
        .collect();

    let index = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.clone(), i))
        .collect();

    if !edited.disabled.is_empty() {
        tracing::info!(disabled = ?edited.disabled, "nodes disabled by edit directives");
    }

    Ok(ResolvedGraph {
        nodes,
        disabled: edited.disabled,
        index,
    })
}

impl ResolvedGraph {
    /// Surviving nodes in declaration order
    pub fn nodes(&self) -> &[ResolvedNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ResolvedNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Position of `id` in declaration order
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// IDs removed by disable directives
    pub fn disabled(&self) -> &[String] {
        &self.disabled
    }

    /// IDs of the nodes reading `id`'s stdout
    pub fn consumers_of(&self, id: &str) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|n| n.pipe_from.as_deref() == Some(id))
            .map(|n| n.id.clone())
            .collect()
    }

    /// A topological order of the nodes (Kahn's algorithm).
    ///
    /// Roots come out in declaration order, so the result is deterministic.
    pub fn topological_order(&self) -> Vec<String> {
        let mut in_degree: Vec<usize> = self
            .nodes
            .iter()
            .map(|n| n.predecessors().count())
            .collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        for (i, node) in self.nodes.iter().enumerate() {
            for pred in node.predecessors() {
                if let Some(&p) = self.index.get(pred) {
                    dependents[p].push(i);
                }
            }
        }

        let mut queue: VecDeque<usize> = (0..self.nodes.len())
            .filter(|&i| in_degree[i] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(i) = queue.pop_front() {
            order.push(self.nodes[i].id.clone());
            for &d in &dependents[i] {
                in_degree[d] -= 1;
                if in_degree[d] == 0 {
                    queue.push_back(d);
                }
            }
        }

        order
    }
}
