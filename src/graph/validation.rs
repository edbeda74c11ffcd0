//! Structural validation of the node set

use std::collections::HashSet;

use super::error::GraphError;
use super::nodes::NodeSpec;

/// Check IDs are present and unique.
///
/// Runs before directives are applied, since directive targets must be
/// unambiguous.
pub(crate) fn check_ids(nodes: &[NodeSpec]) -> Vec<GraphError> {
    let mut seen = HashSet::new();
    let mut errors = Vec::new();

    for (index, node) in nodes.iter().enumerate() {
        if node.id.trim().is_empty() {
            errors.push(GraphError::MissingId { index });
            continue;
        }
        if !seen.insert(node.id.as_str()) {
            errors.push(GraphError::DuplicateId(node.id.clone()));
        }
    }

    errors
}

/// Validate the surviving nodes after edits:
/// - the command descriptor is valid
/// - no node pipes from or waits for itself
/// - at most one piped source
/// - every referenced node exists
pub(crate) fn check_edges(nodes: &[NodeSpec]) -> Vec<GraphError> {
    let ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let mut errors = Vec::new();

    for node in nodes {
        if let Err(reason) = node.command.validate() {
            errors.push(GraphError::InvalidCommand {
                id: node.id.clone(),
                reason,
            });
        }

        if node.pipe_from.iter().any(|src| src == &node.id) {
            errors.push(GraphError::SelfPipe(node.id.clone()));
        }
        if node.wait_for.iter().any(|dep| dep == &node.id) {
            errors.push(GraphError::SelfWait(node.id.clone()));
        }

        if node.pipe_from.len() > 1 {
            errors.push(GraphError::MultiplePipeSources {
                id: node.id.clone(),
                count: node.pipe_from.len(),
            });
        }

        for src in &node.pipe_from {
            if src != &node.id && !ids.contains(src.as_str()) {
                errors.push(GraphError::UnknownPipeSource {
                    id: node.id.clone(),
                    missing: src.clone(),
                });
            }
        }
        for dep in &node.wait_for {
            if dep != &node.id && !ids.contains(dep.as_str()) {
                errors.push(GraphError::UnknownWaitTarget {
                    id: node.id.clone(),
                    missing: dep.clone(),
                });
            }
        }
    }

    errors
}
