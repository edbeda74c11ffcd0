//! Repipe and disable directives

use std::collections::{HashMap, HashSet};

use super::error::GraphError;
use super::nodes::{EditDirective, NodeSpec};

/// Outcome of applying edit directives to a candidate node set
#[derive(Debug)]
pub(crate) struct EditedNodes {
    pub nodes: Vec<NodeSpec>,
    /// Removed IDs in declaration order
    pub disabled: Vec<String>,
}

/// Check that every directive targets an existing node and that no node is
/// repiped twice.
pub(crate) fn check_directives(nodes: &[NodeSpec], edits: &[EditDirective]) -> Vec<GraphError> {
    let ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let mut repiped = HashSet::new();
    let mut errors = Vec::new();

    for edit in edits {
        let target = edit.target();
        if !ids.contains(target) {
            errors.push(GraphError::UnknownEditTarget(target.to_string()));
            continue;
        }
        if matches!(edit, EditDirective::Repipe { .. }) && !repiped.insert(target) {
            errors.push(GraphError::ConflictingEdits(target.to_string()));
        }
    }

    errors
}

/// Apply directives to a copy of `nodes`.
///
/// Repipes go first so that a node whose source is about to be disabled can
/// be moved onto another source. Disabling then removes the target and, to a
/// fixpoint, every node piped from a removed node. Survivors forget
/// `wait_for` references to removed nodes.
pub(crate) fn apply(nodes: &[NodeSpec], edits: &[EditDirective]) -> EditedNodes {
    let mut nodes: Vec<NodeSpec> = nodes.to_vec();

    let repipes: HashMap<&str, &EditDirective> = edits
        .iter()
        .filter(|e| matches!(e, EditDirective::Repipe { .. }))
        .map(|e| (e.target(), e))
        .collect();

    for node in &mut nodes {
        if let Some(EditDirective::Repipe {
            pipe_from,
            wait_for,
            ..
        }) = repipes.get(node.id.as_str())
        {
            if let Some(pipe_from) = pipe_from {
                node.pipe_from = pipe_from.clone();
            }
            if let Some(wait_for) = wait_for {
                node.wait_for = wait_for.clone();
            }
            tracing::debug!(
                node = %node.id,
                pipe_from = ?node.pipe_from,
                wait_for = ?node.wait_for,
                "node repiped"
            );
        }
    }

    let mut removed: HashSet<String> = edits
        .iter()
        .filter_map(|e| match e {
            EditDirective::Disable { target } => Some(target.clone()),
            EditDirective::Repipe { .. } => None,
        })
        .collect();

    loop {
        let cascaded: Vec<String> = nodes
            .iter()
            .filter(|n| !removed.contains(&n.id))
            .filter(|n| n.pipe_from.iter().any(|src| removed.contains(src)))
            .map(|n| n.id.clone())
            .collect();
        if cascaded.is_empty() {
            break;
        }
        for id in cascaded {
            tracing::debug!(node = %id, "node disabled, its piped source is disabled");
            removed.insert(id);
        }
    }

    let disabled: Vec<String> = nodes
        .iter()
        .filter(|n| removed.contains(&n.id))
        .map(|n| n.id.clone())
        .collect();

    nodes.retain(|n| !removed.contains(&n.id));
    for node in &mut nodes {
        node.wait_for.retain(|dep| !removed.contains(dep));
    }

    EditedNodes { nodes, disabled }
}
