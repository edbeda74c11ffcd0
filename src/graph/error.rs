//! Configuration errors reported by the resolver

use thiserror::Error;

/// A graph that cannot be executed.
///
/// All of these are detected before any process is launched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("node #{index} has no ID")]
    MissingId { index: usize },

    #[error("ID '{0}' is not unique")]
    DuplicateId(String),

    #[error("node '{0}' cannot pipe from itself")]
    SelfPipe(String),

    #[error("node '{0}' cannot wait for itself")]
    SelfWait(String),

    #[error("node '{id}' pipes from {count} nodes, only a single piped source is allowed")]
    MultiplePipeSources { id: String, count: usize },

    #[error("node '{id}' is piped from non-existing node '{missing}'")]
    UnknownPipeSource { id: String, missing: String },

    #[error("node '{id}' waits for non-existing node '{missing}'")]
    UnknownWaitTarget { id: String, missing: String },

    #[error("node '{id}': {reason}")]
    InvalidCommand { id: String, reason: String },

    #[error("edit directive targets non-existing node '{0}'")]
    UnknownEditTarget(String),

    #[error("conflicting edit directives: node '{0}' is repiped more than once")]
    ConflictingEdits(String),

    #[error("loop detected, node '{node}' is within loop: {}", .path.join(" -> "))]
    Cycle { node: String, path: Vec<String> },

    #[error("{} configuration errors:\n  - {}", .0.len(), join_errors(.0))]
    Multiple(Vec<GraphError>),
}

impl GraphError {
    /// Collapse a list of problems into one error
    pub(crate) fn from_list(mut errors: Vec<GraphError>) -> Option<GraphError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(GraphError::Multiple(errors)),
        }
    }

    /// Every individual problem, flattening `Multiple`
    pub fn problems(&self) -> Vec<&GraphError> {
        match self {
            GraphError::Multiple(errors) => errors.iter().flat_map(|e| e.problems()).collect(),
            other => vec![other],
        }
    }
}

fn join_errors(errors: &[GraphError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n  - ")
}
