//! Node and edit directive types for the pipeline graph

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::command::CommandSpec;

/// A node as configured, before resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "NodeEntry", into = "NodeEntry")]
pub struct NodeSpec {
    pub id: String,
    /// Node whose stdout becomes this node's stdin (at most one)
    pub pipe_from: Vec<String>,
    /// Nodes that must finish before this one starts
    pub wait_for: Vec<String>,
    pub command: CommandSpec,
}

/// Flat file form of a node: edges and command fields side by side.
///
/// Unknown keys are rejected so a misspelled edge cannot vanish silently.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct NodeEntry {
    id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pipe_from: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    wait_for: Vec<String>,
    command: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    working_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    unset_env: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_str: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    binary: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    gzip: Option<bool>,
}

impl From<NodeEntry> for NodeSpec {
    fn from(entry: NodeEntry) -> Self {
        NodeSpec {
            id: entry.id,
            pipe_from: entry.pipe_from,
            wait_for: entry.wait_for,
            command: CommandSpec {
                command: entry.command,
                args: entry.args,
                working_dir: entry.working_dir,
                env: entry.env,
                unset_env: entry.unset_env,
                error_str: entry.error_str,
                timeout: entry.timeout,
                binary: entry.binary,
                gzip: entry.gzip,
            },
        }
    }
}

impl From<NodeSpec> for NodeEntry {
    fn from(node: NodeSpec) -> Self {
        let CommandSpec {
            command,
            args,
            working_dir,
            env,
            unset_env,
            error_str,
            timeout,
            binary,
            gzip,
        } = node.command;
        NodeEntry {
            id: node.id,
            pipe_from: node.pipe_from,
            wait_for: node.wait_for,
            command,
            args,
            working_dir,
            env,
            unset_env,
            error_str,
            timeout,
            binary,
            gzip,
        }
    }
}

impl NodeSpec {
    pub fn new(id: impl Into<String>, command: CommandSpec) -> Self {
        Self {
            id: id.into(),
            pipe_from: Vec::new(),
            wait_for: Vec::new(),
            command,
        }
    }

    pub fn pipe_from(mut self, source: impl Into<String>) -> Self {
        self.pipe_from.push(source.into());
        self
    }

    pub fn wait_for(mut self, target: impl Into<String>) -> Self {
        self.wait_for.push(target.into());
        self
    }
}

/// Rewrites applied to the graph before it is validated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditDirective {
    /// Replace the edges of `target`. An absent list keeps the current one.
    Repipe {
        target: String,
        #[serde(default)]
        pipe_from: Option<Vec<String>>,
        #[serde(default)]
        wait_for: Option<Vec<String>>,
    },
    /// Remove `target` and everything transitively piped from it
    Disable { target: String },
}

impl EditDirective {
    pub fn repipe(target: impl Into<String>, pipe_from: Option<&str>) -> Self {
        EditDirective::Repipe {
            target: target.into(),
            pipe_from: Some(pipe_from.map(String::from).into_iter().collect()),
            wait_for: None,
        }
    }

    pub fn disable(target: impl Into<String>) -> Self {
        EditDirective::Disable {
            target: target.into(),
        }
    }

    pub fn target(&self) -> &str {
        match self {
            EditDirective::Repipe { target, .. } | EditDirective::Disable { target } => target,
        }
    }
}

/// A validated node, ready to be scheduled
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedNode {
    pub id: String,
    pub pipe_from: Option<String>,
    /// Deduplicated, in configured order
    pub wait_for: Vec<String>,
    pub command: CommandSpec,
}

impl ResolvedNode {
    /// All predecessors: the piped source first, then waited-for nodes
    pub fn predecessors(&self) -> impl Iterator<Item = &str> {
        self.pipe_from
            .iter()
            .map(String::as_str)
            .chain(self.wait_for.iter().map(String::as_str))
    }
}
