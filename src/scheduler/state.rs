//! Node and run states tracked by the coordinator

use std::fmt;

/// Lifecycle of one node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Pending,
    /// Buffers wired, thread being spawned
    Starting,
    Running,
    Finished,
    /// Never started because a predecessor failed
    Skipped,
}

impl NodeState {
    /// Terminal states: satisfy `wait_for` edges
    pub fn is_done(self) -> bool {
        matches!(self, NodeState::Finished | NodeState::Skipped)
    }

    /// States in which the node's output buffer exists
    pub fn can_feed_pipe(self) -> bool {
        matches!(self, NodeState::Running | NodeState::Finished)
    }
}

/// Phase of a whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    /// Starting and collecting nodes
    Running,
    /// No more starts; waiting for running nodes
    Draining,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Initializing => "initializing",
            Phase::Running => "running",
            Phase::Draining => "draining",
            Phase::Done => "done",
        };
        f.write_str(s)
    }
}
