//! Execution results
//!
//! A result lists every surviving node exactly once: started nodes in start
//! order, then the ones that never ran. The root carries the first node error
//! (or the global timeout) so callers can check success with one call.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Why a node (or the whole run) is considered failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ErrorMarker {
    /// The process could not be started
    Launch(String),
    /// Killed by its own watchdog
    Timeout,
    /// The configured error string showed up in the output
    ErrorString(String),
    /// Exited with a non-zero code
    ExitCode(i32),
    /// Ended without an exit code (killed by a signal)
    Terminated,
    /// The global deadline expired
    GlobalTimeout,
    /// Never started
    NotStarted,
    /// Not started because a predecessor failed
    Skipped { failed: String },
    /// The node task panicked
    Panicked(String),
}

impl ErrorMarker {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ErrorMarker::Timeout | ErrorMarker::GlobalTimeout)
    }
}

impl fmt::Display for ErrorMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorMarker::Launch(reason) => write!(f, "exec error: {reason}"),
            ErrorMarker::Timeout => write!(f, "build timeout"),
            ErrorMarker::ErrorString(needle) => write!(f, "error string found: '{needle}'"),
            ErrorMarker::ExitCode(code) => write!(f, "return code is {code}"),
            ErrorMarker::Terminated => write!(f, "terminated without exit code"),
            ErrorMarker::GlobalTimeout => write!(f, "build timeout (global deadline expired)"),
            ErrorMarker::NotStarted => write!(f, "not started"),
            ErrorMarker::Skipped { failed } => write!(f, "skipped, '{failed}' failed"),
            ErrorMarker::Panicked(msg) => write!(f, "node task panicked: {msg}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Info,
    Error,
}

/// A line of diagnostic text attached to a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub priority: Priority,
    pub text: String,
}

impl Message {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            priority: Priority::Info,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            priority: Priority::Error,
            text: text.into(),
        }
    }
}

/// Captured stdout of a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CapturedOutput {
    /// Text output; `dropped` counts lines over the capture limit
    Lines { lines: Vec<String>, dropped: usize },
    /// Binary output is never stored, only measured
    Binary { bytes: u64 },
}

impl Default for CapturedOutput {
    fn default() -> Self {
        CapturedOutput::Lines {
            lines: Vec::new(),
            dropped: 0,
        }
    }
}

impl CapturedOutput {
    /// Captured text lines; empty for binary output
    pub fn lines(&self) -> &[String] {
        match self {
            CapturedOutput::Lines { lines, .. } => lines,
            CapturedOutput::Binary { .. } => &[],
        }
    }
}

/// Outcome of a single node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeResult {
    pub id: String,
    /// Rendered command line
    pub command: String,
    pub pid: Option<u32>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    pub exit_code: Option<i32>,
    pub messages: Vec<Message>,
    pub stdout: CapturedOutput,
    pub stderr: Vec<String>,
    pub error: Option<ErrorMarker>,
}

impl NodeResult {
    pub fn new(id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            command: command.into(),
            pid: None,
            started_at: None,
            finished_at: None,
            elapsed: Duration::ZERO,
            exit_code: None,
            messages: Vec::new(),
            stdout: CapturedOutput::default(),
            stderr: Vec::new(),
            error: None,
        }
    }

    /// Result of a node that never ran
    pub fn not_started(id: impl Into<String>, command: impl Into<String>, marker: ErrorMarker) -> Self {
        Self {
            error: Some(marker),
            ..Self::new(id, command)
        }
    }

    pub fn started(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of a whole pipeline run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    /// First node error in start order, or the global timeout
    pub error: Option<ErrorMarker>,
    /// The global deadline expired
    pub timed_out: bool,
    pub nodes: Vec<NodeResult>,
    /// Nodes removed by edit directives
    pub disabled: Vec<String>,
}

impl ExecutionResult {
    /// Build the root from node results, promoting the first error.
    pub(crate) fn assemble(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        elapsed: Duration,
        timed_out: bool,
        nodes: Vec<NodeResult>,
        disabled: Vec<String>,
    ) -> Self {
        // First real failure, then the deadline; NotStarted only as a last resort
        let error = nodes
            .iter()
            .filter_map(|n| n.error.as_ref())
            .find(|e| **e != ErrorMarker::NotStarted)
            .cloned()
            .or(timed_out.then_some(ErrorMarker::GlobalTimeout))
            .or_else(|| nodes.iter().find_map(|n| n.error.clone()));

        Self {
            run_id,
            started_at,
            elapsed,
            error,
            timed_out,
            nodes,
            disabled,
        }
    }

    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    pub fn node(&self, id: &str) -> Option<&NodeResult> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn failed_nodes(&self) -> impl Iterator<Item = &NodeResult> {
        self.nodes.iter().filter(|n| !n.success())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Format elapsed time in human-readable format
pub fn format_elapsed(elapsed: Duration) -> String {
    let seconds = elapsed.as_secs();
    if seconds == 0 {
        format!("{}ms", elapsed.as_millis())
    } else if seconds < 60 {
        format!("{}.{}s", seconds, elapsed.subsec_millis() / 100)
    } else if seconds < 3600 {
        format!("{}m{}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h{}m", seconds / 3600, (seconds % 3600) / 60)
    }
}
