//! Per-stream capture of node output

use crate::process::StreamConsumer;
use crate::result::CapturedOutput;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StreamKind {
    Stdout,
    Stderr,
}

/// Logs, stores and scans one stream of a node.
///
/// Lines over `max_lines` are counted but not kept. Binary chunks are only
/// measured and never logged.
pub(crate) struct NodeCapture {
    node: String,
    kind: StreamKind,
    max_lines: usize,
    error_str: Option<String>,
    lines: Vec<String>,
    dropped: usize,
    bytes: u64,
    error_seen: bool,
}

impl NodeCapture {
    pub fn new(node: &str, kind: StreamKind, max_lines: usize, error_str: Option<String>) -> Self {
        Self {
            node: node.to_string(),
            kind,
            max_lines,
            error_str,
            lines: Vec::new(),
            dropped: 0,
            bytes: 0,
            error_seen: false,
        }
    }

    /// The configured error string was found
    pub fn error_seen(&self) -> bool {
        self.error_seen
    }

    pub fn into_output(self, binary: bool) -> CapturedOutput {
        if binary {
            CapturedOutput::Binary { bytes: self.bytes }
        } else {
            CapturedOutput::Lines {
                lines: self.lines,
                dropped: self.dropped,
            }
        }
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

impl StreamConsumer for NodeCapture {
    fn consume_line(&mut self, line: &str) {
        self.bytes += line.len() as u64 + 1;

        match self.kind {
            StreamKind::Stdout => tracing::debug!(node = %self.node, "{line}"),
            StreamKind::Stderr => tracing::warn!(node = %self.node, "{line}"),
        }

        if let Some(needle) = &self.error_str {
            if !self.error_seen && line.contains(needle.as_str()) {
                tracing::warn!(node = %self.node, error_str = %needle, "error string found in output");
                self.error_seen = true;
            }
        }

        if self.lines.len() < self.max_lines {
            self.lines.push(line.to_string());
        } else {
            self.dropped += 1;
        }
    }

    fn consume_bytes(&mut self, chunk: &[u8]) {
        self.bytes += chunk.len() as u64;
    }
}
