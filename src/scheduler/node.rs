//! Body of a node thread: run the command and build its result

use chrono::Utc;
use std::time::Instant;

use super::capture::{NodeCapture, StreamKind};
use crate::process::{ProcessRunner, RunRequest};
use crate::result::{format_elapsed, ErrorMarker, Message, NodeResult};

/// Work handed to a node thread
pub(crate) struct NodeJob {
    pub request: RunRequest,
    /// Stdout is binary: measured, never logged or stored
    pub binary: bool,
    pub max_lines: usize,
}

impl NodeJob {
    pub fn execute(self, runner: &ProcessRunner) -> NodeResult {
        let NodeJob {
            request,
            binary,
            max_lines,
        } = self;

        let id = request.id.clone();
        let command = request.command.to_string();
        let error_str = request.command.error_str.clone();
        let timeout = request.timeout;
        let started_at = Utc::now();
        let clock = Instant::now();

        tracing::info!(node = %id, command = %command, "node started");

        let stdout = NodeCapture::new(&id, StreamKind::Stdout, max_lines, error_str.clone());
        let stderr = NodeCapture::new(&id, StreamKind::Stderr, max_lines, error_str.clone());

        let mut result = NodeResult {
            started_at: Some(started_at),
            ..NodeResult::new(&id, &command)
        };

        match runner.run(request, stdout, stderr) {
            Err(e) => {
                tracing::error!(node = %id, error = %e, "failed to launch process");
                result.messages.push(Message::error(e.to_string()));
                result.error = Some(ErrorMarker::Launch(e.to_string()));
            }
            Ok(outcome) => {
                result.pid = Some(outcome.pid);
                result.exit_code = outcome.exit_code;

                let mut error_seen = false;
                match outcome.stdout {
                    Some(cap) => {
                        error_seen |= !binary && cap.error_seen();
                        result.stdout = cap.into_output(binary);
                    }
                    None => result
                        .messages
                        .push(Message::error("stdout collection timed out")),
                }
                match outcome.stderr {
                    Some(cap) => {
                        error_seen |= cap.error_seen();
                        result.stderr = cap.into_lines();
                    }
                    None => result
                        .messages
                        .push(Message::error("stderr collection timed out")),
                }

                if outcome.timed_out {
                    let limit = format_elapsed(timeout.unwrap_or_default());
                    result
                        .messages
                        .push(Message::error(format!("process killed after {limit} timeout")));
                    result.error = Some(ErrorMarker::Timeout);
                } else if error_seen {
                    let needle = error_str.unwrap_or_default();
                    result
                        .messages
                        .push(Message::error(format!("error string '{needle}' found in output")));
                    result.error = Some(ErrorMarker::ErrorString(needle));
                } else {
                    match outcome.exit_code {
                        Some(0) => result.messages.push(Message::info("exit code 0")),
                        Some(code) => {
                            result.messages.push(Message::error(format!("exit code {code}")));
                            result.error = Some(ErrorMarker::ExitCode(code));
                        }
                        None => {
                            result
                                .messages
                                .push(Message::error("process terminated by a signal"));
                            result.error = Some(ErrorMarker::Terminated);
                        }
                    }
                }
            }
        }

        result.finished_at = Some(Utc::now());
        result.elapsed = clock.elapsed();

        match &result.error {
            None => tracing::info!(node = %id, elapsed_ms = result.elapsed.as_millis() as u64, "node finished"),
            Some(marker) => tracing::warn!(node = %id, error = %marker, "node failed"),
        }

        result
    }
}
