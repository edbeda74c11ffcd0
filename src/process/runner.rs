//! Run a single node's command to completion

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use wait_timeout::ChildExt;

use super::kill_process_tree;
use super::stream::{pump, StreamConsumer, StreamMode};
use crate::buffer::{BufferReader, OutputWriter};
use crate::command::CommandSpec;

/// Default time to wait for pump threads after the child exited
pub const DEFAULT_OUTPUT_COLLECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// The process could not be started at all
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("program '{program}' not found")]
    NotFound { program: String },

    #[error("working directory '{}' does not exist", .0.display())]
    WorkingDir(PathBuf),

    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Everything needed to run one node
pub struct RunRequest {
    /// Node ID, used for thread names and logs
    pub id: String,
    pub command: CommandSpec,
    /// Effective working directory
    pub working_dir: PathBuf,
    /// Effective timeout; `None` waits forever
    pub timeout: Option<Duration>,
    /// Source for the child's stdin; `None` closes it
    pub stdin: Option<BufferReader>,
    /// Receives a copy of the child's stdout
    pub stdout_tee: Option<OutputWriter>,
    pub stdout_mode: StreamMode,
}

/// How a launched process ended
#[derive(Debug)]
pub struct RunOutcome<C> {
    pub pid: u32,
    /// `None` when killed or terminated by a signal
    pub exit_code: Option<i32>,
    /// Killed by the watchdog
    pub timed_out: bool,
    pub elapsed: Duration,
    /// The consumers handed back, or `None` if their pump did not finish
    /// within the output collection timeout
    pub stdout: Option<C>,
    pub stderr: Option<C>,
}

/// Launches processes and supervises them until they exit
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    output_collection_timeout: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_COLLECTION_TIMEOUT)
    }
}

impl ProcessRunner {
    pub fn new(output_collection_timeout: Duration) -> Self {
        Self {
            output_collection_timeout,
        }
    }

    /// Run `request` to completion, feeding output into the consumers.
    ///
    /// Only failures to start the process are errors; exit codes and
    /// timeouts are part of the outcome.
    pub fn run<C>(
        &self,
        request: RunRequest,
        stdout_consumer: C,
        stderr_consumer: C,
    ) -> Result<RunOutcome<C>, LaunchError>
    where
        C: StreamConsumer + 'static,
    {
        let RunRequest {
            id,
            command,
            working_dir,
            timeout,
            stdin,
            stdout_tee,
            stdout_mode,
        } = request;

        // Relative paths must not be resolved a second time after chdir
        let working_dir = std::path::absolute(&working_dir)
            .map_err(|_| LaunchError::WorkingDir(working_dir.clone()))?;
        let mut child = spawn(&command, &working_dir, stdin.is_some())?;
        let pid = child.id();
        let start = Instant::now();
        tracing::debug!(node = %id, pid, command = %command, "process started");

        // Start draining before waiting: a child blocked on a full pipe
        // would never exit.
        let feeder = match (child.stdin.take(), stdin) {
            (Some(pipe), Some(source)) => spawn_feeder(&id, pipe, source),
            _ => None,
        };
        let stdout_rx = spawn_pump(
            format!("{id}-stdout"),
            child.stdout.take(),
            stdout_mode,
            stdout_consumer,
            stdout_tee,
        );
        let stderr_rx = spawn_pump(
            format!("{id}-stderr"),
            child.stderr.take(),
            StreamMode::Text,
            stderr_consumer,
            None,
        );

        let (exit_code, timed_out) = wait(&id, &mut child, timeout);
        let elapsed = start.elapsed();

        let stdout = self.collect(&id, "stdout", stdout_rx);
        let stderr = self.collect(&id, "stderr", stderr_rx);
        // The feeder ends once the child's stdin is closed; detach it if the
        // source is still blocked on an unfinished producer.
        drop(feeder);

        Ok(RunOutcome {
            pid,
            exit_code,
            timed_out,
            elapsed,
            stdout,
            stderr,
        })
    }

    fn collect<C>(&self, id: &str, stream: &str, rx: mpsc::Receiver<C>) -> Option<C> {
        match rx.recv_timeout(self.output_collection_timeout) {
            Ok(consumer) => Some(consumer),
            Err(_) => {
                tracing::warn!(
                    node = %id,
                    stream,
                    timeout_secs = self.output_collection_timeout.as_secs(),
                    "output collection timed out, a descendant may still hold the pipe open"
                );
                None
            }
        }
    }
}

fn spawn(command: &CommandSpec, working_dir: &Path, piped_stdin: bool) -> Result<Child, LaunchError> {
    if !working_dir.is_dir() {
        return Err(LaunchError::WorkingDir(working_dir.to_path_buf()));
    }
    let program = resolve_program(command, working_dir)?;

    let mut cmd = Command::new(&program);
    cmd.args(&command.args)
        .current_dir(working_dir)
        .stdin(if piped_stdin {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    for key in &command.unset_env {
        cmd.env_remove(key);
    }
    cmd.envs(&command.env);

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    cmd.spawn().map_err(|source| LaunchError::Spawn {
        program: command.command.clone(),
        source,
    })
}

/// Bare names are looked up on `PATH` (the overridden one, if set), names
/// with a path separator are taken relative to the working directory.
fn resolve_program(command: &CommandSpec, working_dir: &Path) -> Result<PathBuf, LaunchError> {
    let name = Path::new(&command.command);
    let not_found = || LaunchError::NotFound {
        program: command.command.clone(),
    };

    if name.components().count() > 1 || name.is_absolute() {
        let full = working_dir.join(name);
        return if full.is_file() { Ok(full) } else { Err(not_found()) };
    }

    let found = match command.env.get("PATH") {
        Some(path) => which::which_in(&command.command, Some(path), working_dir),
        None => which::which(&command.command),
    };
    found.map_err(|_| not_found())
}

/// Wait for the child, killing its process group when `timeout` expires.
fn wait(id: &str, child: &mut Child, timeout: Option<Duration>) -> (Option<i32>, bool) {
    let waited = match timeout {
        Some(limit) => child.wait_timeout(limit),
        None => child.wait().map(Some),
    };

    match waited {
        Ok(Some(status)) => (status.code(), false),
        Ok(None) => {
            tracing::warn!(
                node = %id,
                pid = child.id(),
                timeout_ms = timeout.map(|t| t.as_millis() as u64).unwrap_or_default(),
                "timeout expired, killing process"
            );
            kill_process_tree(child);
            (None, true)
        }
        Err(e) => {
            tracing::error!(node = %id, error = %e, "failed to wait for process");
            kill_process_tree(child);
            (None, false)
        }
    }
}

fn spawn_feeder(
    id: &str,
    mut pipe: ChildStdin,
    mut source: BufferReader,
) -> Option<thread::JoinHandle<()>> {
    let node = id.to_string();
    let spawned = thread::Builder::new()
        .name(format!("{id}-stdin"))
        .spawn(move || {
            match io::copy(&mut source, &mut pipe) {
                Ok(bytes) => tracing::trace!(node = %node, bytes, "stdin fed"),
                // The consumer may exit without reading all of its input
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                    tracing::debug!(node = %node, "stdin closed by process");
                }
                Err(e) => tracing::warn!(node = %node, error = %e, "failed to feed stdin"),
            }
            let _ = pipe.flush();
        });
    match spawned {
        Ok(handle) => Some(handle),
        // Without a thread the pipe is dropped here, so the child sees EOF
        Err(e) => {
            tracing::error!(node = %id, error = %e, "failed to start stdin feeder");
            None
        }
    }
}

fn spawn_pump<R, C>(
    name: String,
    stream: Option<R>,
    mode: StreamMode,
    mut consumer: C,
    mut tee: Option<OutputWriter>,
) -> mpsc::Receiver<C>
where
    R: Read + Send + 'static,
    C: StreamConsumer + 'static,
{
    let (tx, rx) = mpsc::channel();
    let body = move || {
        if let Some(stream) = stream {
            if let Err(e) = pump(stream, mode, &mut consumer, tee.as_mut()) {
                tracing::warn!(error = %e, "failed reading process output");
            }
        }
        drop(tee);
        let _ = tx.send(consumer);
    };

    if let Err(e) = thread::Builder::new().name(name).spawn(body) {
        tracing::error!(error = %e, "failed to start output pump");
    }
    rx
}
