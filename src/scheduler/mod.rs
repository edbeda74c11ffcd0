//! Polling scheduler for a resolved pipeline graph
//!
//! The coordinating thread is the only owner of node state. It starts every
//! eligible node, then blocks (bounded by the poll interval and the global
//! deadline) until node threads report completion through the task group.
//!
//! A pending node may start once its piped source is running or finished and
//! every node it waits for has finished.

mod capture;
mod node;
mod pool;
mod state;


use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::buffer::{BufferReader, Compression, OutputBuffer};
use crate::graph::{ResolvedGraph, ResolvedNode};
use crate::process::{ProcessRunner, RunRequest, StreamMode};
use crate::result::{ErrorMarker, ExecutionResult, Message, NodeResult};

use node::NodeJob;
pub use pool::TaskGroup;
pub use state::{NodeState, Phase};

/// What happens to dependents of a failed node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Failures cancel nothing; dependents run once their predecessors end
    #[default]
    Continue,
    /// Dependents of a failed node are not started and count as failed
    SkipDependents,
}

/// Scheduler tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Longest the coordinator blocks between scans
    pub poll_interval: Duration,
    /// Pause after each launch
    pub launch_delay: Duration,
    pub failure_policy: FailurePolicy,
    /// Grace period for output pumps after a process exited
    pub output_collection_timeout: Duration,
    /// Lines kept per captured stream
    pub max_captured_lines: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        // Rapid successive process creation is unreliable on Windows
        let launch_delay = if cfg!(windows) {
            Duration::from_secs(1)
        } else {
            Duration::ZERO
        };
        Self {
            poll_interval: Duration::from_secs(1),
            launch_delay,
            failure_policy: FailurePolicy::Continue,
            output_collection_timeout: crate::process::runner::DEFAULT_OUTPUT_COLLECTION_TIMEOUT,
            max_captured_lines: 10_000,
        }
    }
}

/// Pipeline-wide defaults for values a node leaves unset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDefaults {
    pub working_dir: PathBuf,
    /// Global timeout
    pub timeout: Option<Duration>,
    pub gzip: bool,
    pub binary: bool,
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("."),
            timeout: None,
            gzip: false,
            binary: false,
        }
    }
}

/// Executes a resolved graph once
pub struct Scheduler<'g> {
    graph: &'g ResolvedGraph,
    config: SchedulerConfig,
    defaults: RunDefaults,
    runner: ProcessRunner,
    phase: Phase,
    states: Vec<NodeState>,
    tasks: TaskGroup<NodeResult>,
    /// Output buffers by producer ID, until released
    buffers: HashMap<String, OutputBuffer>,
    results: HashMap<String, NodeResult>,
    launched: HashMap<String, DateTime<Utc>>,
    start_order: Vec<String>,
    failed: HashSet<String>,
    deadline: Option<Instant>,
    timed_out: bool,
}

impl<'g> Scheduler<'g> {
    pub fn new(graph: &'g ResolvedGraph, config: SchedulerConfig, defaults: RunDefaults) -> Self {
        let runner = ProcessRunner::new(config.output_collection_timeout);
        Self {
            graph,
            config,
            defaults,
            runner,
            phase: Phase::Initializing,
            states: vec![NodeState::Pending; graph.len()],
            tasks: TaskGroup::new(),
            buffers: HashMap::new(),
            results: HashMap::new(),
            launched: HashMap::new(),
            start_order: Vec::new(),
            failed: HashSet::new(),
            deadline: None,
            timed_out: false,
        }
    }

    /// Run every node and assemble the result. Never fails: node problems
    /// are reported through error markers.
    pub fn run(mut self) -> ExecutionResult {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();
        self.deadline = self.defaults.timeout.map(|t| clock + t);

        tracing::info!(
            run_id = %run_id,
            nodes = self.graph.len(),
            disabled = self.graph.disabled().len(),
            "pipeline started"
        );
        self.enter(Phase::Running);

        loop {
            self.start_eligible();

            if self.deadline_expired() {
                tracing::warn!(
                    timeout_secs = self.defaults.timeout.map(|t| t.as_secs()).unwrap_or_default(),
                    "global timeout expired"
                );
                self.timed_out = true;
                break;
            }

            if self.tasks.is_empty() {
                let pending = self.count(NodeState::Pending);
                if pending > 0 {
                    tracing::warn!(pending, "no node can start, leaving the rest unstarted");
                }
                break;
            }

            let wait = self.next_wait();
            self.collect(wait);
            self.release_buffers();
        }

        self.enter(Phase::Draining);
        self.drain();
        self.enter(Phase::Done);

        let result = self.assemble(run_id, started_at, clock.elapsed());
        tracing::info!(
            run_id = %run_id,
            success = result.success(),
            timed_out = result.timed_out,
            elapsed_ms = result.elapsed.as_millis() as u64,
            "pipeline finished"
        );
        result
    }

    fn enter(&mut self, phase: Phase) {
        tracing::debug!(from = %self.phase, to = %phase, "scheduler phase");
        self.phase = phase;
    }

    fn count(&self, state: NodeState) -> usize {
        self.states.iter().filter(|s| **s == state).count()
    }

    fn deadline_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    fn next_wait(&self) -> Duration {
        match self.remaining() {
            Some(left) => left.min(self.config.poll_interval),
            None => self.config.poll_interval,
        }
    }

    fn state_of(&self, id: &str) -> Option<NodeState> {
        self.graph.position(id).map(|i| self.states[i])
    }

    /// Start nodes in declaration order until nothing more can start,
    /// rescanning after every launch.
    fn start_eligible(&mut self) {
        let graph = self.graph;
        loop {
            if self.deadline_expired() {
                return;
            }

            let mut progressed = false;
            for (i, node) in graph.nodes().iter().enumerate() {
                if self.states[i] != NodeState::Pending {
                    continue;
                }

                if self.config.failure_policy == FailurePolicy::SkipDependents {
                    if let Some(failed) = self.failed_predecessor(node) {
                        self.skip(i, node, failed);
                        progressed = true;
                        continue;
                    }
                }

                if self.is_eligible(node) {
                    self.start(i, node);
                    progressed = true;
                    if !self.config.launch_delay.is_zero() {
                        self.pause(self.config.launch_delay);
                    }
                    break;
                }
            }

            if !progressed {
                return;
            }
        }
    }

    fn is_eligible(&self, node: &ResolvedNode) -> bool {
        let source_ready = node
            .pipe_from
            .as_deref()
            .map_or(true, |src| self.state_of(src).is_some_and(NodeState::can_feed_pipe));
        source_ready
            && node
                .wait_for
                .iter()
                .all(|dep| self.state_of(dep).is_some_and(NodeState::is_done))
    }

    fn failed_predecessor(&self, node: &ResolvedNode) -> Option<String> {
        node.predecessors()
            .find(|pred| self.failed.contains(*pred))
            .map(str::to_string)
    }

    fn skip(&mut self, i: usize, node: &ResolvedNode, failed: String) {
        tracing::warn!(node = %node.id, failed = %failed, "node skipped, predecessor failed");
        self.states[i] = NodeState::Skipped;
        self.failed.insert(node.id.clone());
        let mut result = NodeResult::not_started(
            &node.id,
            node.command.to_string(),
            ErrorMarker::Skipped {
                failed: failed.clone(),
            },
        );
        result
            .messages
            .push(Message::error(format!("not started, '{failed}' failed")));
        self.results.insert(node.id.clone(), result);
    }

    fn start(&mut self, i: usize, node: &ResolvedNode) {
        self.states[i] = NodeState::Starting;
        let id = node.id.clone();

        let binary = node.command.binary.unwrap_or(self.defaults.binary);
        let compression = Compression::from_flag(node.command.gzip.unwrap_or(self.defaults.gzip));
        let consumers = self.graph.consumers_of(&id);
        let stdout_tee = if consumers.is_empty() {
            None
        } else {
            let (writer, buffer) = OutputBuffer::open(&id, compression, consumers);
            self.buffers.insert(id.clone(), buffer);
            Some(writer)
        };

        let stdin = node
            .pipe_from
            .as_deref()
            .and_then(|src| self.take_reader(src, &id));

        let timeout = match (node.command.timeout(), self.remaining()) {
            (Some(own), Some(left)) => Some(own.min(left)),
            (own, left) => own.or(left),
        };

        let job = NodeJob {
            request: RunRequest {
                id: id.clone(),
                command: node.command.clone(),
                working_dir: node.command.effective_working_dir(&self.defaults.working_dir),
                timeout,
                stdin,
                stdout_tee,
                stdout_mode: StreamMode::from_flag(binary),
            },
            binary,
            max_lines: self.config.max_captured_lines,
        };

        self.launched.insert(id.clone(), Utc::now());
        self.start_order.push(id.clone());

        let runner = self.runner.clone();
        match self.tasks.spawn(&id, move || job.execute(&runner)) {
            Ok(()) => self.states[i] = NodeState::Running,
            Err(e) => {
                tracing::error!(node = %id, error = %e, "failed to start node thread");
                let mut result = self.started_result(&id, node);
                result.error = Some(ErrorMarker::Launch(format!("failed to start node thread: {e}")));
                self.finish(&id, result);
            }
        }
    }

    fn take_reader(&mut self, source: &str, consumer: &str) -> Option<BufferReader> {
        let Some(buffer) = self.buffers.get_mut(source) else {
            tracing::error!(node = %consumer, source, "piped source has no output buffer");
            return None;
        };
        match buffer.reader(consumer) {
            Ok(reader) => Some(reader),
            Err(e) => {
                tracing::error!(node = %consumer, error = %e, "cannot read piped input");
                None
            }
        }
    }

    /// Result skeleton for a node that was launched
    fn started_result(&self, id: &str, node: &ResolvedNode) -> NodeResult {
        NodeResult {
            started_at: self.launched.get(id).copied(),
            finished_at: Some(Utc::now()),
            ..NodeResult::new(id, node.command.to_string())
        }
    }

    /// Wait up to `timeout` and record every node that finished meanwhile
    fn collect(&mut self, timeout: Duration) {
        let graph = self.graph;
        for (id, joined) in self.tasks.wait_any(timeout) {
            let result = match joined {
                Ok(result) => result,
                Err(panic) => {
                    tracing::error!(node = %id, panic = %panic, "node task panicked");
                    let mut result = match graph.get(&id) {
                        Some(node) => self.started_result(&id, node),
                        None => NodeResult::new(&id, ""),
                    };
                    result.error = Some(ErrorMarker::Panicked(panic));
                    result
                }
            };
            self.finish(&id, result);
        }
    }

    fn finish(&mut self, id: &str, result: NodeResult) {
        if let Some(i) = self.graph.position(id) {
            self.states[i] = NodeState::Finished;
        }
        if result.error.is_some() {
            self.failed.insert(id.to_string());
        }
        self.results.insert(id.to_string(), result);
    }

    /// Sleep for `delay` while still collecting finished nodes
    fn pause(&mut self, delay: Duration) {
        let until = Instant::now() + delay;
        loop {
            let now = Instant::now();
            if now >= until {
                break;
            }
            self.collect(until - now);
        }
    }

    /// Release buffers of finished producers no pending node pipes from
    fn release_buffers(&mut self) {
        let graph = self.graph;
        let releasable: Vec<String> = self
            .buffers
            .keys()
            .filter(|producer| {
                self.state_of(producer.as_str()).map_or(true, NodeState::is_done)
                    && !graph.nodes().iter().enumerate().any(|(j, n)| {
                        self.states[j] == NodeState::Pending
                            && n.pipe_from.as_deref() == Some(producer.as_str())
                    })
            })
            .cloned()
            .collect();

        for producer in releasable {
            if let Some(mut buffer) = self.buffers.remove(&producer) {
                buffer.release();
                let stats = buffer.stats();
                tracing::debug!(
                    producer = %producer,
                    raw_bytes = stats.raw_bytes,
                    stored_bytes = stats.stored_bytes,
                    "output buffer done"
                );
            }
        }
    }

    /// Stop starting nodes and wait for the running ones
    fn drain(&mut self) {
        // Nothing pending will start any more, so no stream left in a
        // buffer can be taken
        for buffer in self.buffers.values_mut() {
            buffer.release();
        }

        while !self.tasks.is_empty() {
            tracing::debug!(running = self.tasks.len(), "waiting for running nodes");
            self.collect(self.config.poll_interval);
        }
        self.buffers.clear();
    }

    fn assemble(mut self, run_id: Uuid, started_at: DateTime<Utc>, elapsed: Duration) -> ExecutionResult {
        let graph = self.graph;
        let mut nodes = Vec::with_capacity(graph.len());

        for id in &self.start_order {
            if let Some(result) = self.results.remove(id) {
                nodes.push(result);
            }
        }
        for node in graph.nodes() {
            if let Some(result) = self.results.remove(&node.id) {
                nodes.push(result);
            } else if !self.start_order.contains(&node.id) {
                nodes.push(NodeResult::not_started(
                    &node.id,
                    node.command.to_string(),
                    ErrorMarker::NotStarted,
                ));
            }
        }

        ExecutionResult::assemble(
            run_id,
            started_at,
            elapsed,
            self.timed_out,
            nodes,
            graph.disabled().to_vec(),
        )
    }
}
