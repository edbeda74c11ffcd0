//! Pipeline definition and the submit/execute entry point

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::Settings;
use crate::graph::{resolve, EditDirective, GraphError, NodeSpec, ResolvedGraph};
use crate::result::ExecutionResult;
use crate::scheduler::{RunDefaults, Scheduler, SchedulerConfig};

/// A pipeline as configured: nodes, edit directives and defaults
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineSpec {
    /// Default working directory; the current one when absent
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// Global timeout in seconds; zero or absent means none
    #[serde(default)]
    pub timeout: Option<u64>,
    /// Default for nodes that do not set `gzip`
    #[serde(default)]
    pub gzip: bool,
    /// Default for nodes that do not set `binary`
    #[serde(default)]
    pub binary: bool,
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub edits: Vec<EditDirective>,
}

impl PipelineSpec {
    pub fn new(nodes: Vec<NodeSpec>) -> Self {
        Self {
            nodes,
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout.as_secs().max(1));
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_gzip(mut self, gzip: bool) -> Self {
        self.gzip = gzip;
        self
    }

    pub fn with_binary(mut self, binary: bool) -> Self {
        self.binary = binary;
        self
    }

    pub fn with_edit(mut self, edit: EditDirective) -> Self {
        self.edits.push(edit);
        self
    }

    /// Parse a YAML pipeline definition
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let spec: PipelineSpec =
            serde_yaml::from_str(content).context("Failed to parse pipeline YAML")?;
        if spec.nodes.is_empty() {
            bail!("Pipeline defines no nodes");
        }
        Ok(spec)
    }

    /// Load a YAML pipeline file. A relative `working_dir` is taken
    /// relative to the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline file: {}", path.display()))?;
        let mut spec = Self::from_yaml_str(&content)
            .with_context(|| format!("Invalid pipeline file: {}", path.display()))?;

        if let (Some(dir), Some(parent)) = (&spec.working_dir, path.parent()) {
            if dir.is_relative() {
                spec.working_dir = Some(parent.join(dir));
            }
        }
        Ok(spec)
    }

    /// Global timeout as a duration
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    fn run_defaults(&self) -> RunDefaults {
        RunDefaults {
            working_dir: self
                .working_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(".")),
            timeout: self.timeout(),
            gzip: self.gzip,
            binary: self.binary,
        }
    }
}

/// A pipeline ready to run
#[derive(Debug, Clone)]
pub struct Pipeline {
    spec: PipelineSpec,
    config: SchedulerConfig,
}

impl Pipeline {
    pub fn new(spec: PipelineSpec, settings: &Settings) -> Self {
        Self::with_config(spec, settings.scheduler_config())
    }

    pub fn with_config(spec: PipelineSpec, config: SchedulerConfig) -> Self {
        Self { spec, config }
    }

    pub fn spec(&self) -> &PipelineSpec {
        &self.spec
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Validate the graph and apply edit directives without running anything
    pub fn resolve(&self) -> Result<ResolvedGraph, GraphError> {
        resolve(&self.spec.nodes, &self.spec.edits)
    }

    /// Resolve, then run every node.
    ///
    /// Only configuration problems are errors; node failures and timeouts
    /// are reported in the result.
    pub fn execute(&self) -> Result<ExecutionResult, GraphError> {
        let graph = self.resolve()?;
        let scheduler = Scheduler::new(&graph, self.config.clone(), self.spec.run_defaults());
        Ok(scheduler.run())
    }
}
