//! Shared helpers for the integration tests

use std::path::Path;
use std::time::Duration;

use pipeweave::command::CommandSpec;
use pipeweave::graph::NodeSpec;
use pipeweave::scheduler::SchedulerConfig;
use pipeweave::{ExecutionResult, Pipeline, PipelineSpec};

/// A node running `script` through `sh -c`
pub fn sh(id: &str, script: &str) -> NodeSpec {
    NodeSpec::new(id, CommandSpec::shell(script))
}

/// Scheduler settings with a short poll interval so tests stay fast
pub fn fast_config() -> SchedulerConfig {
    SchedulerConfig {
        poll_interval: Duration::from_millis(50),
        launch_delay: Duration::ZERO,
        ..SchedulerConfig::default()
    }
}

/// Run `spec` inside `dir`
pub fn run_in(dir: &Path, spec: PipelineSpec) -> ExecutionResult {
    run_with(dir, spec, fast_config())
}

pub fn run_with(dir: &Path, spec: PipelineSpec, config: SchedulerConfig) -> ExecutionResult {
    let spec = spec.with_working_dir(dir);
    Pipeline::with_config(spec, config)
        .execute()
        .expect("pipeline should resolve")
}

/// Write a pipeline file and an empty settings file into `dir`
pub fn write_pipeline(dir: &Path, yaml: &str) -> (std::path::PathBuf, std::path::PathBuf) {
    let pipeline = dir.join("pipeline.yaml");
    let settings = dir.join("settings.toml");
    std::fs::write(&pipeline, yaml).expect("Failed to write pipeline file");
    std::fs::write(&settings, "").expect("Failed to write settings file");
    (pipeline, settings)
}
