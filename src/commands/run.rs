//! `pipeweave run`: execute a pipeline file

use anyhow::{Context, Result};
use std::path::PathBuf;

use super::render::{print_config_error, print_summary};
use super::Outcome;
use crate::config::Settings;
use crate::logging;
use crate::pipeline::{Pipeline, PipelineSpec};
use crate::scheduler::FailurePolicy;

/// Options of the `run` subcommand
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub graph: PathBuf,
    /// Global timeout in seconds, overriding the file
    pub timeout: Option<u64>,
    /// Default working directory, overriding the file
    pub working_dir: Option<PathBuf>,
    pub json: bool,
    pub skip_dependents: bool,
    pub config: Option<PathBuf>,
    pub verbose: bool,
}

pub fn execute(options: RunOptions) -> Result<Outcome> {
    let settings = Settings::load(options.config.as_deref()).context("Failed to load settings")?;
    let level = if options.verbose {
        "debug"
    } else {
        settings.log.level.as_str()
    };
    logging::init(level);

    let mut spec = PipelineSpec::load(&options.graph)?;
    if let Some(timeout) = options.timeout {
        spec.timeout = Some(timeout);
    }
    if let Some(dir) = options.working_dir {
        spec.working_dir = Some(dir);
    }

    let mut config = settings.scheduler_config();
    if options.skip_dependents {
        config.failure_policy = FailurePolicy::SkipDependents;
    }

    let pipeline = Pipeline::with_config(spec, config);
    let result = match pipeline.execute() {
        Ok(result) => result,
        Err(e) => {
            print_config_error(&e);
            return Ok(Outcome::ConfigError);
        }
    };

    if options.json {
        println!("{}", result.to_json().context("Failed to serialize result")?);
    } else {
        print_summary(&result);
    }

    Ok(if result.success() {
        Outcome::Success
    } else {
        Outcome::Failed
    })
}
