//! Settings file: scheduler tuning, output capture and logging
//!
//! Settings are TOML. Lookup order: an explicit path, `./pipeweave.toml`,
//! then `<config_dir>/pipeweave/config.toml`; if none exists the defaults
//! apply. Missing sections and fields take their defaults, unknown keys are
//! rejected.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::scheduler::{FailurePolicy, SchedulerConfig};

/// File name looked up in the current directory
pub const LOCAL_CONFIG_FILE: &str = "pipeweave.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub scheduler: SchedulerSettings,
    pub output: OutputSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerSettings {
    /// Longest the coordinator blocks between scans
    pub poll_interval_ms: u64,
    /// Pause after each launch; platform default when absent
    pub launch_delay_ms: Option<u64>,
    pub failure_policy: FailurePolicy,
    /// Grace period for output pumps after a process exited
    pub output_collection_timeout_ms: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            launch_delay_ms: None,
            failure_policy: FailurePolicy::default(),
            output_collection_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSettings {
    /// Lines kept per stream; further lines are only counted
    pub max_captured_lines: usize,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            max_captured_lines: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSettings {
    /// Default filter when `PIPEWEAVE_LOG` is unset
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from `explicit`, or from the first existing default
    /// location.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        for path in Self::candidate_paths() {
            if path.is_file() {
                tracing::debug!(path = %path.display(), "loading settings");
                return Self::from_file(&path);
            }
        }
        Ok(Self::default())
    }

    /// Default locations, in lookup order
    pub fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("pipeweave").join("config.toml"));
        }
        paths
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "scheduler.poll_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.log.level.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "log.level",
                reason: "cannot be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Scheduler tuning derived from these settings
    pub fn scheduler_config(&self) -> SchedulerConfig {
        let defaults = SchedulerConfig::default();
        SchedulerConfig {
            poll_interval: Duration::from_millis(self.scheduler.poll_interval_ms),
            launch_delay: self
                .scheduler
                .launch_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.launch_delay),
            failure_policy: self.scheduler.failure_policy,
            output_collection_timeout: Duration::from_millis(
                self.scheduler.output_collection_timeout_ms,
            ),
            max_captured_lines: self.output.max_captured_lines,
        }
    }
}
