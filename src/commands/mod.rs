//! Command handlers for the `pipeweave` binary

pub mod check;
mod render;
pub mod run;

use std::process::ExitCode;

/// How a command ended, mapped to the process exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// The pipeline ran but a node failed or the deadline expired
    Failed,
    /// The pipeline could not be loaded or resolved
    ConfigError,
}

impl Outcome {
    pub fn code(self) -> u8 {
        match self {
            Outcome::Success => 0,
            Outcome::Failed => 1,
            Outcome::ConfigError => 2,
        }
    }
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        ExitCode::from(outcome.code())
    }
}
