pub mod buffer;
pub mod command;
pub mod commands;
pub mod config;
pub mod graph;
pub mod logging;
pub mod pipeline;
pub mod process;
pub mod result;
pub mod scheduler;

pub use pipeline::{Pipeline, PipelineSpec};
pub use result::{ErrorMarker, ExecutionResult, NodeResult};
