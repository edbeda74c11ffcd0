//! Integration tests for pipeweave
//!
//! These run real process graphs end to end through the public API and the
//! `pipeweave` binary. They rely on a POSIX shell.

#![cfg(unix)]

pub mod cli;
pub mod failure_policy;
pub mod graph_edits;
pub mod helpers;
pub mod piping;
pub mod timeouts;
