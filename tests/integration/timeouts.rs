//! Per-node and global timeouts

use serial_test::serial;
use std::time::{Duration, Instant};
use tempfile::TempDir;

use pipeweave::command::CommandSpec;
use pipeweave::graph::NodeSpec;
use pipeweave::process::is_process_alive;
use pipeweave::{ErrorMarker, PipelineSpec};

use super::helpers::*;

#[test]
#[serial]
fn test_node_timeout_kills_process() {
    let dir = TempDir::new().unwrap();
    let spec = PipelineSpec::new(vec![NodeSpec::new(
        "sleeper",
        CommandSpec::new("sleep", ["10"]).with_timeout(Duration::from_secs(1)),
    )]);

    let start = Instant::now();
    let result = run_in(dir.path(), spec);

    let elapsed = start.elapsed();
    assert!(elapsed < Duration::from_secs(3), "{elapsed:?}");
    assert!(!result.timed_out);
    assert_eq!(result.error, Some(ErrorMarker::Timeout));

    let node = result.node("sleeper").unwrap();
    assert_eq!(node.error, Some(ErrorMarker::Timeout));
    assert!(node.elapsed >= Duration::from_millis(900));
    let pid = node.pid.expect("sleeper should have started");
    assert!(!is_process_alive(pid));
}

#[test]
#[serial]
fn test_global_timeout_stops_everything() {
    let dir = TempDir::new().unwrap();
    let spec = PipelineSpec::new(vec![sh("first", "sleep 10"), sh("second", "sleep 10")])
        .with_timeout(Duration::from_secs(2));

    let start = Instant::now();
    let result = run_in(dir.path(), spec);

    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(1900), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "{elapsed:?}");
    assert!(result.timed_out);
    assert!(result.error.as_ref().is_some_and(|e| e.is_timeout()));
    for node in &result.nodes {
        assert!(node.error.as_ref().is_some_and(|e| e.is_timeout()), "{}", node.id);
    }
}

#[test]
#[serial]
fn test_global_timeout_leaves_waiting_nodes_unstarted() {
    let dir = TempDir::new().unwrap();
    let spec = PipelineSpec::new(vec![
        sh("slow", "sleep 10"),
        sh("after", "touch after.txt").wait_for("slow"),
    ])
    .with_timeout(Duration::from_secs(1));

    let result = run_in(dir.path(), spec);

    assert!(result.timed_out);
    assert!(!dir.path().join("after.txt").exists());
    let after = result.node("after").unwrap();
    assert!(!after.started());
}
