//! Edit directives and configuration errors, end to end

use std::time::Duration;
use tempfile::TempDir;

use pipeweave::graph::{EditDirective, GraphError};
use pipeweave::{Pipeline, PipelineSpec};

use super::helpers::*;

#[test]
fn test_disable_cascades_and_releases_waiters() {
    let dir = TempDir::new().unwrap();
    let spec = PipelineSpec::new(vec![
        sh("a", "printf 'data\\n'"),
        sh("b", "cat").pipe_from("a"),
        sh("c", "cat > c.txt").pipe_from("b"),
        sh("d", "touch d.txt").wait_for("c"),
    ])
    .with_edit(EditDirective::disable("b"));

    let result = run_in(dir.path(), spec);

    assert!(result.success(), "{:?}", result.error);
    assert_eq!(result.disabled, vec!["b".to_string(), "c".to_string()]);
    assert!(result.node("b").is_none());
    assert!(result.node("c").is_none());
    assert!(!dir.path().join("c.txt").exists());
    assert!(dir.path().join("d.txt").exists());
}

#[test]
fn test_repipe_rescues_consumer_of_disabled_node() {
    let dir = TempDir::new().unwrap();
    let spec = PipelineSpec::new(vec![
        sh("a", "printf 'from-a\\n'"),
        sh("b", "printf 'from-b\\n'"),
        sh("c", "cat > c.txt").pipe_from("b"),
    ])
    .with_edit(EditDirective::disable("b"))
    .with_edit(EditDirective::repipe("c", Some("a")));

    let result = run_in(dir.path(), spec);

    assert!(result.success(), "{:?}", result.error);
    assert_eq!(result.disabled, vec!["b".to_string()]);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("c.txt")).unwrap(),
        "from-a\n"
    );
}

#[test]
fn test_cycle_rejected_before_anything_runs() {
    let dir = TempDir::new().unwrap();
    let spec = PipelineSpec::new(vec![
        sh("a", "touch a.txt").wait_for("c"),
        sh("b", "touch b.txt").wait_for("a"),
        sh("c", "touch c.txt").wait_for("b"),
        sh("free", "touch free.txt"),
    ])
    .with_working_dir(dir.path())
    .with_timeout(Duration::from_secs(5));

    let err = Pipeline::with_config(spec, fast_config())
        .execute()
        .unwrap_err();

    assert!(err
        .problems()
        .iter()
        .any(|e| matches!(e, GraphError::Cycle { .. })));
    assert!(!dir.path().join("free.txt").exists());
}
