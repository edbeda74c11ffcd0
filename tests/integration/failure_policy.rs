//! Behavior of dependents when a predecessor fails

use tempfile::TempDir;

use pipeweave::scheduler::{FailurePolicy, SchedulerConfig};
use pipeweave::{ErrorMarker, PipelineSpec};

use super::helpers::*;

fn failing_chain() -> PipelineSpec {
    PipelineSpec::new(vec![
        sh("broken", "exit 4"),
        sh("after", "touch after.txt").wait_for("broken"),
        sh("independent", "touch independent.txt"),
    ])
}

#[test]
fn test_continue_runs_dependents() {
    let dir = TempDir::new().unwrap();

    let result = run_in(dir.path(), failing_chain());

    assert!(!result.success());
    assert_eq!(result.error, Some(ErrorMarker::ExitCode(4)));
    assert!(result.node("after").unwrap().success());
    assert!(dir.path().join("after.txt").exists());
    assert!(dir.path().join("independent.txt").exists());
}

#[test]
fn test_skip_dependents_leaves_them_unstarted() {
    let dir = TempDir::new().unwrap();
    let config = SchedulerConfig {
        failure_policy: FailurePolicy::SkipDependents,
        ..fast_config()
    };

    let result = run_with(dir.path(), failing_chain(), config);

    assert_eq!(result.error, Some(ErrorMarker::ExitCode(4)));
    let after = result.node("after").unwrap();
    assert!(!after.started());
    assert_eq!(
        after.error,
        Some(ErrorMarker::Skipped {
            failed: "broken".to_string()
        })
    );
    assert!(!dir.path().join("after.txt").exists());
    assert!(dir.path().join("independent.txt").exists());
}
