//! The `pipeweave` binary: exit codes and output formats

use std::process::{Command, Output};
use tempfile::TempDir;

use super::helpers::write_pipeline;

fn pipeweave(dir: &TempDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pipeweave"))
        .args(args)
        .current_dir(dir.path())
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to run pipeweave")
}

fn run_pipeline(yaml: &str, extra: &[&str]) -> (TempDir, Output) {
    let dir = TempDir::new().unwrap();
    let (pipeline, settings) = write_pipeline(dir.path(), yaml);
    let mut args = vec![
        "run".to_string(),
        pipeline.display().to_string(),
        "--config".to_string(),
        settings.display().to_string(),
    ];
    args.extend(extra.iter().map(|s| s.to_string()));
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let output = pipeweave(&dir, &args);
    (dir, output)
}

const GOOD: &str = r#"
nodes:
  - id: gen
    command: sh
    args: ["-c", "printf 'a\nb\n'"]
  - id: count
    command: sh
    args: ["-c", "wc -l > count.txt"]
    pipe_from: [gen]
"#;

#[test]
fn test_successful_run_exits_zero() {
    let (dir, output) = run_pipeline(GOOD, &[]);

    assert_eq!(output.status.code(), Some(0), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Pipeline succeeded"));
    let count = std::fs::read_to_string(dir.path().join("count.txt")).unwrap();
    assert_eq!(count.trim(), "2");
}

#[test]
fn test_failed_node_exits_one_with_json() {
    let yaml = r#"
nodes:
  - id: bad
    command: sh
    args: ["-c", "exit 3"]
"#;
    let (_dir, output) = run_pipeline(yaml, &["--json"]);

    assert_eq!(output.status.code(), Some(1), "{output:?}");
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["error"]["kind"], "exit_code");
    assert_eq!(json["error"]["detail"], 3);
    assert_eq!(json["nodes"][0]["id"], "bad");
}

#[test]
fn test_configuration_error_exits_two() {
    let yaml = r#"
nodes:
  - id: a
    command: "true"
    pipe_from: [ghost]
"#;
    let (_dir, output) = run_pipeline(yaml, &[]);

    assert_eq!(output.status.code(), Some(2), "{output:?}");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("non-existing node 'ghost'"));
}

#[test]
fn test_check_prints_order() {
    let dir = TempDir::new().unwrap();
    let (pipeline, _) = write_pipeline(dir.path(), GOOD);

    let output = pipeweave(&dir, &["check", &pipeline.display().to_string()]);

    assert_eq!(output.status.code(), Some(0), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let gen = stdout.find("gen").unwrap();
    let count = stdout.find("count").unwrap();
    assert!(gen < count);
    assert!(stdout.contains("stdin from gen"));
}
