//! Data flow through pipe edges

use std::fs;
use tempfile::TempDir;

use pipeweave::PipelineSpec;

use super::helpers::*;

fn hello_pipeline(gzip: bool) -> PipelineSpec {
    PipelineSpec::new(vec![
        sh("source", "printf 'hello\\n'"),
        sh("sink", "cat > out.txt").pipe_from("source"),
    ])
    .with_gzip(gzip)
}

#[test]
fn test_stdout_reaches_consumer_byte_exact() {
    let dir = TempDir::new().unwrap();

    let result = run_in(dir.path(), hello_pipeline(false));

    assert!(result.success(), "{:?}", result.error);
    assert_eq!(fs::read(dir.path().join("out.txt")).unwrap(), b"hello\n");
}

#[test]
fn test_gzip_buffer_is_transparent_to_consumer() {
    let dir = TempDir::new().unwrap();

    let result = run_in(dir.path(), hello_pipeline(true));

    assert!(result.success(), "{:?}", result.error);
    assert_eq!(fs::read(dir.path().join("out.txt")).unwrap(), b"hello\n");
}

#[test]
fn test_large_stream_through_chain() {
    let dir = TempDir::new().unwrap();
    let spec = PipelineSpec::new(vec![
        sh("gen", "seq 1 200000"),
        sh("filter", "grep 7").pipe_from("gen"),
        sh("count", "wc -l > count.txt").pipe_from("filter"),
        sh("total", "wc -l > total.txt").pipe_from("gen"),
    ])
    .with_gzip(true);

    let result = run_in(dir.path(), spec);

    assert!(result.success(), "{:?}", result.error);
    let total = fs::read_to_string(dir.path().join("total.txt")).unwrap();
    assert_eq!(total.trim(), "200000");
    let count: u64 = fs::read_to_string(dir.path().join("count.txt"))
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    assert!(count > 0 && count < 200000);
}

#[test]
fn test_consumer_of_missing_output_sees_empty_input() {
    let dir = TempDir::new().unwrap();
    let spec = PipelineSpec::new(vec![
        sh("quiet", "true"),
        sh("sink", "wc -c > bytes.txt").pipe_from("quiet"),
    ]);

    let result = run_in(dir.path(), spec);

    assert!(result.success(), "{:?}", result.error);
    let bytes = fs::read_to_string(dir.path().join("bytes.txt")).unwrap();
    assert_eq!(bytes.trim(), "0");
}
