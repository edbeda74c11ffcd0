//! Tests for graph resolution

use super::*;
use crate::command::CommandSpec;

fn make_node(id: &str, pipe: Option<&str>, wait: Vec<&str>) -> NodeSpec {
    NodeSpec {
        id: id.to_string(),
        pipe_from: pipe.map(String::from).into_iter().collect(),
        wait_for: wait.into_iter().map(String::from).collect(),
        command: CommandSpec::new("cat", Vec::<String>::new()),
    }
}

fn ids(graph: &ResolvedGraph) -> Vec<&str> {
    graph.nodes().iter().map(|n| n.id.as_str()).collect()
}

#[test]
fn test_resolve_simple_chain() {
    let nodes = vec![
        make_node("1", None, vec![]),
        make_node("2", Some("1"), vec![]),
        make_node("3", Some("2"), vec!["1"]),
    ];

    let graph = resolve(&nodes, &[]).unwrap();

    assert_eq!(ids(&graph), vec!["1", "2", "3"]);
    assert_eq!(graph.get("3").unwrap().pipe_from.as_deref(), Some("2"));
    assert_eq!(graph.get("3").unwrap().wait_for, vec!["1"]);
    assert!(graph.disabled().is_empty());
}

#[test]
fn test_missing_id() {
    let nodes = vec![make_node("a", None, vec![]), make_node("", None, vec![])];

    let err = resolve(&nodes, &[]).unwrap_err();
    assert_eq!(err, GraphError::MissingId { index: 1 });
}

#[test]
fn test_duplicate_id() {
    let nodes = vec![make_node("a", None, vec![]), make_node("a", None, vec![])];

    let err = resolve(&nodes, &[]).unwrap_err();
    assert_eq!(err, GraphError::DuplicateId("a".to_string()));
    assert!(err.to_string().contains("not unique"));
}

#[test]
fn test_self_pipe_and_self_wait() {
    let nodes = vec![make_node("a", Some("a"), vec!["a"])];

    let err = resolve(&nodes, &[]).unwrap_err();
    let problems = err.problems();
    assert!(problems.contains(&&GraphError::SelfPipe("a".to_string())));
    assert!(problems.contains(&&GraphError::SelfWait("a".to_string())));
}

#[test]
fn test_dangling_references() {
    let nodes = vec![
        make_node("a", Some("ghost"), vec![]),
        make_node("b", None, vec!["phantom"]),
    ];

    let err = resolve(&nodes, &[]).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("2 configuration errors"), "{msg}");
    assert!(msg.contains("non-existing node 'ghost'"), "{msg}");
    assert!(msg.contains("non-existing node 'phantom'"), "{msg}");
}

#[test]
fn test_single_pipe_source_only() {
    let mut node = make_node("c", None, vec![]);
    node.pipe_from = vec!["a".to_string(), "b".to_string()];
    let nodes = vec![make_node("a", None, vec![]), make_node("b", None, vec![]), node];

    let err = resolve(&nodes, &[]).unwrap_err();
    assert_eq!(
        err,
        GraphError::MultiplePipeSources {
            id: "c".to_string(),
            count: 2
        }
    );
}

#[test]
fn test_invalid_command_is_reported() {
    let mut node = make_node("a", None, vec![]);
    node.command = CommandSpec::new("", Vec::<String>::new());

    let err = resolve(&[node], &[]).unwrap_err();
    assert!(matches!(err, GraphError::InvalidCommand { ref id, .. } if id == "a"));
}

#[test]
fn test_three_node_wait_cycle_rejected() {
    let nodes = vec![
        make_node("a", None, vec!["b"]),
        make_node("b", None, vec!["c"]),
        make_node("c", None, vec!["a"]),
    ];

    let err = resolve(&nodes, &[]).unwrap_err();
    match &err {
        GraphError::Cycle { node, path } => {
            assert_eq!(node, "a");
            assert_eq!(path.len(), 4);
        }
        other => panic!("expected cycle error, got {other:?}"),
    }
    assert!(err.to_string().contains("loop detected"));
}

#[test]
fn test_pipe_loop_rejected() {
    let nodes = vec![
        make_node("1", Some("3"), vec![]),
        make_node("2", Some("1"), vec![]),
        make_node("3", Some("2"), vec![]),
    ];

    assert!(matches!(
        resolve(&nodes, &[]),
        Err(GraphError::Cycle { .. })
    ));
}

#[test]
fn test_mixed_pipe_wait_loop_rejected() {
    let nodes = vec![
        make_node("1", None, vec![]),
        make_node("2", Some("1"), vec!["4"]),
        make_node("3", Some("2"), vec![]),
        make_node("4", Some("3"), vec![]),
    ];

    assert!(matches!(
        resolve(&nodes, &[]),
        Err(GraphError::Cycle { .. })
    ));
}

#[test]
fn test_disable_cascades_through_pipes() {
    // B is disabled, C pipes from B, D only waits on C
    let nodes = vec![
        make_node("a", None, vec![]),
        make_node("b", Some("a"), vec![]),
        make_node("c", Some("b"), vec![]),
        make_node("d", None, vec!["c"]),
    ];

    let graph = resolve(&nodes, &[EditDirective::disable("b")]).unwrap();

    assert_eq!(ids(&graph), vec!["a", "d"]);
    assert_eq!(graph.disabled(), &["b".to_string(), "c".to_string()]);
    assert!(graph.get("d").unwrap().wait_for.is_empty());
}

#[test]
fn test_disable_keeps_unrelated_wait_edges() {
    let nodes = vec![
        make_node("a", None, vec![]),
        make_node("b", None, vec![]),
        make_node("c", None, vec!["a", "b"]),
    ];

    let graph = resolve(&nodes, &[EditDirective::disable("a")]).unwrap();

    assert_eq!(graph.get("c").unwrap().wait_for, vec!["b"]);
}

#[test]
fn test_repipe_rescues_node_from_cascade() {
    let nodes = vec![
        make_node("a", None, vec![]),
        make_node("b", Some("a"), vec![]),
        make_node("c", Some("b"), vec![]),
    ];
    let edits = vec![EditDirective::disable("b"), EditDirective::repipe("c", Some("a"))];

    let graph = resolve(&nodes, &edits).unwrap();

    assert_eq!(ids(&graph), vec!["a", "c"]);
    assert_eq!(graph.get("c").unwrap().pipe_from.as_deref(), Some("a"));
    assert_eq!(graph.disabled(), &["b".to_string()]);
}

#[test]
fn test_repipe_replaces_wait_list() {
    let nodes = vec![
        make_node("a", None, vec![]),
        make_node("b", None, vec![]),
        make_node("c", None, vec!["a"]),
    ];
    let edits = vec![EditDirective::Repipe {
        target: "c".to_string(),
        pipe_from: None,
        wait_for: Some(vec!["b".to_string()]),
    }];

    let graph = resolve(&nodes, &edits).unwrap();

    let c = graph.get("c").unwrap();
    assert_eq!(c.pipe_from, None);
    assert_eq!(c.wait_for, vec!["b"]);
}

#[test]
fn test_repipe_can_introduce_cycle() {
    let nodes = vec![make_node("a", None, vec![]), make_node("b", Some("a"), vec![])];
    let edits = vec![EditDirective::repipe("a", Some("b"))];

    assert!(matches!(
        resolve(&nodes, &edits),
        Err(GraphError::Cycle { .. })
    ));
}

#[test]
fn test_unknown_edit_target() {
    let nodes = vec![make_node("a", None, vec![])];

    let err = resolve(&nodes, &[EditDirective::disable("zzz")]).unwrap_err();
    assert_eq!(err, GraphError::UnknownEditTarget("zzz".to_string()));
}

#[test]
fn test_conflicting_repipes() {
    let nodes = vec![make_node("a", None, vec![]), make_node("b", None, vec![])];
    let edits = vec![
        EditDirective::repipe("b", Some("a")),
        EditDirective::repipe("b", None),
    ];

    let err = resolve(&nodes, &edits).unwrap_err();
    assert_eq!(err, GraphError::ConflictingEdits("b".to_string()));
}

#[test]
fn test_input_is_not_mutated() {
    let nodes = vec![
        make_node("a", None, vec![]),
        make_node("b", Some("a"), vec![]),
    ];
    let before = nodes.clone();

    resolve(&nodes, &[EditDirective::disable("a")]).unwrap();

    assert_eq!(nodes, before);
}

#[test]
fn test_resolution_is_idempotent() {
    let nodes = vec![
        make_node("a", None, vec![]),
        make_node("b", Some("a"), vec!["a", "a"]),
        make_node("c", None, vec!["b"]),
    ];

    let first = resolve(&nodes, &[]).unwrap();
    let second = resolve(&nodes, &[]).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.get("b").unwrap().wait_for, vec!["a"]);
}

#[test]
fn test_consumers_of_supports_fan_out() {
    let nodes = vec![
        make_node("1", None, vec![]),
        make_node("2", Some("1"), vec![]),
        make_node("4", Some("1"), vec!["2"]),
    ];

    let graph = resolve(&nodes, &[]).unwrap();

    assert_eq!(graph.consumers_of("1"), vec!["2", "4"]);
    assert!(graph.consumers_of("4").is_empty());
}

#[test]
fn test_topological_order() {
    let nodes = vec![
        make_node("c", Some("b"), vec!["a"]),
        make_node("a", None, vec![]),
        make_node("b", Some("a"), vec![]),
    ];

    let graph = resolve(&nodes, &[]).unwrap();
    let sorted = graph.topological_order();

    let pos = |id: &str| sorted.iter().position(|x| x == id).unwrap();
    assert_eq!(sorted.len(), 3);
    assert!(pos("a") < pos("b"));
    assert!(pos("b") < pos("c"));
}

#[test]
fn test_yaml_directives() {
    let yaml = r#"
- repipe: { target: "3", pipe_from: ["1"] }
- disable: { target: "2" }
"#;
    let edits: Vec<EditDirective> = serde_yaml::from_str(yaml).unwrap();

    assert_eq!(edits[0], EditDirective::repipe("3", Some("1")));
    assert_eq!(edits[1], EditDirective::disable("2"));
}
