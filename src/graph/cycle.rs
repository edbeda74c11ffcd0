//! Cycle detection over pipe and wait edges

use std::collections::HashMap;

use super::nodes::NodeSpec;

/// Result of a cycle check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleCheck {
    Acyclic,
    /// `node` lies on the loop described by `path` (first and last entries
    /// are the same node)
    CycleAt { node: String, path: Vec<String> },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    /// Not visited yet
    White,
    /// On the current DFS path
    Gray,
    /// Fully explored, known not to be on a loop
    Black,
}

/// Detect loops using DFS with a color map.
///
/// Edges run from a node to each of its `pipe_from` and `wait_for`
/// predecessors, so loops that mix both kinds are found. Nodes are visited in
/// declaration order which keeps the reported loop deterministic.
/// References to unknown nodes are ignored (validation reports them).
pub fn detect_cycles(nodes: &[NodeSpec]) -> CycleCheck {
    let index: HashMap<&str, &NodeSpec> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    let mut colors: HashMap<&str, Color> = nodes
        .iter()
        .map(|n| (n.id.as_str(), Color::White))
        .collect();
    let mut path = Vec::new();

    for node in nodes {
        if colors.get(node.id.as_str()) == Some(&Color::White) {
            if let Some(cycle) = visit(node.id.as_str(), &index, &mut colors, &mut path) {
                let node = cycle.first().cloned().unwrap_or_default();
                return CycleCheck::CycleAt { node, path: cycle };
            }
        }
    }

    CycleCheck::Acyclic
}

fn visit<'a>(
    id: &'a str,
    index: &HashMap<&'a str, &'a NodeSpec>,
    colors: &mut HashMap<&'a str, Color>,
    path: &mut Vec<&'a str>,
) -> Option<Vec<String>> {
    colors.insert(id, Color::Gray);
    path.push(id);

    if let Some(&node) = index.get(id) {
        let preds = node.pipe_from.iter().chain(node.wait_for.iter());
        for pred in preds {
            let pred = pred.as_str();
            match colors.get(pred).copied() {
                Some(Color::White) => {
                    if let Some(cycle) = visit(pred, index, colors, path) {
                        return Some(cycle);
                    }
                }
                Some(Color::Gray) => {
                    let start = path.iter().rposition(|p| *p == pred).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        path[start..].iter().map(|p| p.to_string()).collect();
                    cycle.push(pred.to_string());
                    return Some(cycle);
                }
                Some(Color::Black) | None => {}
            }
        }
    }

    path.pop();
    colors.insert(id, Color::Black);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandSpec;

    fn node(id: &str, pipe: &[&str], wait: &[&str]) -> NodeSpec {
        let mut n = NodeSpec::new(id, CommandSpec::new("true", Vec::<String>::new()));
        n.pipe_from = pipe.iter().map(|s| s.to_string()).collect();
        n.wait_for = wait.iter().map(|s| s.to_string()).collect();
        n
    }

    #[test]
    fn test_diamond_is_acyclic() {
        let nodes = vec![
            node("a", &[], &[]),
            node("b", &["a"], &[]),
            node("c", &["a"], &[]),
            node("d", &["b"], &["c"]),
        ];
        assert_eq!(detect_cycles(&nodes), CycleCheck::Acyclic);
    }

    #[test]
    fn test_wait_cycle_reports_path() {
        let nodes = vec![
            node("a", &[], &["b"]),
            node("b", &[], &["c"]),
            node("c", &[], &["a"]),
        ];
        match detect_cycles(&nodes) {
            CycleCheck::CycleAt { node, path } => {
                assert_eq!(node, "a");
                assert_eq!(path, vec!["a", "b", "c", "a"]);
            }
            CycleCheck::Acyclic => panic!("cycle not detected"),
        }
    }

    #[test]
    fn test_mixed_pipe_and_wait_cycle() {
        let nodes = vec![
            node("x", &[], &[]),
            node("a", &["b"], &[]),
            node("b", &[], &["a"]),
        ];
        assert!(matches!(detect_cycles(&nodes), CycleCheck::CycleAt { .. }));
    }

    #[test]
    fn test_unknown_reference_is_ignored() {
        let nodes = vec![node("a", &["ghost"], &[])];
        assert_eq!(detect_cycles(&nodes), CycleCheck::Acyclic);
    }
}
