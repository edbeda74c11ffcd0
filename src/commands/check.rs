//! `pipeweave check`: resolve a pipeline without running it

use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use super::render::print_config_error;
use super::Outcome;
use crate::graph::ResolvedGraph;
use crate::pipeline::PipelineSpec;

pub fn execute(graph_path: &Path) -> Result<Outcome> {
    let spec = PipelineSpec::load(graph_path)?;
    let graph = match crate::graph::resolve(&spec.nodes, &spec.edits) {
        Ok(graph) => graph,
        Err(e) => {
            print_config_error(&e);
            return Ok(Outcome::ConfigError);
        }
    };

    print!("{}", describe(&graph));
    Ok(Outcome::Success)
}

/// Execution order, edges and disabled nodes as printable text
pub fn describe(graph: &ResolvedGraph) -> String {
    let mut out = String::new();
    out.push_str(&format!("{} {} node(s)\n", "\u{2713}".green().bold(), graph.len()));
    out.push_str(&format!("\n{}\n", "Execution order:".bold()));

    for (n, id) in graph.topological_order().iter().enumerate() {
        let Some(node) = graph.get(id) else {
            continue;
        };
        out.push_str(&format!("  {:>3}. {}  {}\n", n + 1, id.bold(), node.command.to_string().dimmed()));
        if let Some(src) = &node.pipe_from {
            out.push_str(&format!("         {} {src}\n", "stdin from".cyan()));
        }
        if !node.wait_for.is_empty() {
            out.push_str(&format!("         {} {}\n", "waits for".cyan(), node.wait_for.join(", ")));
        }
    }

    if !graph.disabled().is_empty() {
        out.push_str(&format!(
            "\n{} {}\n",
            "Disabled:".yellow(),
            graph.disabled().join(", ")
        ));
    }
    out
}
