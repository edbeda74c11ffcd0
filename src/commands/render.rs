//! Terminal rendering of results and configuration errors

use colored::Colorize;

use crate::graph::GraphError;
use crate::result::{format_elapsed, ExecutionResult, NodeResult};

/// Truncate string to max characters (UTF-8 safe)
fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max.saturating_sub(3)).collect::<String>())
    }
}

fn status_cell(node: &NodeResult) -> (colored::ColoredString, colored::ColoredString) {
    match &node.error {
        None => ("\u{2713}".green(), "ok".green()),
        Some(marker) if !node.started() => ("\u{2298}".dimmed(), marker.to_string().dimmed()),
        Some(marker) if marker.is_timeout() => ("\u{23F1}".yellow(), marker.to_string().yellow()),
        Some(marker) => ("\u{2717}".red(), marker.to_string().red()),
    }
}

/// Print the per-node summary of a run
pub fn print_summary(result: &ExecutionResult) {
    println!();
    let header = if result.success() {
        format!("{} {}", "\u{2713}".green().bold(), "Pipeline succeeded".green().bold())
    } else {
        format!("{} {}", "\u{2717}".red().bold(), "Pipeline failed".red().bold())
    };
    println!("{header}");
    println!("{}", "\u{2550}".repeat(60));

    let failed = result.failed_nodes().count();
    println!(
        "{} {} | {} {} | {} {}",
        "Total:".bold(),
        format_elapsed(result.elapsed),
        "\u{2713}".green(),
        result.nodes.len() - failed,
        "\u{2717}".red(),
        failed
    );
    if let Some(error) = &result.error {
        println!("{} {error}", "Error:".bold());
    }

    println!("\n{}", "Nodes".bold());
    println!("{}", "\u{2500}".repeat(60));
    println!("{:2} {:20} {:>8} {:>6}  {}", "", "Node", "Time", "Exit", "Status");
    println!("{}", "\u{2500}".repeat(60));

    for node in &result.nodes {
        let (icon, status) = status_cell(node);
        let time = if node.started() {
            format_elapsed(node.elapsed)
        } else {
            "-".to_string()
        };
        let exit = node
            .exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        let id = truncate_chars(&node.id, 20);
        println!("{icon:2} {id:20} {time:>8} {exit:>6}  {status}");
    }
    println!("{}", "\u{2500}".repeat(60));

    if !result.disabled.is_empty() {
        println!("{} {}", "Disabled:".dimmed(), result.disabled.join(", ").dimmed());
    }
    println!();
}

pub fn print_config_error(err: &GraphError) {
    eprintln!("{} {err}", "Configuration error:".red().bold());
}
