//! Colored output formatting for TensorSwap CLI

use colored::*;
use tensorswap_ir::{DataflowGraph, ValidationReport};
use tensorswap_lms::LmsReport;

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

pub fn print_header(title: &str) {
    println!("\n{}", title.cyan().bold());
    println!("{}", "=".repeat(title.len()).cyan());
}

pub fn format_graph_stats(graph: &DataflowGraph, report: &ValidationReport) -> String {
    format!(
        "Graph: {} tensors, {} nodes, {} data edges, {} control edges",
        graph.num_tensors().to_string().green(),
        graph.num_nodes().to_string().cyan(),
        report.stats.data_edges.to_string().yellow(),
        report.stats.control_edges.to_string().magenta()
    )
}

pub fn format_rewrite_summary(report: &LmsReport) -> String {
    format!(
        "{} swap-out, {} swap-in, {} control edges (threshold {}, sync mode {}, {:.2} ms)",
        report.swapout_ops.len().to_string().green(),
        report.swapin_ops.len().to_string().cyan(),
        report.control_edges.len().to_string().yellow(),
        report.swapout_threshold,
        report.sync_mode,
        report.elapsed.as_secs_f64() * 1000.0
    )
}

pub fn enable_colors(enabled: bool) {
    colored::control::set_override(enabled);
}
