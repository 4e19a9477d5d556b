//! TensorSwap CLI - Command-line interface for large model support rewriting
//!
//! Loads a dataflow graph from JSON, inserts swap-out/swap-in nodes and their
//! control dependencies, and writes the rewritten graph as JSON or DOT.

mod cli;
mod config;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::Path;
use tensorswap_ir::{export_to_dot_with_options, validate_graph, DataflowGraph, DotExportOptions};
use tensorswap_lms::{rewrite_graph, LmsConfig, LmsReport, TopoOrder};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, ConfigCommand, OutputFormat, RewriteArgs};
use config::Config;
use output::{
    enable_colors, format_graph_stats, format_rewrite_summary, print_error, print_header,
    print_info, print_success,
};

fn main() {
    if let Err(e) = run() {
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Rewrite(args) => rewrite_mode(&cli, args),
        Commands::Inspect { graph, config } => inspect_mode(&cli, graph, config.as_deref()),
        Commands::Config { command } => handle_config_command(command),
    }
}

/// Install the fmt subscriber on stderr. `RUST_LOG` wins over the flags.
fn init_tracing(verbose: u8, quiet: bool, lms: &LmsConfig) {
    let engine_level = if lms.debug { lms.debug_level } else { 0 };
    let default = match verbose.max(engine_level) {
        0 if quiet => "warn",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn read_graph(path: &Path) -> Result<DataflowGraph> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read graph file: {}", path.display()))?;
    DataflowGraph::from_json(&content)
        .with_context(|| format!("Failed to parse graph file: {}", path.display()))
}

fn ensure_valid(graph: &DataflowGraph) -> Result<()> {
    let report = validate_graph(graph);
    if !report.is_valid() {
        print_error("Input graph validation failed:");
        for error in &report.errors {
            eprintln!("  - {}", error.message);
        }
        anyhow::bail!("Graph validation failed");
    }
    Ok(())
}

fn rewrite_mode(cli: &Cli, args: &RewriteArgs) -> Result<()> {
    let mut config = Config::resolve(args.config.as_deref())?;
    args.apply(&mut config.lms);
    config.lms.validate().context("Invalid configuration")?;

    enable_colors(config.colored && !cli.no_color);
    init_tracing(cli.verbose, args.quiet, &config.lms);

    let mut graph = read_graph(&args.graph)?;
    ensure_valid(&graph)?;

    let report = rewrite_graph(&mut graph, &config.lms).context("Rewrite failed")?;
    let output = generate_output(&graph, &report, args.format)?;

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write report file: {}", path.display()))?;
    }

    match &args.output {
        Some(path) => {
            fs::write(path, output).context("Failed to write output file")?;
            if !args.quiet {
                print_success(&format!("Rewritten graph written to: {}", path.display()));
                println!("  {}", format_rewrite_summary(&report));
            }
        }
        None => {
            println!("{}", output);
            if !args.quiet {
                eprintln!("{}", format_rewrite_summary(&report));
            }
        }
    }

    Ok(())
}

fn generate_output(
    graph: &DataflowGraph,
    report: &LmsReport,
    format: OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Json => graph
            .to_json_pretty()
            .context("Failed to serialize graph to JSON"),
        OutputFormat::Dot => {
            let options = DotExportOptions {
                show_devices: true,
                highlight_nodes: report
                    .swapout_ops
                    .iter()
                    .chain(&report.swapin_ops)
                    .copied()
                    .collect(),
                ..Default::default()
            };
            Ok(export_to_dot_with_options(graph, &options))
        }
    }
}

fn inspect_mode(cli: &Cli, path: &Path, config_path: Option<&Path>) -> Result<()> {
    let config = Config::resolve(config_path)?;
    enable_colors(config.colored && !cli.no_color);
    init_tracing(cli.verbose, true, &config.lms);

    let graph = read_graph(path)?;
    let validation = validate_graph(&graph);

    print_header(&format!("Inspecting: {}", path.display()));
    println!("  {}", format_graph_stats(&graph, &validation));
    println!("  Conditional nodes: {}", validation.stats.conditional_nodes);
    println!("  {}", validation.summary());
    for warning in &validation.warnings {
        println!("    - {}", warning.message);
    }
    ensure_valid(&graph)?;

    let topo = TopoOrder::build(&graph).context("Failed to order graph")?;
    println!("  Topological order: {} ranks", topo.size());

    let mut preview = graph.clone();
    let report = rewrite_graph(&mut preview, &config.lms).context("Dry-run rewrite failed")?;
    print_info(&format!("Dry run: {}", format_rewrite_summary(&report)));

    Ok(())
}

fn handle_config_command(command: &ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show { config } => {
            let config = Config::resolve(config.as_deref())?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
        }
        ConfigCommand::Path => match Config::locate(None) {
            Some(path) => println!("{}", path.display()),
            None => print_info("No configuration file found; defaults in use"),
        },
        ConfigCommand::Init { path } => {
            let path = Config::create_default(path.as_deref())?;
            print_success(&format!("Created config file: {}", path.display()));
        }
    }

    Ok(())
}
