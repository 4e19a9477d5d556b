//! CLI argument definitions using clap

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tensorswap_lms::LmsConfig;

#[derive(Parser)]
#[command(name = "tensorswap")]
#[command(author, version, about = "Static tensor swap-out/swap-in rewriting for dataflow graphs", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Insert swap-out/swap-in nodes into a graph
    Rewrite(RewriteArgs),

    /// Show graph statistics and swap candidates without rewriting
    Inspect {
        /// Graph file (JSON)
        graph: PathBuf,

        /// Configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Configuration file management
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the resolved configuration
    Show {
        /// Configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Show the configuration file path that would be used
    Path,
    /// Write a default configuration file
    Init {
        /// Target path (defaults to ./tensorswap.toml)
        path: Option<PathBuf>,
    },
}

#[derive(Args)]
pub struct RewriteArgs {
    /// Graph file (JSON)
    pub graph: PathBuf,

    /// Configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output file (stdout if not specified)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'F', long, value_enum, default_value = "json")]
    pub format: OutputFormat,

    /// Write the rewrite report as JSON to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Swap tensors whose consumers run more than this many ranks after the producer
    #[arg(long)]
    pub swapout_threshold: Option<usize>,

    /// Consumers within this many ranks share one swap-in
    #[arg(long)]
    pub swapin_groupby: Option<usize>,

    /// Fixed swap-in lookahead (sequential strategy if not specified)
    #[arg(long)]
    pub swapin_ahead: Option<usize>,

    /// Synchronization mode: 0 async, 1 swap-in, 2 swap-out, 3 both
    #[arg(long)]
    pub sync_mode: Option<u8>,

    /// Device tag for inserted swap nodes
    #[arg(long)]
    pub offload_device: Option<String>,

    /// Exclude a name scope (can be specified multiple times)
    #[arg(long)]
    pub excl_scope: Vec<String>,

    /// Only swap outputs of nodes in this name scope (can be specified multiple times)
    #[arg(long)]
    pub incl_scope: Vec<String>,

    /// Exclude an op type (can be specified multiple times)
    #[arg(long)]
    pub excl_type: Vec<String>,

    /// Only swap outputs of nodes of this op type (can be specified multiple times)
    #[arg(long)]
    pub incl_type: Vec<String>,

    /// Enable engine diagnostics
    #[arg(long)]
    pub debug: bool,

    /// Deepest engine diagnostic level (implies --debug)
    #[arg(long)]
    pub debug_level: Option<u8>,

    /// Quiet mode (no summary)
    #[arg(short, long)]
    pub quiet: bool,
}

impl RewriteArgs {
    /// Layer command-line values over a file configuration.
    pub fn apply(&self, config: &mut LmsConfig) {
        if let Some(threshold) = self.swapout_threshold {
            config.swapout_threshold = Some(threshold);
        }
        if let Some(groupby) = self.swapin_groupby {
            config.swapin_groupby = groupby;
        }
        if let Some(ahead) = self.swapin_ahead {
            config.swapin_ahead = Some(ahead);
        }
        if let Some(mode) = self.sync_mode {
            config.sync_mode = mode;
        }
        if let Some(device) = &self.offload_device {
            config.offload_device = device.clone();
        }
        config.excl_scopes.extend(self.excl_scope.iter().cloned());
        config.incl_scopes.extend(self.incl_scope.iter().cloned());
        config.excl_types.extend(self.excl_type.iter().cloned());
        config.incl_types.extend(self.incl_type.iter().cloned());
        if self.debug {
            config.debug = true;
        }
        if let Some(level) = self.debug_level {
            config.debug = true;
            config.debug_level = level;
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// JSON serialization of the rewritten graph
    Json,
    /// Graphviz DOT format, swap nodes highlighted
    Dot,
}
