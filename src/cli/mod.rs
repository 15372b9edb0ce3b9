//! CLI module
//!
//! This module defines the command-line interface using clap and implements
//! the command execution logic.

use crate::engine::ColorPolicy;
use crate::source::{InputFormat, RecordShape};
use crate::{Config, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub mod commands;
pub mod output;

/// Student path graph builder CLI
#[derive(Parser, Debug)]
#[command(name = "tutor-path-graph")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (overrides config)
    #[arg(long, global = true, env = "TUTOR_PATH_GRAPH_LOG")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Where records come from and how the graph is aggregated
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Path to the records file
    #[arg(short, long)]
    pub input: PathBuf,

    /// Record shape (overrides config)
    #[arg(long, value_enum)]
    pub shape: Option<RecordShape>,

    /// Input encoding (overrides config)
    #[arg(short, long, value_enum)]
    pub format: Option<InputFormat>,

    /// Field delimiter for csv/tsv input
    #[arg(long)]
    pub delimiter: Option<char>,

    /// Drop transitions from a state to itself
    #[arg(long)]
    pub ignore_self_loops: bool,

    /// Link color policy (overrides config)
    #[arg(long, value_enum)]
    pub color_policy: Option<ColorPolicy>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the path graph and write it out
    Build {
        #[command(flatten)]
        input: InputArgs,

        /// Minimum transitions for a link to be kept
        #[arg(short, long, conflicts_with = "threshold_percent")]
        threshold: Option<f64>,

        /// Minimum transitions as a percentage of the busiest link
        #[arg(long)]
        threshold_percent: Option<f64>,

        /// Drop error-colored links and the nodes they leave behind
        #[arg(long)]
        hide_errors: bool,

        /// Drop solver nodes (when auxiliary nodes are present)
        #[arg(long)]
        hide_solver: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        output: OutputFormat,
    },

    /// Print summary statistics of the full graph
    Stats {
        #[command(flatten)]
        input: InputArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        output: StatsFormat,
    },
}

/// Graph output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// JSON nodes/links document
    Json,
    /// DOT format (Graphviz)
    Dot,
    /// Plain text table
    Table,
}

/// Statistics output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatsFormat {
    Json,
    Table,
}

/// Execute the CLI command
pub fn execute(args: Cli, config: Config) -> Result<()> {
    match args.command {
        Commands::Build { .. } => commands::build::execute(args, config),
        Commands::Stats { .. } => commands::stats::execute(args, config),
    }
}
