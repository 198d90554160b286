//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Aggregate test lifecycle events into a hierarchical result tree
#[derive(Parser, Debug)]
#[command(name = "test-rollup")]
#[command(author = "hephaex@gmail.com")]
#[command(version = "0.1.0")]
#[command(about = "Aggregate test execution events into a result tree")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (YAML or JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay an event feed and print the result tree
    Aggregate(AggregateArgs),

    /// Show per-test statistics from run history
    History(HistoryArgs),

    /// Show or create configuration
    Config(ConfigArgs),
}

/// Arguments for aggregate command
#[derive(Parser, Debug)]
pub struct AggregateArgs {
    /// Event feed in JSON Lines format
    pub events: PathBuf,

    /// Output format (tree, json, json-pretty, summary, csv)
    #[arg(short, long)]
    pub format: Option<String>,

    /// Write the rendered tree to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// History file to record this run in
    #[arg(long)]
    pub history: Option<PathBuf>,

    /// Do not record this run
    #[arg(long, conflicts_with = "history")]
    pub no_history: bool,
}

/// Arguments for history command
#[derive(Parser, Debug)]
pub struct HistoryArgs {
    /// History file to read
    #[arg(long)]
    pub history: Option<PathBuf>,

    /// Only show tests whose identifier path contains this text
    #[arg(short, long)]
    pub test: Option<String>,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Print the effective configuration
    #[arg(short, long)]
    pub show: bool,

    /// Write an example configuration file
    #[arg(short, long, conflicts_with = "show")]
    pub init: Option<PathBuf>,
}
