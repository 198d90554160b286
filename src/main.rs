//! Test Rollup - test execution event aggregator
//!
//! A CLI tool that replays the lifecycle events emitted by a test executor
//! and renders the resulting hierarchical result tree.
//!
//! ## Features
//!
//! - Static containers and tests plus dynamically generated tests
//! - Status and duration rollup from leaves to the run root
//! - Multiple output formats (Tree, JSON, CSV, Summary)
//! - Per-test run history with pass rates and average durations
//!
//! ## Usage
//!
//! ```bash
//! # Aggregate an event feed
//! test-rollup aggregate run.jsonl
//!
//! # Emit JSON without touching history
//! test-rollup aggregate run.jsonl --format json --no-history
//!
//! # Show history for one test class
//! test-rollup history --test AlphaTest
//! ```

use anyhow::{bail, Result};
use clap::Parser;
use std::path::Path;
use tracing::{info, warn};

mod cli;

use cli::Args;
use test_rollup::aggregate::TreeBuilder;
use test_rollup::config::{self, AppConfig, EnvConfig};
use test_rollup::feed::{replay, EventReader};
use test_rollup::output::{write_tree_to_file, OutputFormat, ResultFormatter};
use test_rollup::results::{generate_run_id, HistoryStore, JsonFileHistoryStore, TestStats};
use test_rollup::utils::{init_logger, LogLevel};

fn main() -> Result<()> {
    let args = Args::parse();

    let env = EnvConfig::load();
    let mut app_config = config::load_config(args.config.as_deref())?;
    env.apply_to(&mut app_config);
    app_config.validate()?;

    init_logger(LogLevel::resolve(
        &app_config.log_level,
        args.verbose || env.is_verbose(),
    ));

    match args.command {
        cli::Command::Aggregate(aggregate_args) => {
            run_aggregate(aggregate_args, &app_config)?;
        }
        cli::Command::History(history_args) => {
            show_history(history_args, &app_config)?;
        }
        cli::Command::Config(config_args) => {
            manage_config(config_args, &app_config, args.config.as_deref())?;
        }
    }

    Ok(())
}

fn run_aggregate(args: cli::AggregateArgs, app_config: &AppConfig) -> Result<()> {
    let format = match &args.format {
        Some(name) => OutputFormat::from_str(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown output format: {name}"))?,
        None => app_config.output_format(),
    };
    let formatter = ResultFormatter::new(format);

    info!("Aggregating events from {}", args.events.display());

    let mut builder = TreeBuilder::new();
    let outcome = replay(EventReader::open(&args.events)?, &mut builder)?;

    if let Err(rejected) = outcome {
        eprintln!("{}", formatter.format_rejection(&rejected));
        eprintln!("\nPartial result tree:");
        eprintln!(
            "{}",
            ResultFormatter::new(OutputFormat::Tree).format_tree(builder.tree())?
        );
        bail!(
            "Aggregation stopped at event #{} after {} events",
            rejected.sequence_no,
            builder.applied()
        );
    }

    let applied = builder.applied();
    let tree = builder.into_result_tree();
    info!("Applied {} events", applied);

    match &args.output {
        Some(path) => {
            write_tree_to_file(path, &tree, format)?;
            println!("✓ Results written to {}", path.display());
        }
        None => println!("{}", formatter.format_tree(&tree)?),
    }

    if !tree.is_complete() {
        warn!(
            "Event feed ended before the run finished; {} tests still pending",
            tree.summary().pending
        );
        return Ok(());
    }

    if args.no_history || !app_config.history.enabled {
        return Ok(());
    }

    let history_path = args
        .history
        .clone()
        .unwrap_or_else(|| app_config.history_path());
    let mut store = JsonFileHistoryStore::open(&history_path)?.with_limit(app_config.history.limit);
    let run_id = generate_run_id();
    let recorded = store.record(&tree, &run_id);
    store.save()?;
    info!("Recorded {} results as run {}", recorded, run_id);

    Ok(())
}

fn show_history(args: cli::HistoryArgs, app_config: &AppConfig) -> Result<()> {
    let history_path = args.history.unwrap_or_else(|| app_config.history_path());
    if !history_path.exists() {
        println!("\n📭 No run history found at {}", history_path.display());
        println!("   Record runs with: test-rollup aggregate <events.jsonl>");
        return Ok(());
    }

    let store = JsonFileHistoryStore::open(&history_path)?.with_limit(app_config.history.limit);
    let filter = args.test.as_deref().unwrap_or("");

    let rows: Vec<(&str, TestStats)> = store
        .paths()
        .into_iter()
        .filter(|path| path.contains(filter))
        .filter_map(|path| store.stats(path).map(|stats| (path, stats)))
        .collect();

    if rows.is_empty() {
        println!("No history entries match '{filter}'.");
        return Ok(());
    }

    println!(
        "\n{:<60} {:>5} {:>8} {:>10}  {}",
        "Test", "Runs", "Pass", "Avg", "Last"
    );
    println!("{:-<96}", "");
    for (path, stats) in &rows {
        let flag = if stats.is_flaky() { " (flaky)" } else { "" };
        println!(
            "{:<60} {:>5} {:>7.1}% {:>8}ms  {}{}",
            path, stats.runs, stats.pass_rate, stats.avg_duration_ms, stats.last_status, flag
        );
    }
    println!();

    Ok(())
}

fn manage_config(
    args: cli::ConfigArgs,
    app_config: &AppConfig,
    explicit: Option<&Path>,
) -> Result<()> {
    if let Some(path) = &args.init {
        init_config(path)?;
        return Ok(());
    }

    let source = explicit.map(Path::to_path_buf).or_else(config::find_config);
    match source {
        Some(path) => println!("# Loaded from {}", path.display()),
        None => println!("# No configuration file found; using defaults"),
    }
    println!("{}", serde_yaml::to_string(app_config)?);
    if !args.show {
        config::print_env_help();
    }
    Ok(())
}

fn init_config(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("Configuration file already exists: {}", path.display());
    }

    AppConfig::example().save(path)?;
    println!("✓ Configuration file created: {}", path.display());
    println!("\nEdit the file to customize your settings.");
    Ok(())
}
