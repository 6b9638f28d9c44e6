//! CLI binary entry point for bulk-load

#[cfg(feature = "cli")]
use anyhow::Context;
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use data_bulk_loader::cli::commands::load::{LoadArgs, handle_load};
#[cfg(feature = "cli")]
use data_bulk_loader::ingest::JsonShape;
#[cfg(feature = "cli")]
use std::path::PathBuf;
#[cfg(feature = "cli")]
use tracing_subscriber::EnvFilter;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "bulk-load")]
#[command(about = "Ingest tabular files in parallel and bulk load them into PostgreSQL")]
#[command(version)]
struct Cli {
    /// Directories or files to ingest
    #[arg(required = true)]
    sources: Vec<PathBuf>,

    /// Input format (json, csv, xlsx, feather, parquet)
    #[arg(short, long)]
    format: Option<String>,

    /// Target table name
    #[arg(short, long)]
    table: String,

    /// Comma-separated columns to keep, in order
    #[arg(short, long, value_delimiter = ',')]
    columns: Vec<String>,

    /// JSON file of per-column overrides (nullable, primary_key, unique, server_default, check)
    #[arg(long)]
    overrides: Option<PathBuf>,

    /// Number of decode workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// COPY delimiter character, or "tab"
    #[arg(short, long)]
    delimiter: Option<String>,

    /// Config file (defaults to .bulk-load.toml in the current directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON layout: table, series or lines
    #[arg(long)]
    json_shape: Option<JsonShape>,

    /// Comma-separated columns to parse as timestamps
    #[arg(long, value_delimiter = ',')]
    parse_dates: Vec<String>,

    /// Print the DDL and ingest report without connecting
    #[arg(long)]
    dry_run: bool,

    /// Show a progress bar while decoding
    #[arg(long)]
    progress: bool,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long)]
    verbose: bool,
}

#[cfg(feature = "cli")]
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(feature = "cli")]
fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let args = LoadArgs {
        sources: cli.sources,
        format: cli.format,
        table: cli.table,
        columns: cli.columns,
        overrides: cli.overrides,
        workers: cli.workers,
        delimiter: cli.delimiter,
        config: cli.config,
        json_shape: cli.json_shape,
        parse_dates: cli.parse_dates,
        dry_run: cli.dry_run,
        progress: cli.progress,
    };

    handle_load(&args).with_context(|| format!("Failed to load table {}", args.table))?;
    Ok(())
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature is not enabled. Build with --features cli");
    std::process::exit(1);
}
