//! Load command
//!
//! Ingests files into one table, optionally projects columns, then creates the
//! target table and streams the rows with COPY.

use std::path::{Path, PathBuf};

use crate::cli::error::CliError;
use crate::data_model::DataModel;
use crate::database::copy::parse_delimiter;
use crate::database::{BulkLoader, CopyCommand, LoaderConfig};
use crate::ingest::{DecodeOptions, JsonShape};
use crate::models::{ColumnOverrides, DataTable};
use crate::schema::{SchemaMapper, TableSchema};

/// Load command arguments
#[derive(Debug, Clone)]
pub struct LoadArgs {
    /// Directories and files to ingest
    pub sources: Vec<PathBuf>,
    /// Input format (json, csv, xlsx, feather, parquet)
    pub format: Option<String>,
    /// Target table name
    pub table: String,
    /// Columns to keep, in order (all columns when empty)
    pub columns: Vec<String>,
    /// JSON file of per-column overrides
    pub overrides: Option<PathBuf>,
    /// Number of decode workers
    pub workers: Option<usize>,
    /// COPY delimiter (`tab` for a tab)
    pub delimiter: Option<String>,
    /// Explicit config file (defaults to `.bulk-load.toml` in the current directory)
    pub config: Option<PathBuf>,
    /// JSON layout
    pub json_shape: Option<JsonShape>,
    /// Columns whose text cells should be parsed as timestamps
    pub parse_dates: Vec<String>,
    /// Print the DDL and ingest report without touching the database
    pub dry_run: bool,
    /// Show a progress bar while decoding
    pub progress: bool,
}

/// Execute the load command
pub fn handle_load(args: &LoadArgs) -> Result<(), CliError> {
    let config = load_config(args.config.as_deref())?;

    let format = args
        .format
        .clone()
        .or_else(|| config.ingest.format.clone())
        .ok_or_else(|| {
            CliError::InvalidArgument(
                "No input format given: pass --format or set [ingest] format".to_string(),
            )
        })?;

    let mut options = DecodeOptions::new().parse_dates(args.parse_dates.iter().cloned());
    if let Some(shape) = args.json_shape {
        options = options.json_shape(shape);
    }

    let mut builder = DataModel::builder()
        .format(format)
        .decode_options(options)
        .progress(args.progress);
    builder = match args.sources.as_slice() {
        [] => {
            return Err(CliError::InvalidArgument(
                "At least one source path is required".to_string(),
            ));
        }
        [single] => builder.path(single),
        many => builder.paths(many.iter().cloned()),
    };
    if let Some(workers) = args.workers.or(config.ingest.workers) {
        builder = builder.workers(workers);
    }

    let model = builder.build()?;
    print_ingest_summary(&model);

    let table = if args.columns.is_empty() {
        model.table().clone()
    } else {
        model.project(&args.columns)?
    };

    let overrides = match &args.overrides {
        Some(path) => read_overrides(path)?,
        None => ColumnOverrides::new(),
    };

    let delimiter = match args.delimiter.as_deref().or(config.copy.delimiter.as_deref()) {
        Some(raw) => Some(parse_delimiter(raw)?),
        None => None,
    };

    if args.dry_run {
        return print_dry_run(&args.table, &table, &overrides, &model);
    }

    let url = config.connection_url()?;
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::IoError(format!("Failed to create runtime: {}", e)))?;

    let report = rt.block_on(async {
        let loader = BulkLoader::connect(&url)
            .await?
            .with_command(CopyCommand::psql(&url).with_program(&config.copy.psql_path));
        loader.load(&args.table, &table, &overrides, delimiter).await
    })?;

    println!(
        "{} table {} and loaded {} rows (delimiter {:?}) in {:.2}s",
        if report.created { "Created" } else { "Reused" },
        report.table,
        report.copy.rows_written,
        report.copy.delimiter,
        report.duration.as_secs_f64()
    );
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<LoaderConfig, CliError> {
    let config = match path {
        Some(path) => LoaderConfig::load_file(path),
        None => {
            let cwd = std::env::current_dir()
                .map_err(|e| CliError::IoError(format!("Failed to read current dir: {}", e)))?;
            LoaderConfig::load(&cwd)
        }
    };
    Ok(config?)
}

fn read_overrides(path: &Path) -> Result<ColumnOverrides, CliError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| CliError::FileReadError(path.to_path_buf(), e.to_string()))?;
    serde_json::from_str(&content).map_err(|e| {
        CliError::InvalidArgument(format!("Invalid overrides in {}: {}", path.display(), e))
    })
}

fn print_ingest_summary(model: &DataModel) {
    let report = model.report();
    eprintln!(
        "Decoded {}/{} files ({} kept, {} excluded), {} rows in {}",
        report.files_decoded,
        report.files_attempted,
        report.files_kept,
        report.files_excluded,
        report.rows_ingested,
        report.duration_string()
    );
    for failure in &report.failures {
        eprintln!("  failed: {}: {}", failure.path.display(), failure.reason);
    }
}

fn print_dry_run(
    name: &str,
    table: &DataTable,
    overrides: &ColumnOverrides,
    model: &DataModel,
) -> Result<(), CliError> {
    let schema = TableSchema::new(name, SchemaMapper::derive(table, overrides));
    println!("{};", schema.create_table_sql()?);

    let report = serde_json::to_string_pretty(model.report())
        .map_err(|e| CliError::IoError(format!("Failed to serialize report: {}", e)))?;
    println!("{}", report);
    Ok(())
}
