//! Data model facade
//!
//! A [`DataModel`] is the reconciled table built from a directory, a file, a
//! list of files or an in-memory table. Construction goes through
//! [`DataModelBuilder`], which resolves every setting once into an immutable
//! [`PipelineConfig`] and then runs the ingest and reconcile stages.
//!
//! # Example
//!
//! ```rust,no_run
//! use data_bulk_loader::DataModel;
//!
//! let model = DataModel::builder()
//!     .path("data/songs")
//!     .format("json")
//!     .workers(4)
//!     .build()?;
//! let songs = model.project(&["song_id", "title", "artist_id", "year", "duration"])?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, instrument};

use crate::ingest::{
    DecodeOptions, Decoder, FileFormat, FormatResolver, IngestError, IngestReport,
    ParallelIngestor, Source, TableReconciler,
};
use crate::models::{DataTable, TableError};

/// Settings resolved once by [`DataModelBuilder::build`]
#[derive(Clone)]
pub struct PipelineConfig {
    /// Declared input format, if any
    pub format: Option<FileFormat>,
    /// Decoder bound to the decode options (absent for in-memory tables)
    pub decoder: Option<Decoder>,
    /// Number of decode workers
    pub workers: usize,
    /// Options applied to every decoded file
    pub options: DecodeOptions,
    /// Whether to show a progress bar while decoding
    pub progress: bool,
}

impl std::fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("format", &self.format)
            .field("decoder", &self.decoder.as_ref().map(|_| "<decoder>"))
            .field("workers", &self.workers)
            .field("options", &self.options)
            .field("progress", &self.progress)
            .finish()
    }
}

/// Default number of decode workers: the available parallelism, or 1
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Builder for [`DataModel`]
#[derive(Default)]
pub struct DataModelBuilder {
    source: Option<Source>,
    path: Option<PathBuf>,
    format: Option<String>,
    decoder: Option<Decoder>,
    workers: Option<usize>,
    options: DecodeOptions,
    progress: bool,
}

impl DataModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an explicit source
    pub fn source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }

    /// Use a directory or a single file, classified when the model is built
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Use an explicit list of files; directories in it are searched like [`path`](Self::path)
    pub fn paths<I, P>(self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.source(Source::Paths(paths.into_iter().map(Into::into).collect()))
    }

    /// Use an in-memory table; ingestion is skipped
    pub fn table(self, table: DataTable) -> Self {
        self.source(Source::Table(table))
    }

    /// Declared file format (json, csv, xlsx, feather or parquet)
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Decode with a custom decoder instead of the one selected by the format
    pub fn decoder(mut self, decoder: Decoder) -> Self {
        self.decoder = Some(decoder);
        self
    }

    /// Number of decode workers (defaults to the available parallelism)
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn decode_options(mut self, options: DecodeOptions) -> Self {
        self.options = options;
        self
    }

    /// Show a progress bar on stderr while decoding
    pub fn progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Resolve the settings without ingesting anything
    pub fn config(&self) -> Result<PipelineConfig, IngestError> {
        let format = FormatResolver::parse(self.format.as_deref())?;
        let decoder = self
            .decoder
            .clone()
            .or_else(|| FormatResolver::resolve(format, &self.options));
        Ok(PipelineConfig {
            format,
            decoder,
            workers: self.workers.unwrap_or_else(default_workers).max(1),
            options: self.options.clone(),
            progress: self.progress,
        })
    }

    /// Resolve the input, ingest every file and reconcile the results
    #[instrument(skip(self), fields(format = ?self.format))]
    pub fn build(self) -> Result<DataModel, IngestError> {
        let config = self.config()?;
        let source = match (self.source, self.path) {
            (Some(source), _) => source,
            (None, Some(path)) => Source::from_path(path)?,
            (None, None) => {
                return Err(IngestError::InvalidInput(
                    "no directory, file, path list or table given".to_string(),
                ));
            }
        };

        if let Source::Table(table) = source {
            info!(
                rows = table.row_count(),
                columns = table.column_count(),
                "Using in-memory table"
            );
            return Ok(DataModel {
                config,
                table,
                report: IngestReport::new(),
            });
        }

        let files = match source.resolve(config.format)? {
            Some(files) => files,
            None => Vec::new(),
        };
        // A custom decoder stands in for the format-selected one.
        let decoder = config.decoder.clone().ok_or_else(|| {
            IngestError::InvalidInput("a file format is required to ingest files".to_string())
        })?;

        let start = Instant::now();
        let outcome = ParallelIngestor::new(config.workers)
            .with_progress(config.progress)
            .ingest(&files, &decoder)?;
        let mut report = outcome.report;
        let table = TableReconciler::reconcile_with_report(outcome.results, &mut report)?;
        report.duration = start.elapsed();

        info!(
            files = report.files_attempted,
            failed = report.failures_count,
            rows = report.rows_ingested,
            duration = %report.duration_string(),
            "Ingestion complete"
        );
        Ok(DataModel {
            config,
            table,
            report,
        })
    }
}

/// A reconciled table together with how it was produced
#[derive(Debug, Clone)]
pub struct DataModel {
    config: PipelineConfig,
    table: DataTable,
    report: IngestReport,
}

impl DataModel {
    pub fn builder() -> DataModelBuilder {
        DataModelBuilder::new()
    }

    /// The reconciled table
    pub fn table(&self) -> &DataTable {
        &self.table
    }

    /// Ingestion diagnostics (empty for in-memory tables)
    pub fn report(&self) -> &IngestReport {
        &self.report
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn columns(&self) -> &[String] {
        self.table.columns()
    }

    /// Select columns and drop duplicate rows
    ///
    /// The model's table is left untouched, so projecting twice gives the
    /// same result.
    #[instrument(skip(self, columns), fields(columns = columns.len()))]
    pub fn project<S: AsRef<str>>(&self, columns: &[S]) -> Result<DataTable, TableError> {
        let projected = self.table.project(columns)?;
        info!(
            rows = projected.row_count(),
            source_rows = self.table.row_count(),
            "Projected table"
        );
        Ok(projected)
    }

    pub fn into_table(self) -> DataTable {
        self.table
    }
}
