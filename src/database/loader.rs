//! Bulk loading: ensure the target table, then COPY the rows

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

use super::copy::{CopyCommand, CopyReport, CopySession, choose_delimiter, copy_statement};
use super::{DatabaseBackend, DatabaseError, DatabaseResult};
use crate::models::{ColumnOverrides, ColumnSpec, DataTable};
use crate::schema::{SchemaMapper, TableSchema};

/// Outcome of [`BulkLoader::load`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadReport {
    pub table: String,
    /// Whether the table was created by this load
    pub created: bool,
    pub columns: Vec<ColumnSpec>,
    pub copy: CopyReport,
    #[serde(skip)]
    pub duration: Duration,
}

/// Creates target tables and streams rows into them
///
/// Each [`stream_copy`](Self::stream_copy) call starts its own COPY session;
/// sessions are never pooled or shared. Table creation and streaming are
/// separate steps, so a failed COPY leaves a created table in place.
pub struct BulkLoader {
    backend: Box<dyn DatabaseBackend>,
    command: CopyCommand,
}

impl BulkLoader {
    pub fn new(backend: Box<dyn DatabaseBackend>, command: CopyCommand) -> Self {
        Self { backend, command }
    }

    /// Connect to PostgreSQL and COPY through `psql` with the same URL
    #[cfg(feature = "postgres-backend")]
    pub async fn connect(url: &str) -> DatabaseResult<Self> {
        let backend = super::PostgresBackend::new(url).await?;
        Ok(Self::new(Box::new(backend), CopyCommand::psql(url)))
    }

    /// Replace the COPY command (for example to use another `psql` binary)
    pub fn with_command(mut self, command: CopyCommand) -> Self {
        self.command = command;
        self
    }

    pub fn backend(&self) -> &dyn DatabaseBackend {
        self.backend.as_ref()
    }

    /// Create the table unless it already exists
    ///
    /// Returns whether the table was created. An existing table is never
    /// altered, even if its columns differ from `specs`.
    #[instrument(skip(self, specs), fields(columns = specs.len()))]
    pub async fn ensure_table(&self, name: &str, specs: &[ColumnSpec]) -> DatabaseResult<bool> {
        if self.backend.table_exists(name).await? {
            info!(table = %name, "Table exists, leaving it unchanged");
            return Ok(false);
        }

        let schema = TableSchema::new(name, specs.to_vec());
        self.backend
            .create_table(&schema)
            .await
            .map_err(|e| match e {
                DatabaseError::TableCreationFailed { .. } | DatabaseError::Schema(_) => e,
                other => DatabaseError::TableCreationFailed {
                    table: name.to_string(),
                    message: other.to_string(),
                },
            })?;
        Ok(true)
    }

    /// Stream every row of `table` into `name` with COPY
    ///
    /// With no delimiter one is picked automatically (see
    /// [`choose_delimiter`](super::copy::choose_delimiter)). Delimiter
    /// characters inside text cells are replaced by a space.
    #[instrument(skip(self, table), fields(rows = table.row_count()))]
    pub fn stream_copy(
        &self,
        name: &str,
        table: &DataTable,
        delimiter: Option<u8>,
    ) -> DatabaseResult<CopyReport> {
        let specs = SchemaMapper::derive(table, &ColumnOverrides::new());
        let delimiter = choose_delimiter(table, &specs, delimiter)?;
        let statement = copy_statement(name, delimiter);

        let mut session = CopySession::open(&self.command)?;
        let written = session
            .write_statement(&statement)
            .and_then(|_| session.write_rows(table, &specs, delimiter));
        // Always reap the subprocess; its exit status explains a broken pipe.
        let finished = session.finish();

        let (rows_written, output) = match (written, finished) {
            (Ok(rows), Ok(output)) => (rows, output),
            (_, Err(e)) => return Err(e),
            (Err(e), Ok(_)) => return Err(e),
        };

        let report = CopyReport {
            table: name.to_string(),
            delimiter: delimiter as char,
            rows_written,
            rows_reported: output.rows_reported(),
        };
        if let Some(reported) = report.rows_reported
            && reported != rows_written as u64
        {
            warn!(
                written = rows_written,
                reported, "Server reported a different row count than was written"
            );
        }
        info!(table = %name, rows = rows_written, delimiter = ?report.delimiter, "COPY finished");
        Ok(report)
    }

    /// Derive column specs, ensure the table, and COPY the rows
    #[instrument(skip(self, table, overrides), fields(rows = table.row_count()))]
    pub async fn load(
        &self,
        name: &str,
        table: &DataTable,
        overrides: &ColumnOverrides,
        delimiter: Option<u8>,
    ) -> DatabaseResult<LoadReport> {
        let start = Instant::now();
        let columns = SchemaMapper::derive(table, overrides);
        TableSchema::new(name, columns.clone()).validate()?;

        let created = self.ensure_table(name, &columns).await?;
        let copy = self.stream_copy(name, table, delimiter)?;

        Ok(LoadReport {
            table: name.to_string(),
            created,
            columns,
            copy,
            duration: start.elapsed(),
        })
    }
}
