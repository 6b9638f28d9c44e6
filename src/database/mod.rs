//! Database side of a bulk load
//!
//! This module provides:
//! - A [`DatabaseBackend`] abstraction for the two catalog operations a load
//!   needs (does a table exist, create a table)
//! - A PostgreSQL backend (feature `postgres-backend`) and an in-memory backend
//! - The COPY session that streams rows through a `psql` subprocess
//! - [`BulkLoader`], which ties schema derivation, table creation and COPY together
//!
//! Row data never goes through the backend connection: it is always streamed
//! with `COPY ... FROM STDIN` over the subprocess pipe.

use async_trait::async_trait;

#[cfg(feature = "postgres-backend")]
pub mod postgres;

pub mod config;
pub mod copy;
pub mod loader;
pub mod memory;

#[cfg(feature = "postgres-backend")]
pub use self::postgres::PostgresBackend;

pub use config::{ConnectionConfig, LoaderConfig};
pub use copy::{CopyCommand, CopyReport, CopySession};
pub use loader::{BulkLoader, LoadReport};
pub use memory::MemoryBackend;

use crate::schema::{SchemaError, TableSchema};

/// Error type for database operations
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// The CREATE TABLE statement was rejected
    #[error("Failed to create table '{table}': {message}")]
    TableCreationFailed { table: String, message: String },

    /// The COPY subprocess failed or could not be fed
    #[error("Bulk transfer failed (exit status {}): {stderr}", exit_status(.status))]
    BulkTransferFailed { status: Option<i32>, stderr: String },

    /// The COPY delimiter is unusable for this table
    #[error("Invalid delimiter: {0}")]
    InvalidDelimiter(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

fn exit_status(status: &Option<i32>) -> String {
    status.map_or_else(|| "unknown".to_string(), |code| code.to_string())
}

/// Result type for database operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Catalog operations needed before a COPY
///
/// Implementations never alter an existing table.
#[async_trait(?Send)]
pub trait DatabaseBackend: Send + Sync {
    /// Whether a table (optionally schema-qualified) exists
    async fn table_exists(&self, name: &str) -> DatabaseResult<bool>;

    /// Create the table described by `schema`
    async fn create_table(&self, schema: &TableSchema) -> DatabaseResult<()>;
}
