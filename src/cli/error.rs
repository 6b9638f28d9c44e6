//! CLI-specific error types

use std::path::PathBuf;
use thiserror::Error;

use crate::database::DatabaseError;
use crate::ingest::IngestError;
use crate::models::TableError;
use crate::schema::SchemaError;

/// CLI-specific error type
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to read file {0}: {1}")]
    FileReadError(PathBuf, String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Ingestion error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Projection error: {0}")]
    Table(#[from] TableError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("IO error: {0}")]
    IoError(String),
}
