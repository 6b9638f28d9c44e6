//! Ingestion error types

use std::path::PathBuf;

use crate::models::TableError;

/// Error raised by the ingestion pipeline as a whole
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The input source is not a directory, file, path list or table
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The requested file format is not one of the supported formats
    #[error("Invalid format '{0}': expected one of json, csv, xlsx, feather, parquet")]
    InvalidFormat(String),

    /// No decoded file contributed a non-empty header
    #[error("No valid headers found in any ingested file")]
    NoValidHeaders,

    /// Discovery pattern could not be compiled
    #[error("Invalid file pattern: {0}")]
    InvalidPattern(String),

    /// The decoding worker pool could not be created
    #[error("Failed to build worker pool: {0}")]
    WorkerPool(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Table(#[from] TableError),
}

/// Failure to decode a single file
///
/// Never escapes ingestion: each one becomes a [`super::FileFailure`] entry
/// in the ingestion report and the file is dropped.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Decoder panicked on {path}: {message}")]
    Panicked { path: PathBuf, message: String },
}

impl DecodeError {
    /// Build a parse error from any displayable cause
    pub fn parse(path: &std::path::Path, message: impl std::fmt::Display) -> Self {
        DecodeError::Parse {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }

    /// Build an IO error for the given path
    pub fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        DecodeError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
