//! Input sources and file discovery

use std::path::{Path, PathBuf};

use super::error::IngestError;
use super::format::FileFormat;
use crate::models::DataTable;

/// What a data model is built from
#[derive(Debug, Clone)]
pub enum Source {
    /// Every file directly inside the directory whose extension matches the format
    Directory(PathBuf),
    /// A single file
    File(PathBuf),
    /// An explicit list of files; directories in the list are expanded like
    /// [`Source::Directory`]
    Paths(Vec<PathBuf>),
    /// An already decoded table; ingestion is skipped
    Table(DataTable),
}

impl Source {
    /// Classify a path as a directory or a file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, IngestError> {
        let path = path.as_ref();
        if path.is_dir() {
            Ok(Source::Directory(path.to_path_buf()))
        } else if path.is_file() {
            Ok(Source::File(path.to_path_buf()))
        } else {
            Err(IngestError::InvalidInput(format!(
                "{} is neither a directory nor a file",
                path.display()
            )))
        }
    }

    /// Resolve the source to the list of files to decode
    ///
    /// Returns `None` for an in-memory table. File-based sources need a format.
    pub fn resolve(&self, format: Option<FileFormat>) -> Result<Option<Vec<PathBuf>>, IngestError> {
        let files = match self {
            Source::Table(_) => return Ok(None),
            Source::Directory(dir) => {
                let format = require_format(format)?;
                let files = discover_files(dir, format)?;
                if files.is_empty() {
                    return Err(IngestError::InvalidInput(format!(
                        "no .{} files found in {}",
                        format.extension(),
                        dir.display()
                    )));
                }
                files
            }
            Source::File(path) => {
                require_format(format)?;
                if !path.is_file() {
                    return Err(IngestError::InvalidInput(format!(
                        "{} is not a file",
                        path.display()
                    )));
                }
                vec![path.clone()]
            }
            Source::Paths(paths) => {
                let format = require_format(format)?;
                let mut files = Vec::with_capacity(paths.len());
                for path in paths {
                    if path.is_dir() {
                        files.extend(discover_files(path, format)?);
                    } else {
                        files.push(path.clone());
                    }
                }
                if files.is_empty() {
                    return Err(IngestError::InvalidInput(format!(
                        "no .{} files in the given paths",
                        format.extension()
                    )));
                }
                files
            }
        };
        Ok(Some(files))
    }
}

fn require_format(format: Option<FileFormat>) -> Result<FileFormat, IngestError> {
    format.ok_or_else(|| {
        IngestError::InvalidInput("a file format is required to ingest files".to_string())
    })
}

/// List regular files directly inside `dir` with the format's extension
///
/// The search is not recursive. Paths are returned sorted.
pub fn discover_files(dir: &Path, format: FileFormat) -> Result<Vec<PathBuf>, IngestError> {
    let base = glob::Pattern::escape(&dir.to_string_lossy());
    let pattern = format!("{}/*.{}", base.trim_end_matches('/'), format.extension());

    let entries = glob::glob(&pattern)
        .map_err(|e| IngestError::InvalidPattern(format!("{}: {}", pattern, e)))?;

    let mut files = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) => {
                if path.is_file() {
                    files.push(path);
                }
            }
            Err(e) => {
                tracing::warn!("Error accessing path: {}", e);
            }
        }
    }

    files.sort();
    Ok(files)
}
