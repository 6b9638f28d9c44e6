//! File format selection

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::decode::{self, DecodeOptions, Decoder};
use super::error::IngestError;

/// Supported input file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Json,
    Csv,
    Xlsx,
    /// Arrow IPC file format
    Feather,
    Parquet,
}

impl FileFormat {
    /// All supported formats
    pub const ALL: [FileFormat; 5] = [
        FileFormat::Json,
        FileFormat::Csv,
        FileFormat::Xlsx,
        FileFormat::Feather,
        FileFormat::Parquet,
    ];

    /// File extension (without the dot) used when discovering files
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Json => "json",
            FileFormat::Csv => "csv",
            FileFormat::Xlsx => "xlsx",
            FileFormat::Feather => "feather",
            FileFormat::Parquet => "parquet",
        }
    }
}

impl std::str::FromStr for FileFormat {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().trim_start_matches('.').to_lowercase();
        FileFormat::ALL
            .into_iter()
            .find(|f| f.extension() == normalized)
            .ok_or_else(|| IngestError::InvalidFormat(s.to_string()))
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Maps a requested format to its decode capability
pub struct FormatResolver;

impl FormatResolver {
    /// Parse an optional format name
    ///
    /// `None` means the caller supplies an in-memory table and needs no decoder.
    pub fn parse(name: Option<&str>) -> Result<Option<FileFormat>, IngestError> {
        name.map(str::parse).transpose()
    }

    /// Select the decoder for a format, binding the decode options once
    pub fn resolve(format: Option<FileFormat>, options: &DecodeOptions) -> Option<Decoder> {
        let format = format?;
        let options = options.clone();
        let decoder: Decoder = match format {
            FileFormat::Csv => Arc::new(move |path: &std::path::Path| {
                decode::csv::decode_csv(path, &options)
            }),
            FileFormat::Json => Arc::new(move |path: &std::path::Path| {
                decode::json::decode_json(path, &options)
            }),
            FileFormat::Xlsx => Arc::new(move |path: &std::path::Path| {
                decode::excel::decode_xlsx(path, &options)
            }),
            FileFormat::Feather => Arc::new(move |path: &std::path::Path| {
                decode::columnar::decode_feather(path, &options)
            }),
            FileFormat::Parquet => Arc::new(move |path: &std::path::Path| {
                decode::columnar::decode_parquet(path, &options)
            }),
        };
        Some(decoder)
    }
}
