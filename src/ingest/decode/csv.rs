//! CSV decoder

use std::path::Path;

use super::{DecodeOptions, apply_date_columns};
use crate::ingest::error::DecodeError;
use crate::models::value::{infer_text_column, parse_text_cell};
use crate::models::{DataTable, NativeType, Value};

/// Decode a delimited text file
///
/// Column types are inferred per column from the raw cells (see
/// [`infer_text_column`]). An empty file decodes to a table with no headers,
/// which reconciliation later skips. Without a header row, columns are named
/// `column_0`, `column_1`, ...
pub fn decode_csv(path: &Path, options: &DecodeOptions) -> Result<DataTable, DecodeError> {
    let mut reader = ::csv::ReaderBuilder::new()
        .delimiter(options.csv_delimiter)
        .has_headers(options.csv_has_headers)
        .flexible(false)
        .from_path(path)
        .map_err(|e| csv_error(path, e))?;

    let mut records: Vec<::csv::StringRecord> = Vec::new();
    for record in reader.records() {
        records.push(record.map_err(|e| csv_error(path, e))?);
    }

    let columns: Vec<String> = if options.csv_has_headers {
        reader
            .headers()
            .map_err(|e| csv_error(path, e))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect()
    } else {
        let width = records.first().map(|r| r.len()).unwrap_or(0);
        (0..width).map(|i| format!("column_{}", i)).collect()
    };

    if columns.is_empty() || (columns.len() == 1 && columns[0].is_empty() && records.is_empty()) {
        return Ok(DataTable::empty());
    }

    let types: Vec<NativeType> = (0..columns.len())
        .map(|i| infer_text_column(records.iter().filter_map(|r| r.get(i))))
        .collect();

    let rows: Vec<Vec<Value>> = records
        .iter()
        .map(|record| {
            record
                .iter()
                .zip(&types)
                .map(|(cell, ty)| parse_text_cell(cell, ty))
                .collect::<Vec<_>>()
        })
        .collect();

    let table = DataTable::new(columns, rows)
        .and_then(|t| t.with_column_types(types))
        .map_err(|e| DecodeError::parse(path, e))?;

    Ok(apply_date_columns(table, options))
}

fn csv_error(path: &Path, error: ::csv::Error) -> DecodeError {
    match error.into_kind() {
        ::csv::ErrorKind::Io(source) => DecodeError::io(path, source),
        kind => DecodeError::parse(path, format!("{:?}", kind)),
    }
}
