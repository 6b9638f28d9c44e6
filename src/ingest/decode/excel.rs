//! Spreadsheet decoder (xlsx and other workbook formats calamine can open)

use std::path::Path;

use super::DecodeOptions;
use crate::ingest::error::DecodeError;
use crate::models::DataTable;

/// Decode the first (or the configured) worksheet of a workbook
///
/// The first row of the sheet is the header. Cells are typed from the
/// workbook's own cell types and each column is then unified with
/// [`DataTable::normalize_types`].
#[cfg(feature = "excel")]
pub fn decode_xlsx(path: &Path, options: &DecodeOptions) -> Result<DataTable, DecodeError> {
    use calamine::{Reader, open_workbook_auto};

    let mut workbook = open_workbook_auto(path).map_err(|e| DecodeError::parse(path, e))?;
    let sheet = match &options.sheet {
        Some(name) => name.clone(),
        None => match workbook.sheet_names().first() {
            Some(first) => first.clone(),
            None => return Ok(DataTable::empty()),
        },
    };
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| DecodeError::parse(path, format!("sheet '{}': {}", sheet, e)))?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(DataTable::empty());
    };
    let columns: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            let name = cell.to_string();
            if name.trim().is_empty() {
                format!("column_{}", i)
            } else {
                name.trim().to_string()
            }
        })
        .collect();

    let body: Vec<Vec<crate::models::Value>> = rows
        .map(|row| {
            let mut values: Vec<_> = row.iter().map(cell_value).collect();
            values.resize(columns.len(), crate::models::Value::Null);
            values
        })
        .collect();

    let table = DataTable::new(columns, body).map_err(|e| DecodeError::parse(path, e))?;
    Ok(super::apply_date_columns(table.normalize_types(), options))
}

#[cfg(feature = "excel")]
fn cell_value(cell: &calamine::Data) -> crate::models::Value {
    use crate::models::Value;
    use calamine::{Data, DataType};

    match cell {
        Data::Empty => Value::Null,
        Data::Int(i) => Value::Integer(*i),
        // Workbooks store every number as a float
        Data::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
            Value::Integer(*f as i64)
        }
        Data::Float(f) => Value::Float(*f),
        Data::String(s) => Value::Text(s.clone()),
        Data::Bool(b) => Value::Boolean(*b),
        Data::DateTime(_) | Data::DateTimeIso(_) => match cell.as_datetime() {
            Some(ts) => Value::Timestamp(ts),
            None => Value::Text(cell.to_string()),
        },
        Data::DurationIso(s) => Value::Text(s.clone()),
        Data::Error(e) => {
            tracing::debug!(
                error = ?e,
                "Spreadsheet cell holds an error value, reading it as null"
            );
            Value::Null
        }
    }
}

/// Spreadsheet support is compiled out without the `excel` feature
#[cfg(not(feature = "excel"))]
pub fn decode_xlsx(path: &Path, _options: &DecodeOptions) -> Result<DataTable, DecodeError> {
    Err(DecodeError::parse(
        path,
        "spreadsheet support is not enabled (build with the 'excel' feature)",
    ))
}

#[cfg(all(test, feature = "excel"))]
mod tests {
    use super::*;
    use crate::models::Value;
    use calamine::Data;

    #[test]
    fn test_cell_value_mapping() {
        assert_eq!(cell_value(&Data::Empty), Value::Null);
        assert_eq!(cell_value(&Data::Float(3.0)), Value::Integer(3));
        assert_eq!(cell_value(&Data::Float(2.5)), Value::Float(2.5));
        assert_eq!(cell_value(&Data::Bool(true)), Value::Boolean(true));
        assert_eq!(
            cell_value(&Data::String("x".to_string())),
            Value::Text("x".to_string())
        );
        assert!(matches!(
            cell_value(&Data::DateTimeIso("2024-01-15T10:30:00".to_string())),
            Value::Timestamp(_)
        ));
    }

    #[test]
    fn test_missing_workbook_fails() {
        let err = decode_xlsx(Path::new("/nonexistent/book.xlsx"), &DecodeOptions::default())
            .unwrap_err();
        assert!(matches!(err, DecodeError::Parse { .. }));
    }

    #[test]
    fn test_garbage_workbook_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("book.xlsx");
        std::fs::write(&path, b"not a zip archive").unwrap();

        assert!(decode_xlsx(&path, &DecodeOptions::default()).is_err());
    }
}
