//! JSON decoder

use serde_json::{Map, Value as JsonValue};
use std::fs;
use std::path::Path;

use super::{DecodeOptions, JsonShape, apply_date_columns};
use crate::ingest::error::DecodeError;
use crate::models::{DataTable, Value};

/// Decode a JSON file according to [`DecodeOptions::json_shape`]
///
/// - `Table`: an array of record objects (columns in first-seen key order), or
///   an object of columns where each column is an array or an index-keyed object.
/// - `Series`: a single object read as one row.
/// - `Lines`: one record object per non-empty line.
///
/// An empty file or an empty array decodes to a table with no headers.
pub fn decode_json(path: &Path, options: &DecodeOptions) -> Result<DataTable, DecodeError> {
    let content = fs::read_to_string(path).map_err(|e| DecodeError::io(path, e))?;
    if content.trim().is_empty() {
        return Ok(DataTable::empty());
    }

    let table = match options.json_shape {
        JsonShape::Table => {
            let value: JsonValue =
                serde_json::from_str(&content).map_err(|e| DecodeError::parse(path, e))?;
            match value {
                JsonValue::Array(items) => records_to_table(path, items)?,
                JsonValue::Object(columns) => columns_to_table(path, columns)?,
                other => {
                    return Err(DecodeError::parse(
                        path,
                        format!("expected an array or object, found {}", type_name(&other)),
                    ));
                }
            }
        }
        JsonShape::Series => {
            let value: JsonValue =
                serde_json::from_str(&content).map_err(|e| DecodeError::parse(path, e))?;
            match value {
                JsonValue::Object(fields) => {
                    let columns: Vec<String> = fields.keys().cloned().collect();
                    let row: Vec<Value> = fields.into_iter().map(|(_, v)| Value::from(v)).collect();
                    DataTable::new(columns, vec![row]).map_err(|e| DecodeError::parse(path, e))?
                }
                other => {
                    return Err(DecodeError::parse(
                        path,
                        format!("expected an object, found {}", type_name(&other)),
                    ));
                }
            }
        }
        JsonShape::Lines => {
            let mut items = Vec::new();
            for (line_no, line) in content.lines().enumerate() {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let item: JsonValue = serde_json::from_str(trimmed).map_err(|e| {
                    DecodeError::parse(path, format!("line {}: {}", line_no + 1, e))
                })?;
                items.push(item);
            }
            records_to_table(path, items)?
        }
    };

    Ok(apply_date_columns(table.normalize_types(), options))
}

fn records_to_table(path: &Path, items: Vec<JsonValue>) -> Result<DataTable, DecodeError> {
    let mut columns: Vec<String> = Vec::new();
    let mut records: Vec<Map<String, JsonValue>> = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match item {
            JsonValue::Object(record) => {
                for key in record.keys() {
                    if !columns.contains(key) {
                        columns.push(key.clone());
                    }
                }
                records.push(record);
            }
            other => {
                return Err(DecodeError::parse(
                    path,
                    format!("record {} is {}, expected an object", index, type_name(&other)),
                ));
            }
        }
    }

    let rows = records
        .into_iter()
        .map(|mut record| {
            columns
                .iter()
                .map(|c| record.remove(c).map(Value::from).unwrap_or(Value::Null))
                .collect::<Vec<_>>()
        })
        .collect();

    DataTable::new(columns, rows).map_err(|e| DecodeError::parse(path, e))
}

fn columns_to_table(path: &Path, object: Map<String, JsonValue>) -> Result<DataTable, DecodeError> {
    let mut columns = Vec::with_capacity(object.len());
    let mut cells: Vec<Vec<Value>> = Vec::with_capacity(object.len());
    for (name, column) in object {
        let values: Vec<Value> = match column {
            JsonValue::Array(values) => values.into_iter().map(Value::from).collect(),
            JsonValue::Object(indexed) => {
                indexed.into_iter().map(|(_, v)| Value::from(v)).collect()
            }
            other => {
                return Err(DecodeError::parse(
                    path,
                    format!(
                        "column '{}' is {}, expected an array or object",
                        name,
                        type_name(&other)
                    ),
                ));
            }
        };
        columns.push(name);
        cells.push(values);
    }

    let height = cells.first().map(Vec::len).unwrap_or(0);
    if let Some((name, column)) = columns.iter().zip(&cells).find(|(_, c)| c.len() != height) {
        return Err(DecodeError::parse(
            path,
            format!("column '{}' has {} values, expected {}", name, column.len(), height),
        ));
    }

    let mut rows: Vec<Vec<Value>> = (0..height)
        .map(|_| Vec::with_capacity(columns.len()))
        .collect();
    for column in cells {
        for (row, value) in rows.iter_mut().zip(column) {
            row.push(value);
        }
    }

    DataTable::new(columns, rows).map_err(|e| DecodeError::parse(path, e))
}

fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NativeType;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_decode_records() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "songs.json",
            r#"[{"id": 1, "title": "a"}, {"id": 2, "title": "b", "year": 1999}]"#,
        );

        let table = decode_json(&path, &DecodeOptions::default()).unwrap();
        assert_eq!(table.columns(), &["id", "title", "year"]);
        assert_eq!(table.rows()[0][2], Value::Null);
        assert_eq!(table.rows()[1][2], Value::Integer(1999));
    }

    #[test]
    fn test_decode_column_object() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "cols.json",
            r#"{"id": {"0": 1, "1": 2}, "duration": {"0": 1.5, "1": 3}}"#,
        );

        let table = decode_json(&path, &DecodeOptions::default()).unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column_type(1), NativeType::Float);
        assert_eq!(table.rows()[1][1], Value::Float(3.0));
    }

    #[test]
    fn test_decode_series() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "song.json",
            r#"{"artist_id": "AR1", "song_id": "SO1", "duration": 218.9}"#,
        );
        let options = DecodeOptions::new().json_shape(JsonShape::Series);

        let table = decode_json(&path, &options).unwrap();
        assert_eq!(table.columns(), &["artist_id", "song_id", "duration"]);
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn test_decode_lines() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "log.json", "{\"a\": 1}\n\n{\"a\": 2}\n");
        let options = DecodeOptions::new().json_shape(JsonShape::Lines);

        let table = decode_json(&path, &options).unwrap();
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn test_decode_malformed_json() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "bad.json", "[{\"a\": ");

        let err = decode_json(&path, &DecodeOptions::default()).unwrap_err();
        assert!(matches!(err, DecodeError::Parse { .. }));
    }

    #[test]
    fn test_decode_scalar_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "scalar.json", "42");

        assert!(decode_json(&path, &DecodeOptions::default()).is_err());
    }
}
