//! File decoders
//!
//! Each decoder turns one file into a [`DataTable`]. Decoders are plain
//! functions bound to a [`DecodeOptions`] value; any closure with the same
//! signature can be used in their place.

pub mod columnar;
pub mod csv;
pub mod excel;
pub mod json;

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use super::error::DecodeError;
use crate::models::DataTable;

/// Decode capability: one file in, one table out
pub type Decoder = Arc<dyn Fn(&Path) -> Result<DataTable, DecodeError> + Send + Sync>;

/// How a JSON file is laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonShape {
    /// An array of record objects, or an object of column arrays
    #[default]
    Table,
    /// A single object per file, read as one row keyed by its fields
    Series,
    /// Newline-delimited record objects
    Lines,
}

impl std::str::FromStr for JsonShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" | "frame" | "records" => Ok(JsonShape::Table),
            "series" => Ok(JsonShape::Series),
            "lines" | "jsonl" | "ndjson" => Ok(JsonShape::Lines),
            _ => Err(format!(
                "Unknown JSON shape: {}. Use 'table', 'series' or 'lines'.",
                s
            )),
        }
    }
}

/// Decode-time options, applied identically to every file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodeOptions {
    /// CSV field delimiter
    #[serde(default = "default_csv_delimiter")]
    pub csv_delimiter: u8,
    /// Whether the first CSV record is a header
    #[serde(default = "default_true")]
    pub csv_has_headers: bool,
    /// JSON layout
    #[serde(default)]
    pub json_shape: JsonShape,
    /// Worksheet to read from spreadsheets (first sheet when unset)
    #[serde(default)]
    pub sheet: Option<String>,
    /// Columns whose text cells should be parsed as timestamps
    #[serde(default)]
    pub parse_dates: Vec<String>,
}

fn default_csv_delimiter() -> u8 {
    b','
}

fn default_true() -> bool {
    true
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            csv_delimiter: default_csv_delimiter(),
            csv_has_headers: true,
            json_shape: JsonShape::default(),
            sheet: None,
            parse_dates: Vec::new(),
        }
    }
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn csv_delimiter(mut self, delimiter: u8) -> Self {
        self.csv_delimiter = delimiter;
        self
    }

    pub fn csv_has_headers(mut self, has_headers: bool) -> Self {
        self.csv_has_headers = has_headers;
        self
    }

    pub fn json_shape(mut self, shape: JsonShape) -> Self {
        self.json_shape = shape;
        self
    }

    pub fn sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    pub fn parse_dates<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parse_dates = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the named column should be parsed as timestamps
    pub fn is_date_column(&self, column: &str) -> bool {
        self.parse_dates.iter().any(|c| c == column)
    }
}

/// Wrap a closure as a [`Decoder`]
pub fn decoder_fn<F>(f: F) -> Decoder
where
    F: Fn(&Path) -> Result<DataTable, DecodeError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Parse date columns listed in the options
///
/// Text cells in those columns that look like timestamps are converted;
/// the column's declared type becomes Timestamp when every non-null cell
/// converted.
pub(crate) fn apply_date_columns(table: DataTable, options: &DecodeOptions) -> DataTable {
    use crate::models::{NativeType, Value};

    if options.parse_dates.is_empty() {
        return table;
    }
    let targets: Vec<usize> = table
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, name)| options.is_date_column(name))
        .map(|(i, _)| i)
        .collect();
    if targets.is_empty() {
        return table;
    }

    let width = table.column_count();
    let mut types: Vec<NativeType> = (0..width).map(|i| table.column_type(i)).collect();
    let (columns, mut rows, _) = table.into_parts();
    for &index in &targets {
        let all_parse = rows.iter().all(|row| match &row[index] {
            Value::Text(raw) => Value::parse_timestamp(raw).is_some(),
            Value::Timestamp(_) => true,
            other => other.is_null(),
        });
        if !all_parse {
            tracing::debug!(
                column = %columns[index],
                "Column listed in parse_dates holds non-timestamp values, keeping it as is"
            );
            continue;
        }
        for row in &mut rows {
            if let Value::Text(raw) = &row[index]
                && let Some(ts) = Value::parse_timestamp(raw)
            {
                row[index] = Value::Timestamp(ts);
            }
        }
        types[index] = NativeType::Timestamp;
    }

    // Rows come from an already rectangular table, so rebuilding cannot fail.
    match DataTable::new(columns, rows).and_then(|t| t.with_column_types(types)) {
        Ok(table) => table,
        Err(_) => DataTable::empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NativeType, Value};

    #[test]
    fn test_json_shape_from_str() {
        assert_eq!("series".parse::<JsonShape>().unwrap(), JsonShape::Series);
        assert_eq!("JSONL".parse::<JsonShape>().unwrap(), JsonShape::Lines);
        assert!("xml".parse::<JsonShape>().is_err());
    }

    #[test]
    fn test_apply_date_columns() {
        let table = DataTable::new(
            vec!["at".to_string(), "label".to_string()],
            vec![
                vec![Value::from("2024-01-15 10:00:00"), Value::from("a")],
                vec![Value::Null, Value::from("b")],
            ],
        )
        .unwrap();
        let options = DecodeOptions::new().parse_dates(["at"]);
        let parsed = apply_date_columns(table, &options);
        assert_eq!(parsed.column_type(0), NativeType::Timestamp);
        assert!(matches!(parsed.rows()[0][0], Value::Timestamp(_)));
        assert_eq!(parsed.column_type(1), NativeType::Text);
    }

    #[test]
    fn test_apply_date_columns_falls_back_to_text() {
        let table = DataTable::new(
            vec!["at".to_string()],
            vec![vec![Value::from("2024-01-15")], vec![Value::from("soon")]],
        )
        .unwrap();
        let parsed = apply_date_columns(table, &DecodeOptions::new().parse_dates(["at"]));
        assert_eq!(parsed.column_type(0), NativeType::Text);
        assert!(parsed.rows().iter().all(|r| matches!(r[0], Value::Text(_))));
    }
}
