//! In-memory table model

use serde::Serialize;
use std::collections::HashSet;

use super::value::{NativeType, Value};

/// Error raised by table construction and projection
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TableError {
    #[error("Unknown column: {0}")]
    UnknownColumn(String),
    #[error("Row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Declared {found} column types for {expected} columns")]
    TypeCountMismatch { expected: usize, found: usize },
}

/// A rectangular table of typed cells
///
/// Every row holds exactly one cell per column. Decoders may also declare a
/// native storage type per column (Arrow and Parquet schemas do); when no
/// type is declared the schema mapper looks at the first non-null value.
///
/// # Example
///
/// ```rust
/// use data_bulk_loader::models::{DataTable, Value};
///
/// let table = DataTable::new(
///     vec!["id".to_string(), "name".to_string()],
///     vec![vec![Value::Integer(1), Value::from("a")]],
/// )
/// .unwrap();
/// assert_eq!(table.row_count(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    column_types: Option<Vec<NativeType>>,
}

impl DataTable {
    /// Create a table, checking that every row matches the header width
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, TableError> {
        for (index, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(TableError::RaggedRow {
                    row: index,
                    expected: columns.len(),
                    found: row.len(),
                });
            }
        }
        Ok(Self {
            columns,
            rows,
            column_types: None,
        })
    }

    /// Create a table with no columns and no rows
    pub fn empty() -> Self {
        Self::default()
    }

    /// Attach declared native types, one per column
    pub fn with_column_types(mut self, types: Vec<NativeType>) -> Result<Self, TableError> {
        if types.len() != self.columns.len() {
            return Err(TableError::TypeCountMismatch {
                expected: self.columns.len(),
                found: types.len(),
            });
        }
        self.column_types = Some(types);
        Ok(self)
    }

    /// Column names in order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows in order
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Declared column types, if the producer supplied them
    pub fn declared_types(&self) -> Option<&[NativeType]> {
        self.column_types.as_deref()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Whether the table has no header
    pub fn has_headers(&self) -> bool {
        !self.columns.is_empty()
    }

    /// Position of a column by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Native type of a column
    ///
    /// The declared type wins; otherwise the type of the first non-null value.
    /// A column with no declared type and only nulls reports `Other("null")`.
    pub fn column_type(&self, index: usize) -> NativeType {
        if let Some(types) = &self.column_types
            && let Some(declared) = types.get(index)
        {
            return declared.clone();
        }
        self.rows
            .iter()
            .filter_map(|row| row.get(index))
            .find_map(Value::native_type)
            .unwrap_or_else(|| NativeType::Other("null".to_string()))
    }

    /// Split the table into its header and rows
    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<Value>>, Option<Vec<NativeType>>) {
        (self.columns, self.rows, self.column_types)
    }

    /// Select a subset of columns and remove duplicate rows
    ///
    /// The first occurrence of each distinct projected row is kept, in the
    /// original order. The source table is left untouched.
    pub fn project<S: AsRef<str>>(&self, columns: &[S]) -> Result<DataTable, TableError> {
        let indices = columns
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.column_index(name)
                    .ok_or_else(|| TableError::UnknownColumn(name.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut seen: HashSet<Vec<Value>> = HashSet::with_capacity(self.rows.len());
        let mut rows = Vec::new();
        for row in &self.rows {
            let projected: Vec<Value> = indices.iter().map(|&i| row[i].clone()).collect();
            if seen.insert(projected.clone()) {
                rows.push(projected);
            }
        }

        Ok(DataTable {
            columns: indices.iter().map(|&i| self.columns[i].clone()).collect(),
            rows,
            column_types: self
                .column_types
                .as_ref()
                .map(|types| indices.iter().map(|&i| types[i].clone()).collect()),
        })
    }

    /// Unify each column to a single native type and coerce its cells
    ///
    /// Decoders producing loosely typed values (JSON, spreadsheets) call this
    /// so that a column holding `1` and `2.5` becomes a Float column, and one
    /// mixing numbers with words becomes Text. Declared types are replaced.
    pub fn normalize_types(mut self) -> Self {
        let width = self.columns.len();
        let mut types: Vec<Option<NativeType>> = vec![None; width];
        for row in &self.rows {
            for (slot, value) in types.iter_mut().zip(row) {
                if let Some(observed) = value.native_type() {
                    *slot = Some(match slot.take() {
                        Some(prev) => prev.unify(&observed),
                        None => observed,
                    });
                }
            }
        }

        let resolved: Vec<NativeType> = types
            .into_iter()
            .map(|t| t.unwrap_or(NativeType::Text))
            .collect();
        for row in &mut self.rows {
            for (cell, target) in row.iter_mut().zip(&resolved) {
                let value = std::mem::replace(cell, Value::Null);
                *cell = value.coerce_to(target);
            }
        }
        self.column_types = Some(resolved);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataTable {
        DataTable::new(
            vec!["id".to_string(), "name".to_string()],
            vec![
                vec![Value::Integer(1), Value::from("a")],
                vec![Value::Integer(1), Value::from("a")],
                vec![Value::Integer(2), Value::from("b")],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_ragged_rows() {
        let result = DataTable::new(
            vec!["a".to_string(), "b".to_string()],
            vec![vec![Value::Integer(1)]],
        );
        assert_eq!(
            result.unwrap_err(),
            TableError::RaggedRow {
                row: 0,
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_project_removes_duplicates() {
        let projected = sample().project(&["id"]).unwrap();
        assert_eq!(projected.columns(), &["id".to_string()]);
        assert_eq!(
            projected.rows(),
            &[vec![Value::Integer(1)], vec![Value::Integer(2)]]
        );
    }

    #[test]
    fn test_project_is_repeatable() {
        let table = sample();
        let first = table.project(&["name", "id"]).unwrap();
        let second = table.project(&["name", "id"]).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.row_count(), 2);
        assert_eq!(table.row_count(), 3);
    }

    #[test]
    fn test_project_unknown_column() {
        let err = sample().project(&["missing"]).unwrap_err();
        assert_eq!(err, TableError::UnknownColumn("missing".to_string()));
    }

    #[test]
    fn test_column_type_prefers_declared() {
        let table = sample()
            .with_column_types(vec![NativeType::Float, NativeType::Text])
            .unwrap();
        assert_eq!(table.column_type(0), NativeType::Float);
    }

    #[test]
    fn test_column_type_skips_nulls() {
        let table = DataTable::new(
            vec!["x".to_string()],
            vec![vec![Value::Null], vec![Value::Float(f64::NAN)], vec![Value::Integer(3)]],
        )
        .unwrap();
        assert_eq!(table.column_type(0), NativeType::Integer);
    }

    #[test]
    fn test_normalize_types_widens_and_falls_back() {
        let table = DataTable::new(
            vec!["n".to_string(), "mixed".to_string()],
            vec![
                vec![Value::Integer(1), Value::Integer(1)],
                vec![Value::Float(2.5), Value::from("two")],
            ],
        )
        .unwrap()
        .normalize_types();

        assert_eq!(
            table.declared_types().unwrap(),
            &[NativeType::Float, NativeType::Text]
        );
        assert_eq!(table.rows()[0][0], Value::Float(1.0));
        assert_eq!(table.rows()[0][1], Value::Text("1".to_string()));
    }
}
