//! Header reconciliation across decoded files

use tracing::{debug, info};

use super::error::IngestError;
use super::parallel::{DecodedFile, IngestReport};
use crate::models::{DataTable, NativeType, Value};

/// Merges per-file tables that agree on the reference header
///
/// The reference header is the first non-empty header in scan order. Files
/// with a different header (names or order) are excluded, and the rows of the
/// remaining files are concatenated in scan order.
pub struct TableReconciler;

impl TableReconciler {
    /// Reconcile decoded files into a single table
    pub fn reconcile(results: Vec<DecodedFile>) -> Result<DataTable, IngestError> {
        Self::reconcile_with_report(results, &mut IngestReport::new())
    }

    /// Reconcile and record kept/excluded counts in `report`
    pub fn reconcile_with_report(
        results: Vec<DecodedFile>,
        report: &mut IngestReport,
    ) -> Result<DataTable, IngestError> {
        let reference: Vec<String> = results
            .iter()
            .find(|r| r.table.has_headers())
            .map(|r| r.columns().to_vec())
            .ok_or(IngestError::NoValidHeaders)?;

        let width = reference.len();
        let mut types: Vec<Option<NativeType>> = vec![None; width];
        let mut fallback: Option<Vec<NativeType>> = None;
        let mut rows = Vec::new();
        let mut kept = 0;
        let mut excluded = 0;

        for file in results {
            if file.columns() != reference.as_slice() {
                if file.table.has_headers() {
                    excluded += 1;
                    debug!(
                        path = %file.path.display(),
                        columns = ?file.columns(),
                        "Excluding file whose header differs from the reference header"
                    );
                }
                continue;
            }
            if fallback.is_none() {
                fallback = file.table.declared_types().map(<[NativeType]>::to_vec);
            }
            for (index, slot) in types.iter_mut().enumerate() {
                if let Some(observed) = observed_type(&file.table, index) {
                    *slot = Some(match slot.take() {
                        Some(prev) => prev.unify(&observed),
                        None => observed,
                    });
                }
            }
            let (_, file_rows, _) = file.table.into_parts();
            rows.extend(file_rows);
            kept += 1;
        }

        // Columns with no cell evidence keep the first declared type, if any.
        let types: Vec<NativeType> = types
            .into_iter()
            .enumerate()
            .map(|(index, t)| {
                t.or_else(|| fallback.as_ref().and_then(|f| f.get(index).cloned()))
                    .unwrap_or_else(|| NativeType::Other("null".to_string()))
            })
            .collect();
        let table = DataTable::new(reference, rows)?;
        let table = coerce_columns(table, &types).with_column_types(types)?;

        report.files_kept = kept;
        report.files_excluded = excluded;
        report.rows_ingested = table.row_count();
        info!(
            files = kept,
            excluded,
            rows = table.row_count(),
            "Reconciled decoded files"
        );
        Ok(table)
    }
}

/// Type a file contributes for a column: declared, else observed from values
///
/// A column with no non-null cell (including a file with no rows) contributes
/// nothing, so a sparse or empty extract does not widen the column to text.
fn observed_type(table: &DataTable, index: usize) -> Option<NativeType> {
    let all_null = table
        .rows()
        .iter()
        .all(|row| row.get(index).is_none_or(Value::is_null));
    if all_null {
        return None;
    }
    if let Some(types) = table.declared_types() {
        return types.get(index).cloned();
    }
    table
        .rows()
        .iter()
        .filter_map(|row| row.get(index))
        .find_map(|value| value.native_type())
}

/// Coerce cells of widened columns so every cell matches its column type
fn coerce_columns(table: DataTable, types: &[NativeType]) -> DataTable {
    let (columns, mut rows, _) = table.into_parts();
    for row in &mut rows {
        for (cell, target) in row.iter_mut().zip(types) {
            if matches!(target, NativeType::Float | NativeType::Text) {
                let value = std::mem::replace(cell, Value::Null);
                *cell = value.coerce_to(target);
            }
        }
    }
    // Row widths are unchanged, so the rebuilt table is still rectangular.
    DataTable::new(columns, rows).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Value;
    use std::path::PathBuf;

    fn file(name: &str, columns: &[&str], rows: Vec<Vec<Value>>) -> DecodedFile {
        DecodedFile {
            path: PathBuf::from(name),
            table: DataTable::new(columns.iter().map(|c| c.to_string()).collect(), rows).unwrap(),
        }
    }

    #[test]
    fn test_reconcile_concatenates_matching_files() {
        let results = vec![
            file(
                "f1",
                &["a", "b"],
                vec![
                    vec![Value::Integer(1), Value::from("x")],
                    vec![Value::Integer(2), Value::from("y")],
                ],
            ),
            file("f2", &["a", "b"], vec![vec![Value::Integer(3), Value::from("z")]]),
        ];
        let table = TableReconciler::reconcile(results).unwrap();
        assert_eq!(table.columns(), &["a", "b"]);
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.rows()[2], vec![Value::Integer(3), Value::from("z")]);
    }

    #[test]
    fn test_mismatched_headers_are_excluded() {
        let results = vec![
            file(
                "f1",
                &["a", "b"],
                vec![
                    vec![Value::Integer(1), Value::Integer(2)],
                    vec![Value::Integer(3), Value::Integer(4)],
                ],
            ),
            file("f2", &["a", "c"], vec![vec![Value::Integer(5), Value::Integer(6)]; 5]),
            file("f3", &["b", "a"], vec![vec![Value::Integer(7), Value::Integer(8)]]),
        ];
        let mut report = IngestReport::new();
        let table = TableReconciler::reconcile_with_report(results, &mut report).unwrap();
        assert_eq!(table.columns(), &["a", "b"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(report.files_kept, 1);
        assert_eq!(report.files_excluded, 2);
    }

    #[test]
    fn test_empty_headers_are_skipped_for_reference() {
        let results = vec![
            DecodedFile {
                path: PathBuf::from("empty"),
                table: DataTable::empty(),
            },
            file("f1", &["a"], vec![vec![Value::Integer(1)]]),
        ];
        let table = TableReconciler::reconcile(results).unwrap();
        assert_eq!(table.columns(), &["a"]);
    }

    #[test]
    fn test_no_results_is_an_error() {
        let err = TableReconciler::reconcile(Vec::new()).unwrap_err();
        assert!(matches!(err, IngestError::NoValidHeaders));

        let only_empty = vec![DecodedFile {
            path: PathBuf::from("empty"),
            table: DataTable::empty(),
        }];
        assert!(matches!(
            TableReconciler::reconcile(only_empty).unwrap_err(),
            IngestError::NoValidHeaders
        ));
    }

    #[test]
    fn test_types_are_unified_across_files() {
        let results = vec![
            file("f1", &["n", "s"], vec![vec![Value::Integer(1), Value::from("x")]]),
            file("f2", &["n", "s"], vec![vec![Value::Float(2.5), Value::Integer(7)]]),
        ];
        let table = TableReconciler::reconcile(results).unwrap();
        assert_eq!(table.declared_types().unwrap(), &[NativeType::Float, NativeType::Text]);
        assert_eq!(table.rows()[0][0], Value::Float(1.0));
        assert_eq!(table.rows()[1][1], Value::from("7"));
    }

    #[test]
    fn test_all_null_column_does_not_widen_type() {
        let sparse = DataTable::new(vec!["year".to_string()], vec![vec![Value::Null]])
            .unwrap()
            .with_column_types(vec![NativeType::Text])
            .unwrap();
        let results = vec![
            file("f1", &["year"], vec![vec![Value::Integer(1999)]]),
            DecodedFile {
                path: PathBuf::from("f2"),
                table: sparse,
            },
        ];
        let table = TableReconciler::reconcile(results).unwrap();
        assert_eq!(table.declared_types().unwrap(), &[NativeType::Integer]);
        assert_eq!(table.rows()[1][0], Value::Null);
    }

    #[test]
    fn test_header_only_file_keeps_numeric_types() {
        let header_only = DataTable::new(vec!["id".to_string(), "year".to_string()], Vec::new())
            .unwrap()
            .with_column_types(vec![NativeType::Text, NativeType::Text])
            .unwrap();
        let results = vec![
            file("f1", &["id", "year"], vec![vec![Value::Integer(1), Value::Integer(1999)]]),
            DecodedFile {
                path: PathBuf::from("f2"),
                table: header_only,
            },
            file("f3", &["id", "year"], vec![vec![Value::Integer(2), Value::Integer(2004)]]),
        ];
        let table = TableReconciler::reconcile(results).unwrap();
        assert_eq!(table.declared_types().unwrap(), &[NativeType::Integer, NativeType::Integer]);
        assert_eq!(table.rows()[1], vec![Value::Integer(2), Value::Integer(2004)]);
    }

    #[test]
    fn test_lone_header_only_file_keeps_declared_types() {
        let header_only = DataTable::new(vec!["n".to_string()], Vec::new())
            .unwrap()
            .with_column_types(vec![NativeType::Integer])
            .unwrap();
        let results = vec![DecodedFile {
            path: PathBuf::from("f1"),
            table: header_only,
        }];
        let table = TableReconciler::reconcile(results).unwrap();
        assert_eq!(table.declared_types().unwrap(), &[NativeType::Integer]);
        assert_eq!(table.row_count(), 0);
    }
}
