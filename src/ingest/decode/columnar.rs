//! Columnar decoders (Arrow IPC "feather" files and Parquet)
//!
//! Column types are taken from the file schema rather than inferred, so an
//! all-null Integer column still maps to an integer column downstream.

use std::path::Path;

use super::DecodeOptions;
use crate::ingest::error::DecodeError;
use crate::models::DataTable;

#[cfg(feature = "columnar")]
mod arrow_table {
    use arrow::array::{Array, ArrayRef, AsArray};
    use arrow::compute::cast;
    use arrow::datatypes::{
        DataType, Float64Type, Int64Type, SchemaRef, TimeUnit, TimestampMicrosecondType,
    };
    use arrow::error::ArrowError;
    use arrow::record_batch::RecordBatch;
    use arrow::temporal_conversions::timestamp_us_to_datetime;
    use arrow::util::display::array_value_to_string;

    use crate::models::{DataTable, NativeType, Value};

    /// Native type for an Arrow data type
    pub(super) fn native_type(data_type: &DataType) -> NativeType {
        match data_type {
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64 => NativeType::Integer,
            DataType::Float16
            | DataType::Float32
            | DataType::Float64
            | DataType::Decimal128(_, _)
            | DataType::Decimal256(_, _) => NativeType::Float,
            DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => NativeType::Text,
            DataType::Boolean => NativeType::Boolean,
            DataType::Timestamp(_, _) | DataType::Date32 | DataType::Date64 => {
                NativeType::Timestamp
            }
            other => NativeType::Other(other.to_string().to_lowercase()),
        }
    }

    /// Flatten record batches into a table with declared column types
    pub(super) fn batches_to_table(
        schema: &SchemaRef,
        batches: impl IntoIterator<Item = Result<RecordBatch, ArrowError>>,
    ) -> Result<DataTable, String> {
        let columns: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();
        let types: Vec<NativeType> = schema
            .fields()
            .iter()
            .map(|f| native_type(f.data_type()))
            .collect();

        let mut rows: Vec<Vec<Value>> = Vec::new();
        for batch in batches {
            let batch = batch.map_err(|e| e.to_string())?;
            let offset = rows.len();
            rows.extend((0..batch.num_rows()).map(|_| Vec::with_capacity(columns.len())));
            for (array, native) in batch.columns().iter().zip(&types) {
                let values = column_values(array, native).map_err(|e| e.to_string())?;
                for (row, value) in rows[offset..].iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }

        DataTable::new(columns, rows)
            .and_then(|t| t.with_column_types(types))
            .map_err(|e| e.to_string())
    }

    fn column_values(array: &ArrayRef, native: &NativeType) -> Result<Vec<Value>, ArrowError> {
        let len = array.len();
        let values: Vec<Value> = match native {
            NativeType::Integer => {
                let converted = cast(array, &DataType::Int64)?;
                let typed = converted.as_primitive::<Int64Type>();
                (0..len)
                    .map(|i| cell(typed, i, |a| Value::Integer(a.value(i))))
                    .collect()
            }
            NativeType::Float => {
                let converted = cast(array, &DataType::Float64)?;
                let typed = converted.as_primitive::<Float64Type>();
                (0..len)
                    .map(|i| cell(typed, i, |a| Value::Float(a.value(i))))
                    .collect()
            }
            NativeType::Boolean => {
                let typed = array.as_boolean();
                (0..len)
                    .map(|i| cell(typed, i, |a| Value::Boolean(a.value(i))))
                    .collect()
            }
            NativeType::Text => {
                let converted = cast(array, &DataType::Utf8)?;
                let typed = converted.as_string::<i32>();
                (0..len)
                    .map(|i| cell(typed, i, |a| Value::Text(a.value(i).to_string())))
                    .collect()
            }
            NativeType::Timestamp => {
                let converted = cast(array, &DataType::Timestamp(TimeUnit::Microsecond, None))?;
                let typed = converted.as_primitive::<TimestampMicrosecondType>();
                (0..len)
                    .map(|i| {
                        cell(typed, i, |a| {
                            timestamp_us_to_datetime(a.value(i))
                                .map(Value::Timestamp)
                                .unwrap_or(Value::Null)
                        })
                    })
                    .collect()
            }
            NativeType::Other(_) => (0..len)
                .map(|i| {
                    if array.is_null(i) {
                        Ok(Value::Null)
                    } else {
                        array_value_to_string(array, i).map(Value::Text)
                    }
                })
                .collect::<Result<Vec<_>, _>>()?,
        };
        Ok(values)
    }

    fn cell<A: Array>(array: &A, index: usize, read: impl FnOnce(&A) -> Value) -> Value {
        if array.is_null(index) {
            Value::Null
        } else {
            read(array)
        }
    }
}

/// Decode an Arrow IPC file
#[cfg(feature = "columnar")]
pub fn decode_feather(path: &Path, _options: &DecodeOptions) -> Result<DataTable, DecodeError> {
    use arrow::ipc::reader::FileReader;

    let file = std::fs::File::open(path).map_err(|e| DecodeError::io(path, e))?;
    let reader = FileReader::try_new(file, None).map_err(|e| DecodeError::parse(path, e))?;
    let schema = reader.schema();
    arrow_table::batches_to_table(&schema, reader).map_err(|e| DecodeError::parse(path, e))
}

/// Decode a Parquet file
#[cfg(feature = "columnar")]
pub fn decode_parquet(path: &Path, _options: &DecodeOptions) -> Result<DataTable, DecodeError> {
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    let file = std::fs::File::open(path).map_err(|e| DecodeError::io(path, e))?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| DecodeError::parse(path, e))?;
    let schema = builder.schema().clone();
    let reader = builder.build().map_err(|e| DecodeError::parse(path, e))?;
    arrow_table::batches_to_table(&schema, reader).map_err(|e| DecodeError::parse(path, e))
}

#[cfg(not(feature = "columnar"))]
pub fn decode_feather(path: &Path, _options: &DecodeOptions) -> Result<DataTable, DecodeError> {
    Err(DecodeError::parse(
        path,
        "feather support is not enabled (build with the 'columnar' feature)",
    ))
}

#[cfg(not(feature = "columnar"))]
pub fn decode_parquet(path: &Path, _options: &DecodeOptions) -> Result<DataTable, DecodeError> {
    Err(DecodeError::parse(
        path,
        "parquet support is not enabled (build with the 'columnar' feature)",
    ))
}

#[cfg(all(test, feature = "columnar"))]
mod tests {
    use super::*;
    use crate::models::{NativeType, Value};
    use arrow::array::{ArrayRef, Float64Array, Int32Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn sample_batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int32, false),
            Field::new("name", DataType::Utf8, true),
            Field::new("score", DataType::Float64, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int32Array::from(vec![1, 2])) as ArrayRef,
                Arc::new(StringArray::from(vec![Some("a"), None])) as ArrayRef,
                Arc::new(Float64Array::from(vec![None, Some(2.5)])) as ArrayRef,
            ],
        )
        .unwrap()
    }

    fn assert_sample(table: &DataTable) {
        assert_eq!(table.columns(), &["id", "name", "score"]);
        assert_eq!(
            table.declared_types().unwrap(),
            &[NativeType::Integer, NativeType::Text, NativeType::Float]
        );
        assert_eq!(
            table.rows(),
            &[
                vec![Value::Integer(1), Value::from("a"), Value::Null],
                vec![Value::Integer(2), Value::Null, Value::Float(2.5)],
            ]
        );
    }

    #[test]
    fn test_decode_feather() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("songs.feather");
        let batch = sample_batch();
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = arrow::ipc::writer::FileWriter::try_new(file, &batch.schema()).unwrap();
        writer.write(&batch).unwrap();
        writer.finish().unwrap();

        let table = decode_feather(&path, &DecodeOptions::default()).unwrap();
        assert_sample(&table);
    }

    #[test]
    fn test_decode_parquet() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("songs.parquet");
        let batch = sample_batch();
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = parquet::arrow::ArrowWriter::try_new(file, batch.schema(), None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let table = decode_parquet(&path, &DecodeOptions::default()).unwrap();
        assert_sample(&table);
    }

    #[test]
    fn test_decode_parquet_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.parquet");
        std::fs::write(&path, b"definitely not parquet").unwrap();

        let err = decode_parquet(&path, &DecodeOptions::default()).unwrap_err();
        assert!(matches!(err, DecodeError::Parse { .. }));
    }

    #[test]
    fn test_native_type_mapping() {
        assert_eq!(arrow_table::native_type(&DataType::UInt16), NativeType::Integer);
        assert_eq!(arrow_table::native_type(&DataType::Date32), NativeType::Timestamp);
        assert!(matches!(
            arrow_table::native_type(&DataType::Binary),
            NativeType::Other(_)
        ));
    }
}
