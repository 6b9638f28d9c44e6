//! End-to-end tests: files on disk through ingestion, projection, schema
//! derivation and loading against the in-memory backend

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use data_bulk_loader::database::{BulkLoader, CopyCommand, MemoryBackend};
use data_bulk_loader::ingest::{DecodeOptions, IngestError, JsonShape};
use data_bulk_loader::models::{
    ColumnOverride, ColumnOverrides, DataTable, NativeType, SqlType, Value,
};
use data_bulk_loader::{DataModel, SchemaMapper};
use tempfile::TempDir;

fn write(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

fn row_set(table: &DataTable) -> HashSet<Vec<Value>> {
    table.rows().iter().cloned().collect()
}

mod ingestion_tests {
    use super::*;

    #[test]
    fn test_csv_directory_skips_empty_file() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "file1.csv", "id,name\n1,a\n");
        write(dir.path(), "file2.csv", "");
        write(dir.path(), "file3.csv", "id,name\n2,b\n");

        let model = DataModel::builder()
            .path(dir.path())
            .format("csv")
            .workers(2)
            .build()
            .unwrap();

        assert_eq!(model.columns(), &["id".to_string(), "name".to_string()]);
        let expected: HashSet<Vec<Value>> = [
            vec![Value::Integer(1), Value::from("a")],
            vec![Value::Integer(2), Value::from("b")],
        ]
        .into_iter()
        .collect();
        assert_eq!(row_set(model.table()), expected);
        assert_eq!(model.report().files_attempted, 3);
        assert_eq!(model.report().files_kept, 2);
    }

    #[test]
    fn test_only_empty_header_is_no_valid_headers() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "empty.csv", "");

        let err = DataModel::builder()
            .path(dir.path().join("empty.csv"))
            .format("csv")
            .build()
            .unwrap_err();
        assert!(matches!(err, IngestError::NoValidHeaders));
    }

    #[test]
    fn test_header_only_csv_does_not_change_types() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.csv", "id,year\n1,1999\n");
        write(dir.path(), "b.csv", "id,year\n");
        write(dir.path(), "c.csv", "id,year\n2,2004\n");

        let model = DataModel::builder()
            .path(dir.path())
            .format("csv")
            .build()
            .unwrap();

        let specs = SchemaMapper::derive(model.table(), &ColumnOverrides::new());
        assert_eq!(specs[0].sql_type, SqlType::Integer);
        assert_eq!(specs[1].sql_type, SqlType::Integer);
        assert!(model.table().rows().contains(&vec![Value::Integer(2), Value::Integer(2004)]));
    }

    #[test]
    fn test_several_directories_are_searched() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write(first.path(), "a.csv", "id,name\n1,a\n");
        write(second.path(), "b.csv", "id,name\n2,b\n");

        let model = DataModel::builder()
            .paths([first.path(), second.path()])
            .format("csv")
            .build()
            .unwrap();

        assert_eq!(model.table().row_count(), 2);
        assert!(model.report().failures.is_empty());
    }

    #[test]
    fn test_broken_file_is_isolated() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.json", r#"[{"id": 1, "name": "a"}]"#);
        write(dir.path(), "b.json", "{ not json");
        write(dir.path(), "c.json", r#"[{"id": 3, "name": "c"}]"#);

        let model = DataModel::builder()
            .path(dir.path())
            .format(".JSON")
            .build()
            .unwrap();

        assert_eq!(model.table().row_count(), 2);
        let report = model.report();
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].path.ends_with("b.json"));
    }

    #[test]
    fn test_series_json_one_row_per_file() {
        let dir = TempDir::new().unwrap();
        for (i, title) in ["Intro", "Outro", "Interlude"].iter().enumerate() {
            write(
                dir.path(),
                &format!("song_{}.json", i),
                &format!(
                    r#"{{"song_id": "SO{}", "title": "{}", "year": {}, "duration": 201.5}}"#,
                    i,
                    title,
                    1990 + i
                ),
            );
        }

        let model = DataModel::builder()
            .path(dir.path())
            .format("json")
            .decode_options(DecodeOptions::new().json_shape(JsonShape::Series))
            .build()
            .unwrap();

        let table = model.table();
        assert_eq!(table.row_count(), 3);
        let year = table.column_index("year").unwrap();
        let duration = table.column_index("duration").unwrap();
        assert_eq!(table.column_type(year), NativeType::Integer);
        assert_eq!(table.column_type(duration), NativeType::Float);
    }
}

mod projection_tests {
    use super::*;

    fn table() -> DataTable {
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
    fn test_project_removes_duplicates() {
        let model = DataModel::builder().table(table()).build().unwrap();
        let ids = model.project(&["id"]).unwrap();

        assert_eq!(ids.rows(), &[vec![Value::Integer(1)], vec![Value::Integer(2)]]);
    }

    #[test]
    fn test_project_is_repeatable() {
        let model = DataModel::builder().table(table()).build().unwrap();
        let first = model.project(&["name", "id"]).unwrap();
        let second = model.project(&["name", "id"]).unwrap();
        assert_eq!(row_set(&first), row_set(&second));
        assert_eq!(first.row_count(), 2);
    }
}

mod schema_tests {
    use super::*;

    #[test]
    fn test_int64_column_maps_to_integer() {
        let table = DataTable::new(vec!["plays".to_string()], vec![vec![Value::Null]])
            .unwrap()
            .with_column_types(vec![NativeType::from_name("int64")])
            .unwrap();

        let specs = SchemaMapper::derive(&table, &ColumnOverrides::new());
        assert_eq!(specs[0].sql_type, SqlType::Integer);
        assert_eq!(specs[0].nullable, None);

        let mut overrides = ColumnOverrides::new();
        overrides.insert("plays".to_string(), ColumnOverride::new().nullable(true));
        let specs = SchemaMapper::derive(&table, &overrides);
        assert_eq!(specs[0].sql_type, SqlType::Integer);
        assert_eq!(specs[0].nullable, Some(true));
    }
}

mod loader_tests {
    use super::*;

    fn songs_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "part-0.csv",
            "song_id,title,year\nSO1,Hash # Tag,1999\nSO2,Plain,2004\n",
        );
        write(dir.path(), "part-1.csv", "song_id,title,year\nSO3,Other,\n");
        dir
    }

    #[tokio::test]
    async fn test_ensure_table_is_idempotent() {
        let loader = BulkLoader::new(Box::new(MemoryBackend::new()), CopyCommand::new("true"));
        let model = DataModel::builder()
            .path(songs_dir().path())
            .format("csv")
            .build()
            .unwrap();
        let specs = SchemaMapper::derive(model.table(), &ColumnOverrides::new());

        assert!(loader.ensure_table("songs", &specs).await.unwrap());
        assert!(!loader.ensure_table("songs", &specs).await.unwrap());
        assert!(loader.backend().table_exists("songs").await.unwrap());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_load_streams_text_format() {
        let data = songs_dir();
        let out_dir = TempDir::new().unwrap();
        let out = out_dir.path().join("copy.sql");
        let command = CopyCommand::new("sh")
            .args(["-c", "cat > \"$0\""])
            .arg(out.as_os_str());
        let loader = BulkLoader::new(Box::new(MemoryBackend::new()), command);

        let model = DataModel::builder()
            .path(data.path())
            .format("csv")
            .workers(1)
            .build()
            .unwrap();
        let mut overrides = ColumnOverrides::new();
        overrides.insert(
            "song_id".to_string(),
            ColumnOverride::new().primary_key(true).nullable(false),
        );

        let report = loader
            .load("songs", model.table(), &overrides, None)
            .await
            .unwrap();
        assert!(report.created);
        assert_eq!(report.copy.rows_written, 3);
        assert_eq!(report.copy.delimiter, '#');

        let script = fs::read_to_string(&out).unwrap();
        assert!(script.starts_with("COPY \"songs\" FROM STDIN DELIMITER '#';\n"));
        assert!(script.contains("SO1#Hash   Tag#1999\n"));
        assert!(script.contains("SO3#Other#\\N\n"));
        assert!(script.ends_with("\\.\n"));
    }
}
