//! In-memory catalog backend
//!
//! Keeps created table schemas in a map. Used for dry runs and tests; it
//! stores no row data.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{DatabaseBackend, DatabaseError, DatabaseResult};
use crate::schema::TableSchema;

#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: Mutex<HashMap<String, TableSchema>>,
    reject_creates: Option<String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an existing table
    pub fn with_table(self, schema: TableSchema) -> Self {
        if let Ok(mut tables) = self.tables.lock() {
            tables.insert(schema.name.clone(), schema);
        }
        self
    }

    /// Make every `create_table` fail with `message`
    pub fn rejecting_creates(mut self, message: impl Into<String>) -> Self {
        self.reject_creates = Some(message.into());
        self
    }

    /// Schema of a table created or registered earlier
    pub fn table(&self, name: &str) -> Option<TableSchema> {
        self.tables.lock().ok()?.get(name).cloned()
    }

    fn lock(&self) -> DatabaseResult<std::sync::MutexGuard<'_, HashMap<String, TableSchema>>> {
        self.tables
            .lock()
            .map_err(|_| DatabaseError::QueryFailed("catalog lock poisoned".to_string()))
    }
}

#[async_trait(?Send)]
impl DatabaseBackend for MemoryBackend {
    async fn table_exists(&self, name: &str) -> DatabaseResult<bool> {
        Ok(self.lock()?.contains_key(name))
    }

    async fn create_table(&self, schema: &TableSchema) -> DatabaseResult<()> {
        schema.validate()?;
        if let Some(message) = &self.reject_creates {
            return Err(DatabaseError::TableCreationFailed {
                table: schema.name.clone(),
                message: message.clone(),
            });
        }
        self.lock()?
            .entry(schema.name.clone())
            .or_insert_with(|| schema.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColumnSpec, SqlType};

    #[tokio::test]
    async fn test_create_then_exists() {
        let backend = MemoryBackend::new();
        assert!(!backend.table_exists("songs").await.unwrap());

        let schema = TableSchema::new("songs", vec![ColumnSpec::new("id", SqlType::Text)]);
        backend.create_table(&schema).await.unwrap();
        assert!(backend.table_exists("songs").await.unwrap());
        assert_eq!(backend.table("songs"), Some(schema));
    }

    #[tokio::test]
    async fn test_rejecting_backend() {
        let backend = MemoryBackend::new().rejecting_creates("permission denied");
        let schema = TableSchema::new("songs", vec![ColumnSpec::new("id", SqlType::Text)]);
        let err = backend.create_table(&schema).await.unwrap_err();
        assert!(matches!(err, DatabaseError::TableCreationFailed { .. }));
    }
}
