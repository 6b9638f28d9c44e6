//! PostgreSQL database backend implementation
//!
//! Answers the catalog questions a load needs over a `tokio-postgres`
//! connection. Row data is not sent over this connection; see
//! [`CopySession`](super::CopySession).

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use super::config::mask_password;
use super::{DatabaseBackend, DatabaseError, DatabaseResult};
use crate::schema::{TableSchema, quote_qualified_name};

/// PostgreSQL database backend
pub struct PostgresBackend {
    /// PostgreSQL client (wrapped for async access)
    client: Arc<Mutex<tokio_postgres::Client>>,
}

impl PostgresBackend {
    /// Connect to PostgreSQL
    ///
    /// The connection task is spawned on the current tokio runtime.
    pub async fn new(connection_string: &str) -> DatabaseResult<Self> {
        let (client, connection) =
            tokio_postgres::connect(connection_string, tokio_postgres::NoTls)
                .await
                .map_err(|e| {
                    DatabaseError::ConnectionFailed(format!(
                        "Failed to connect to PostgreSQL at {}: {}",
                        mask_password(connection_string),
                        e
                    ))
                })?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("PostgreSQL connection error: {}", e);
            }
        });

        info!(url = %mask_password(connection_string), "Connected to PostgreSQL");
        Ok(Self {
            client: Arc::new(Mutex::new(client)),
        })
    }
}

#[async_trait(?Send)]
impl DatabaseBackend for PostgresBackend {
    async fn table_exists(&self, name: &str) -> DatabaseResult<bool> {
        let client = self.client.lock().await;
        // to_regclass resolves the quoted name the same way CREATE TABLE does
        let qualified = quote_qualified_name(name);
        let row = client
            .query_one("SELECT to_regclass($1) IS NOT NULL", &[&qualified])
            .await
            .map_err(|e| DatabaseError::QueryFailed(format!("Failed to look up table: {}", e)))?;
        let exists: bool = row
            .try_get(0)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        debug!(table = %name, exists, "Checked table existence");
        Ok(exists)
    }

    async fn create_table(&self, schema: &TableSchema) -> DatabaseResult<()> {
        let sql = schema.create_table_sql()?;
        let client = self.client.lock().await;
        client
            .batch_execute(&sql)
            .await
            .map_err(|e| DatabaseError::TableCreationFailed {
                table: schema.name.clone(),
                message: e.to_string(),
            })?;
        info!(table = %schema.name, "Created table");
        Ok(())
    }
}
