//! Target table schema
//!
//! [`SchemaMapper`] derives one [`ColumnSpec`](crate::models::ColumnSpec) per
//! table column from its native type and any user overrides, and
//! [`TableSchema`] renders the specs as PostgreSQL DDL.

pub mod ddl;
pub mod mapper;

pub use ddl::{TableSchema, quote_identifier, quote_qualified_name, validate_expression};
pub use mapper::SchemaMapper;

/// Error raised while validating or rendering a table schema
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    /// A table or column name cannot be used as a PostgreSQL identifier
    #[error("Invalid identifier '{name}': {reason}")]
    InvalidIdentifier { name: String, reason: String },

    /// A check constraint or default is not a single SQL expression
    #[error("Invalid {kind} expression for column '{column}': {reason}")]
    InvalidExpression {
        column: String,
        kind: &'static str,
        reason: String,
    },
}
