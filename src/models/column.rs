//! Column definitions for target database tables

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// SQL type class of a target column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlType {
    /// Unbounded text (also the fallback for unrecognized native types)
    Text,
    /// 64-bit integers
    Integer,
    /// Double precision floating point
    Float,
    Boolean,
    /// Timestamp without time zone
    DateTime,
}

impl SqlType {
    /// PostgreSQL spelling of the type
    pub fn as_postgres(&self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "BIGINT",
            SqlType::Float => "DOUBLE PRECISION",
            SqlType::Boolean => "BOOLEAN",
            SqlType::DateTime => "TIMESTAMP",
        }
    }

    /// Whether cells of this type are serialized as free text
    pub fn is_text(&self) -> bool {
        matches!(self, SqlType::Text)
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_postgres())
    }
}

/// Caller-supplied attributes for one column
///
/// Every field is optional; a field left unset keeps the database default.
/// The SQL type is not part of an override: it is always derived from the
/// data, so an override document carrying a `type` key is rejected.
///
/// # Example
///
/// ```rust
/// use data_bulk_loader::models::ColumnOverride;
///
/// let o: ColumnOverride = serde_json::from_str(r#"{"nullable": false}"#).unwrap();
/// assert_eq!(o.nullable, Some(false));
/// assert!(serde_json::from_str::<ColumnOverride>(r#"{"type": "TEXT"}"#).is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique: Option<bool>,
    /// Raw SQL expression used as the column default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_default: Option<String>,
    /// Raw SQL boolean expression, emitted as a table-level CHECK constraint
    #[serde(
        default,
        alias = "CheckConstraint",
        skip_serializing_if = "Option::is_none"
    )]
    pub check: Option<String>,
}

impl ColumnOverride {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = Some(nullable);
        self
    }

    pub fn primary_key(mut self, primary_key: bool) -> Self {
        self.primary_key = Some(primary_key);
        self
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = Some(unique);
        self
    }

    pub fn server_default(mut self, expression: impl Into<String>) -> Self {
        self.server_default = Some(expression.into());
        self
    }

    pub fn check(mut self, expression: impl Into<String>) -> Self {
        self.check = Some(expression.into());
        self
    }
}

/// Overrides keyed by column name
pub type ColumnOverrides = HashMap<String, ColumnOverride>;

/// Definition of one column of a target table
///
/// Produced by the schema mapper from a derived SQL type merged with any
/// caller override. Attributes left as `None` are not emitted in DDL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name
    pub name: String,
    /// Derived SQL type
    pub sql_type: SqlType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_default: Option<String>,
    /// Check expression, rendered as a table-level constraint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_constraint: Option<String>,
}

impl ColumnSpec {
    /// Create a column spec with only a name and type
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            nullable: None,
            primary_key: None,
            unique: None,
            server_default: None,
            check_constraint: None,
        }
    }

    /// Apply an override; every attribute it sets wins
    pub fn apply(&mut self, over: &ColumnOverride) {
        if let Some(nullable) = over.nullable {
            self.nullable = Some(nullable);
        }
        if let Some(primary_key) = over.primary_key {
            self.primary_key = Some(primary_key);
        }
        if let Some(unique) = over.unique {
            self.unique = Some(unique);
        }
        if let Some(default) = &over.server_default {
            self.server_default = Some(default.clone());
        }
        if let Some(check) = &over.check {
            self.check_constraint = Some(check.clone());
        }
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key.unwrap_or(false)
    }
}
