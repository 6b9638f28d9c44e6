//! CREATE TABLE rendering and identifier/expression validation

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Token;

use super::SchemaError;
use crate::models::ColumnSpec;

/// PostgreSQL truncates identifiers longer than this many bytes
const MAX_IDENTIFIER_BYTES: usize = 63;

static RE_CONTROL_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\x00-\x1f\x7f]").unwrap());

/// A target table: its (optionally schema-qualified) name and column specs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnSpec>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Names of the primary key columns, in column order
    pub fn primary_key(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.is_primary_key())
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Check identifiers and expressions without rendering
    pub fn validate(&self) -> Result<(), SchemaError> {
        for part in split_qualified_name(&self.name) {
            validate_identifier(part)?;
        }
        for column in &self.columns {
            validate_identifier(&column.name)?;
            if let Some(default) = &column.server_default {
                validate_expression(&column.name, "default", default)?;
            }
            if let Some(check) = &column.check_constraint {
                validate_expression(&column.name, "check", check)?;
            }
        }
        Ok(())
    }

    /// Render `CREATE TABLE IF NOT EXISTS` DDL for this schema
    ///
    /// Primary key columns are gathered into one table-level `PRIMARY KEY`
    /// clause, and each check expression becomes a named table constraint
    /// `ck_<table>_<column>`.
    pub fn create_table_sql(&self) -> Result<String, SchemaError> {
        self.validate()?;

        let mut lines: Vec<String> = self.columns.iter().map(column_definition).collect();

        let primary_key = self.primary_key();
        if !primary_key.is_empty() {
            let keys: Vec<String> = primary_key.iter().map(|k| quote_identifier(k)).collect();
            lines.push(format!("PRIMARY KEY ({})", keys.join(", ")));
        }

        let table_leaf = split_qualified_name(&self.name)
            .last()
            .copied()
            .unwrap_or(self.name.as_str());
        for column in &self.columns {
            if let Some(check) = &column.check_constraint {
                let constraint = constraint_name(table_leaf, &column.name);
                lines.push(format!(
                    "CONSTRAINT {} CHECK ({})",
                    quote_identifier(&constraint),
                    check.trim()
                ));
            }
        }

        Ok(format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
            quote_qualified_name(&self.name),
            lines.join(",\n  ")
        ))
    }
}

fn column_definition(column: &ColumnSpec) -> String {
    let mut def = format!(
        "{} {}",
        quote_identifier(&column.name),
        column.sql_type.as_postgres()
    );
    if column.nullable == Some(false) {
        def.push_str(" NOT NULL");
    }
    if column.unique == Some(true) {
        def.push_str(" UNIQUE");
    }
    if let Some(default) = &column.server_default {
        def.push_str(" DEFAULT ");
        def.push_str(default.trim());
    }
    def
}

/// `ck_<table>_<column>`, truncated to the identifier limit on a char boundary
fn constraint_name(table: &str, column: &str) -> String {
    let mut name = format!("ck_{}_{}", table, column);
    if name.len() > MAX_IDENTIFIER_BYTES {
        let mut cut = MAX_IDENTIFIER_BYTES;
        while !name.is_char_boundary(cut) {
            cut -= 1;
        }
        name.truncate(cut);
    }
    name
}

/// Quote an identifier for PostgreSQL, doubling embedded quotes
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a possibly schema-qualified name (`schema.table`)
pub fn quote_qualified_name(name: &str) -> String {
    split_qualified_name(name)
        .into_iter()
        .map(quote_identifier)
        .collect::<Vec<_>>()
        .join(".")
}

fn split_qualified_name(name: &str) -> Vec<&str> {
    match name.split_once('.') {
        Some((schema, table)) if !schema.is_empty() && !table.is_empty() => vec![schema, table],
        _ => vec![name],
    }
}

fn validate_identifier(name: &str) -> Result<(), SchemaError> {
    let invalid = |reason: &str| SchemaError::InvalidIdentifier {
        name: name.to_string(),
        reason: reason.to_string(),
    };
    if name.trim().is_empty() {
        return Err(invalid("must not be empty"));
    }
    if name.len() > MAX_IDENTIFIER_BYTES {
        return Err(invalid("longer than 63 bytes"));
    }
    if RE_CONTROL_CHARS.is_match(name) {
        return Err(invalid("contains control characters"));
    }
    Ok(())
}

/// Check that `expression` is exactly one PostgreSQL expression
pub fn validate_expression(
    column: &str,
    kind: &'static str,
    expression: &str,
) -> Result<(), SchemaError> {
    let invalid = |reason: String| SchemaError::InvalidExpression {
        column: column.to_string(),
        kind,
        reason,
    };
    if expression.trim().is_empty() {
        return Err(invalid("empty expression".to_string()));
    }

    let dialect = PostgreSqlDialect {};
    let mut parser = Parser::new(&dialect)
        .try_with_sql(expression)
        .map_err(|e| invalid(e.to_string()))?;
    parser.parse_expr().map_err(|e| invalid(e.to_string()))?;
    let next = parser.peek_token();
    if next.token != Token::EOF {
        return Err(invalid(format!("unexpected trailing input at '{}'", next.token)));
    }
    Ok(())
}
