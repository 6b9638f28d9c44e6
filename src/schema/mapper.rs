//! Native type to SQL type mapping

use tracing::warn;

use crate::models::{ColumnOverrides, ColumnSpec, DataTable, NativeType, SqlType};

/// Derives target column specs from a table
pub struct SchemaMapper;

impl SchemaMapper {
    /// SQL type for a native column type
    ///
    /// Never fails: anything without a dedicated mapping is stored as TEXT.
    pub fn sql_type_for(native: &NativeType) -> SqlType {
        match native {
            NativeType::Text => SqlType::Text,
            NativeType::Integer => SqlType::Integer,
            NativeType::Float => SqlType::Float,
            NativeType::Boolean => SqlType::Boolean,
            NativeType::Timestamp => SqlType::DateTime,
            NativeType::Other(_) => SqlType::Text,
        }
    }

    /// Derive one column spec per table column, in column order
    ///
    /// The SQL type comes from the column's native type; overrides only set
    /// ancillary attributes. Overrides naming a column the table does not
    /// have are ignored with a warning.
    pub fn derive(table: &DataTable, overrides: &ColumnOverrides) -> Vec<ColumnSpec> {
        let mut unknown: Vec<&String> = overrides
            .keys()
            .filter(|name| table.column_index(name).is_none())
            .collect();
        unknown.sort();
        for name in unknown {
            warn!(column = %name, "Ignoring override for a column the table does not have");
        }

        table
            .columns()
            .iter()
            .enumerate()
            .map(|(index, name)| {
                let native = table.column_type(index);
                let mut spec = ColumnSpec::new(name.clone(), Self::sql_type_for(&native));
                if let Some(over) = overrides.get(name) {
                    spec.apply(over);
                }
                spec
            })
            .collect()
    }
}
