//! Models for tables, cells and target column definitions

pub mod column;
pub mod table;
pub mod value;

pub use column::{ColumnOverride, ColumnOverrides, ColumnSpec, SqlType};
pub use table::{DataTable, TableError};
pub use value::{NativeType, Value};
