//! Cell values and native column types

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Timestamp layouts accepted when parsing text cells as timestamps
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Native storage type of a table column
///
/// This is the type a decoder observed or declared for a column, before it is
/// translated into a SQL type by the schema mapper.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NativeType {
    /// Textual values
    Text,
    /// Integer-like values
    Integer,
    /// Floating point values
    Float,
    /// Boolean values
    Boolean,
    /// Timestamp-like values
    Timestamp,
    /// Any other storage type, keyed by its source name (e.g. "binary", "json")
    Other(String),
}

impl NativeType {
    /// Parse a native type from a dtype-style name
    ///
    /// Accepts the names produced by dataframe and Arrow tooling
    /// (`object`, `int64`, `float64`, `datetime64[ns]`, `utf8`, ...).
    /// Names that are not recognized become [`NativeType::Other`].
    pub fn from_name(name: &str) -> Self {
        let lower = name.trim().to_lowercase();
        match lower.as_str() {
            "object" | "str" | "string" | "text" | "utf8" | "largeutf8" => NativeType::Text,
            "int" | "int8" | "int16" | "int32" | "int64" | "integer" | "uint8" | "uint16"
            | "uint32" => NativeType::Integer,
            "float" | "float16" | "float32" | "float64" | "double" | "real" => NativeType::Float,
            "bool" | "boolean" => NativeType::Boolean,
            "datetime" | "timestamp" | "date" => NativeType::Timestamp,
            other if other.starts_with("datetime64") || other.starts_with("timestamp") => {
                NativeType::Timestamp
            }
            _ => NativeType::Other(lower),
        }
    }

    /// Widen two observed types into one that can hold both
    ///
    /// Integer and Float widen to Float; any other disagreement falls back to Text.
    pub fn unify(&self, other: &NativeType) -> NativeType {
        match (self, other) {
            (a, b) if a == b => a.clone(),
            (NativeType::Integer, NativeType::Float) | (NativeType::Float, NativeType::Integer) => {
                NativeType::Float
            }
            _ => NativeType::Text,
        }
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeType::Text => write!(f, "text"),
            NativeType::Integer => write!(f, "integer"),
            NativeType::Float => write!(f, "float"),
            NativeType::Boolean => write!(f, "boolean"),
            NativeType::Timestamp => write!(f, "timestamp"),
            NativeType::Other(name) => write!(f, "{}", name),
        }
    }
}

/// A single table cell
///
/// Serialize-only; cells render untagged as plain JSON scalars.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Timestamp(NaiveDateTime),
    Text(String),
    /// Nested structures (JSON arrays/objects) kept verbatim
    Json(serde_json::Value),
}

impl Value {
    /// Whether this cell is null-like (null, or a NaN float)
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    /// Native type of this value, `None` for null-like cells
    pub fn native_type(&self) -> Option<NativeType> {
        if self.is_null() {
            return None;
        }
        Some(match self {
            Value::Boolean(_) => NativeType::Boolean,
            Value::Integer(_) => NativeType::Integer,
            Value::Float(_) => NativeType::Float,
            Value::Timestamp(_) => NativeType::Timestamp,
            Value::Text(_) => NativeType::Text,
            Value::Json(_) => NativeType::Other("json".to_string()),
            Value::Null => return None,
        })
    }

    /// Convert a value into the representation of `target`
    ///
    /// Used after type unification: integers become floats in a Float column,
    /// and everything becomes text in a Text column. Nulls stay null.
    pub fn coerce_to(self, target: &NativeType) -> Value {
        if self.is_null() {
            return Value::Null;
        }
        match (target, self) {
            (NativeType::Float, Value::Integer(i)) => Value::Float(i as f64),
            (NativeType::Text, Value::Text(s)) => Value::Text(s),
            (NativeType::Text, other) => Value::Text(other.to_string()),
            (_, other) => other,
        }
    }

    /// Parse a text cell as a timestamp using the accepted layouts
    pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
        let trimmed = raw.trim();
        if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(trimmed) {
            return Some(dt.naive_utc());
        }
        for format in TIMESTAMP_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
                return Some(dt);
            }
        }
        chrono::NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    }
}

/// Infer the native type of a column of raw text cells
///
/// Empty cells are ignored. A column is Boolean only when every cell is a
/// boolean literal, Integer when every cell parses as `i64`, Float when every
/// cell parses as `f64`, and Text otherwise. A column with no cells at all is
/// reported as Text.
pub fn infer_text_column<'a>(cells: impl IntoIterator<Item = &'a str>) -> NativeType {
    let mut observed: Option<NativeType> = None;
    for cell in cells {
        let cell = cell.trim();
        if cell.is_empty() {
            continue;
        }
        let cell_type = if parse_bool(cell).is_some() {
            NativeType::Boolean
        } else if cell.parse::<i64>().is_ok() {
            NativeType::Integer
        } else if cell.parse::<f64>().is_ok() {
            NativeType::Float
        } else {
            return NativeType::Text;
        };
        observed = Some(match observed {
            Some(prev) => prev.unify(&cell_type),
            None => cell_type,
        });
        if observed == Some(NativeType::Text) {
            return NativeType::Text;
        }
    }
    observed.unwrap_or(NativeType::Text)
}

/// Parse a raw text cell as the given native type
///
/// Empty cells become [`Value::Null`]; cells that do not parse fall back to text.
pub fn parse_text_cell(raw: &str, target: &NativeType) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    match target {
        NativeType::Boolean => parse_bool(trimmed)
            .map(Value::Boolean)
            .unwrap_or_else(|| Value::Text(raw.to_string())),
        NativeType::Integer => trimmed
            .parse()
            .map(Value::Integer)
            .unwrap_or_else(|_| Value::Text(raw.to_string())),
        NativeType::Float => trimmed
            .parse()
            .map(Value::Float)
            .unwrap_or_else(|_| Value::Text(raw.to_string())),
        NativeType::Timestamp => Value::parse_timestamp(trimmed)
            .map(Value::Timestamp)
            .unwrap_or_else(|| Value::Text(raw.to_string())),
        NativeType::Text | NativeType::Other(_) => Value::Text(raw.to_string()),
    }
}

fn parse_bool(cell: &str) -> Option<bool> {
    match cell {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.f")),
            Value::Text(s) => write!(f, "{}", s),
            Value::Json(v) => write!(f, "{}", v),
        }
    }
}

// Floats compare by bit pattern so that rows can be de-duplicated and hashed.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Json(a), Value::Json(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(b) => b.hash(state),
            Value::Integer(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Timestamp(ts) => ts.hash(state),
            Value::Text(s) => s.hash(state),
            Value::Json(v) => v.to_string().hash(state),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(ts: NaiveDateTime) -> Self {
        Value::Timestamp(ts)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::Text(s),
            nested => Value::Json(nested),
        }
    }
}
