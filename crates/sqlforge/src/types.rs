//! Database type tags and scalar values.
//!
//! [`DbType`] is the closed mapping from language-level type names onto
//! database-facing tags; [`ScalarValue`] is the tagged value union used by
//! predicate literals and by runtime-generated bindings.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Database-facing type tag for a column or parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DbType {
    Bool,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Decimal,
    Text,
    Bytes,
    Uuid,
    Date,
    Time,
    DateTime,
    DateTimeTz,
    Json,
    /// User-defined type, carried by name.
    Custom(String),
}

impl DbType {
    /// Map a language type name onto a tag.
    ///
    /// Accepts Rust spellings (`i64`, `String`, `Vec<u8>`) and neutral
    /// spellings (`int64`, `string`, `bytes`). Unknown names map to
    /// [`DbType::Custom`].
    pub fn parse(raw: &str) -> DbType {
        let name = raw.trim();
        match name.to_ascii_lowercase().as_str() {
            "bool" | "boolean" => DbType::Bool,
            "i16" | "int16" | "short" | "smallint" => DbType::Int16,
            "i32" | "int32" | "int" | "integer" => DbType::Int32,
            "i64" | "int64" | "long" | "bigint" => DbType::Int64,
            "f32" | "float32" | "float" | "real" => DbType::Float32,
            "f64" | "float64" | "double" => DbType::Float64,
            "decimal" | "numeric" | "money" => DbType::Decimal,
            "string" | "str" | "&str" | "text" | "varchar" => DbType::Text,
            "vec<u8>" | "&[u8]" | "bytes" | "blob" | "bytea" | "binary" => DbType::Bytes,
            "uuid" | "guid" => DbType::Uuid,
            "date" | "naivedate" => DbType::Date,
            "time" | "naivetime" => DbType::Time,
            "datetime" | "naivedatetime" | "timestamp" => DbType::DateTime,
            "datetimeoffset" | "timestamptz" | "datetime<utc>" => DbType::DateTimeTz,
            "json" | "jsonb" | "value" => DbType::Json,
            _ => DbType::Custom(name.to_string()),
        }
    }

    /// Map a language type name onto a tag, stripping `Option<...>` (or a
    /// trailing `?`) into a nullability flag.
    pub fn parse_nullable(raw: &str) -> (DbType, bool) {
        let name = raw.trim();
        if let Some(inner) = name
            .strip_prefix("Option<")
            .and_then(|s| s.strip_suffix('>'))
        {
            return (DbType::parse(inner), true);
        }
        if let Some(inner) = name.strip_suffix('?') {
            return (DbType::parse(inner), true);
        }
        (DbType::parse(name), false)
    }
}

/// A scalar value, as bound to a SQL parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    Text(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl ScalarValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }

    /// The type tag of this value; `None` for NULL.
    pub fn type_tag(&self) -> Option<DbType> {
        match self {
            ScalarValue::Null => None,
            ScalarValue::Bool(_) => Some(DbType::Bool),
            ScalarValue::Int16(_) => Some(DbType::Int16),
            ScalarValue::Int32(_) => Some(DbType::Int32),
            ScalarValue::Int64(_) => Some(DbType::Int64),
            ScalarValue::Float64(_) => Some(DbType::Float64),
            ScalarValue::Text(_) => Some(DbType::Text),
            ScalarValue::Bytes(_) => Some(DbType::Bytes),
            ScalarValue::Uuid(_) => Some(DbType::Uuid),
            ScalarValue::Date(_) => Some(DbType::Date),
            ScalarValue::DateTime(_) => Some(DbType::DateTime),
        }
    }
}

impl From<bool> for ScalarValue {
    fn from(v: bool) -> Self {
        ScalarValue::Bool(v)
    }
}

impl From<i16> for ScalarValue {
    fn from(v: i16) -> Self {
        ScalarValue::Int16(v)
    }
}

impl From<i32> for ScalarValue {
    fn from(v: i32) -> Self {
        ScalarValue::Int32(v)
    }
}

impl From<i64> for ScalarValue {
    fn from(v: i64) -> Self {
        ScalarValue::Int64(v)
    }
}

impl From<f64> for ScalarValue {
    fn from(v: f64) -> Self {
        ScalarValue::Float64(v)
    }
}

impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        ScalarValue::Text(v.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(v: String) -> Self {
        ScalarValue::Text(v)
    }
}

impl From<Uuid> for ScalarValue {
    fn from(v: Uuid) -> Self {
        ScalarValue::Uuid(v)
    }
}

impl From<NaiveDate> for ScalarValue {
    fn from(v: NaiveDate) -> Self {
        ScalarValue::Date(v)
    }
}

impl From<NaiveDateTime> for ScalarValue {
    fn from(v: NaiveDateTime) -> Self {
        ScalarValue::DateTime(v)
    }
}

impl<T: Into<ScalarValue>> From<Option<T>> for ScalarValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => ScalarValue::Null,
        }
    }
}
