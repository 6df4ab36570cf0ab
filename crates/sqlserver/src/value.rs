//! Host values and SQL type hints
//!
//! `SqlValue` is what the ORM builder hands to the compiler for comparisons,
//! assignments and raw fragments. Decimals travel as their textual form so
//! precision is never lost to floating point.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::Value as JsonValue;

use crate::config::DialectRules;

/// Value enumeration for literal sanitization and parameter binding
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    /// Exact decimal kept as supplied, e.g. `"3.0"`
    Decimal(String),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Uuid(uuid::Uuid),
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
    Json(JsonValue),
    /// Regular expression source; only expressible through a registered handler
    Regex(String),
    /// Caller-defined value; only expressible through a registered handler
    Custom { type_name: String, payload: JsonValue },
}

impl SqlValue {
    pub fn decimal(text: impl Into<String>) -> Self {
        SqlValue::Decimal(text.into())
    }

    pub fn regex(source: impl Into<String>) -> Self {
        SqlValue::Regex(source.into())
    }

    pub fn custom(type_name: impl Into<String>, payload: JsonValue) -> Self {
        SqlValue::Custom {
            type_name: type_name.into(),
            payload,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// The registry key for this value
    pub fn kind(&self) -> ValueKind {
        match self {
            SqlValue::Null => ValueKind::Null,
            SqlValue::Bool(_) => ValueKind::Bool,
            SqlValue::Int(_) => ValueKind::Int,
            SqlValue::Decimal(_) => ValueKind::Decimal,
            SqlValue::Float(_) => ValueKind::Float,
            SqlValue::String(_) => ValueKind::String,
            SqlValue::Bytes(_) => ValueKind::Bytes,
            SqlValue::Uuid(_) => ValueKind::Uuid,
            SqlValue::DateTime(_) => ValueKind::DateTime,
            SqlValue::Date(_) => ValueKind::Date,
            SqlValue::Time(_) => ValueKind::Time,
            SqlValue::Json(_) => ValueKind::Json,
            SqlValue::Regex(_) => ValueKind::Regex,
            SqlValue::Custom { type_name, .. } => ValueKind::Custom(type_name.clone()),
        }
    }

    /// Convert to JSON, e.g. for handlers and diagnostics
    pub fn to_json(&self) -> JsonValue {
        match self {
            SqlValue::Null => JsonValue::Null,
            SqlValue::Bool(b) => JsonValue::Bool(*b),
            SqlValue::Int(i) => JsonValue::from(*i),
            SqlValue::Decimal(d) => JsonValue::String(d.clone()),
            SqlValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            SqlValue::String(s) | SqlValue::Regex(s) => JsonValue::String(s.clone()),
            SqlValue::Bytes(b) => JsonValue::Array(b.iter().map(|&x| JsonValue::from(x)).collect()),
            SqlValue::Uuid(u) => JsonValue::String(u.to_string()),
            SqlValue::DateTime(dt) => JsonValue::String(dt.to_rfc3339()),
            SqlValue::Date(d) => JsonValue::String(d.to_string()),
            SqlValue::Time(t) => JsonValue::String(t.to_string()),
            SqlValue::Json(j) => j.clone(),
            SqlValue::Custom { payload, .. } => payload.clone(),
        }
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int(value as i64)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float(value)
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::String(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::String(value.to_string())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        SqlValue::Bytes(value)
    }
}

impl From<uuid::Uuid> for SqlValue {
    fn from(value: uuid::Uuid) -> Self {
        SqlValue::Uuid(value)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        SqlValue::DateTime(value)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(value: NaiveDate) -> Self {
        SqlValue::Date(value)
    }
}

impl From<NaiveTime> for SqlValue {
    fn from(value: NaiveTime) -> Self {
        SqlValue::Time(value)
    }
}

impl From<JsonValue> for SqlValue {
    fn from(value: JsonValue) -> Self {
        SqlValue::Json(value)
    }
}

impl<T> From<Option<T>> for SqlValue
where
    T: Into<SqlValue>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => SqlValue::Null,
        }
    }
}

/// Discriminant of [`SqlValue`], used to key predicate handlers
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Decimal,
    Float,
    String,
    Bytes,
    Uuid,
    DateTime,
    Date,
    Time,
    Json,
    Regex,
    Custom(String),
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Null => write!(f, "null"),
            ValueKind::Bool => write!(f, "bool"),
            ValueKind::Int => write!(f, "int"),
            ValueKind::Decimal => write!(f, "decimal"),
            ValueKind::Float => write!(f, "float"),
            ValueKind::String => write!(f, "string"),
            ValueKind::Bytes => write!(f, "bytes"),
            ValueKind::Uuid => write!(f, "uuid"),
            ValueKind::DateTime => write!(f, "datetime"),
            ValueKind::Date => write!(f, "date"),
            ValueKind::Time => write!(f, "time"),
            ValueKind::Json => write!(f, "json"),
            ValueKind::Regex => write!(f, "regex"),
            ValueKind::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// SQL Server column type used to declare binds and tag literals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeHint {
    NVarChar,
    NVarCharMax,
    /// Non-unicode string; literals carry no `N` prefix
    VarChar,
    Int,
    BigInt,
    Decimal { precision: u8, scale: u8 },
    Float,
    Bit,
    DateTime2,
    Date,
    Time,
    UniqueIdentifier,
    VarBinary,
}

impl TypeHint {
    /// Infer the declaration type of a bound value
    pub fn for_value(rules: &DialectRules, value: &SqlValue) -> TypeHint {
        match value {
            SqlValue::Null => TypeHint::NVarChar,
            SqlValue::Bool(_) => TypeHint::Bit,
            SqlValue::Int(i) => {
                if *i >= i32::MIN as i64 && *i <= i32::MAX as i64 {
                    TypeHint::Int
                } else {
                    TypeHint::BigInt
                }
            }
            SqlValue::Decimal(text) => decimal_hint(text),
            SqlValue::Float(_) => TypeHint::Float,
            SqlValue::String(s) => {
                if s.chars().count() > rules.max_inline_nvarchar {
                    TypeHint::NVarCharMax
                } else {
                    TypeHint::NVarChar
                }
            }
            SqlValue::Json(_) | SqlValue::Regex(_) | SqlValue::Custom { .. } => TypeHint::NVarCharMax,
            SqlValue::Bytes(_) => TypeHint::VarBinary,
            SqlValue::Uuid(_) => TypeHint::UniqueIdentifier,
            SqlValue::DateTime(_) => TypeHint::DateTime2,
            SqlValue::Date(_) => TypeHint::Date,
            SqlValue::Time(_) => TypeHint::Time,
        }
    }

    /// Declaration text used in `sp_executesql` parameter lists
    pub fn as_sql(&self, rules: &DialectRules) -> String {
        match self {
            TypeHint::NVarChar => format!("nvarchar({})", rules.max_inline_nvarchar),
            TypeHint::NVarCharMax => "nvarchar(max)".to_string(),
            TypeHint::VarChar => "varchar(8000)".to_string(),
            TypeHint::Int => "int".to_string(),
            TypeHint::BigInt => "bigint".to_string(),
            TypeHint::Decimal { precision, scale } => format!("decimal({}, {})", precision, scale),
            TypeHint::Float => "float".to_string(),
            TypeHint::Bit => "bit".to_string(),
            TypeHint::DateTime2 => "datetime2(7)".to_string(),
            TypeHint::Date => "date".to_string(),
            TypeHint::Time => "time(7)".to_string(),
            TypeHint::UniqueIdentifier => "uniqueidentifier".to_string(),
            TypeHint::VarBinary => "varbinary(max)".to_string(),
        }
    }

    pub fn is_unicode(&self) -> bool {
        matches!(self, TypeHint::NVarChar | TypeHint::NVarCharMax)
    }
}

/// Precision and scale of a decimal literal, capped at SQL Server's 38 digits
///
/// Integer digits take priority: when both parts do not fit, the scale
/// shrinks and the server rounds the fraction.
fn decimal_hint(text: &str) -> TypeHint {
    const MAX_PRECISION: usize = 38;

    let digits = text.trim_start_matches(['-', '+']);
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
    let int_digits = int_part.trim_start_matches('0').len().min(MAX_PRECISION);
    let scale = frac_part.len().min(MAX_PRECISION - int_digits);
    let precision = (int_digits + scale).max(1);

    TypeHint::Decimal {
        precision: precision as u8,
        scale: scale as u8,
    }
}
