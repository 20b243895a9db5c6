//! SQLite value type conversions

use chrono::SecondsFormat;
use condql::Value;
use rusqlite::types::{ToSql, ToSqlOutput};

use crate::error::SqliteBindError;

/// A bound value in SQLite storage class form
#[derive(Debug, Clone, PartialEq)]
pub enum SqliteValue {
    Text(String),
    /// Integers, and booleans as 0/1
    Integer(i64),
    Real(f64),
    /// Arrays and JSON objects, as JSON text for `json_each` and `json_extract`
    Json(String),
    Null,
}

impl SqliteValue {
    /// Convert to a rusqlite parameter value
    pub fn to_value(&self) -> rusqlite::types::Value {
        match self {
            SqliteValue::Text(s) | SqliteValue::Json(s) => rusqlite::types::Value::Text(s.clone()),
            SqliteValue::Integer(i) => rusqlite::types::Value::Integer(*i),
            SqliteValue::Real(f) => rusqlite::types::Value::Real(*f),
            SqliteValue::Null => rusqlite::types::Value::Null,
        }
    }
}

impl TryFrom<Value> for SqliteValue {
    type Error = SqliteBindError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Ok(match value {
            Value::Null => SqliteValue::Null,
            Value::String(s) => SqliteValue::Text(s),
            Value::Integer(i) => SqliteValue::Integer(i),
            Value::Float(f) if !f.is_finite() => return Err(SqliteBindError::NonFiniteFloat(f)),
            Value::Float(f) => SqliteValue::Real(f),
            Value::Boolean(b) => SqliteValue::Integer(if b { 1 } else { 0 }),
            // sortable as text, same shape as JavaScript's toISOString
            Value::Date(d) => SqliteValue::Text(d.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Value::Array(_) => SqliteValue::Json(serde_json::to_string(&value.to_json())?),
            Value::Json(json) => SqliteValue::Json(serde_json::to_string(&json)?),
        })
    }
}

impl ToSql for SqliteValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqliteValue::Text(s) | SqliteValue::Json(s) => ToSqlOutput::from(s.as_str()),
            SqliteValue::Integer(i) => ToSqlOutput::from(*i),
            SqliteValue::Real(f) => ToSqlOutput::from(*f),
            SqliteValue::Null => ToSqlOutput::from(rusqlite::types::Null),
        })
    }
}
