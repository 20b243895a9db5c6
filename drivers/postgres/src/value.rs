use std::error::Error;

use bytes::BytesMut;
use condql::Value;
use thiserror::Error;
use tokio_postgres::types::{to_sql_checked, IsNull, Kind, ToSql, Type};

#[derive(Debug, Error)]
pub enum PgValueError {
    #[error("{value} is out of range for {ty}")]
    OutOfRange { value: i64, ty: Type },
    #[error("cannot bind {kind} to a parameter of type {ty}")]
    Unsupported { kind: &'static str, ty: Type },
}

/// A bound value that encodes itself for whatever parameter type Postgres
/// inferred for its placeholder.
///
/// Integers fit `int2`/`int4`/`int8` and the float types, every scalar can be
/// bound as text or json, and arrays encode as a Postgres array of the inferred
/// element type (what `= ANY ($n)` needs) or as a JSON array.
#[derive(Debug, Clone, PartialEq)]
pub struct PgValue(pub Value);

impl PgValue {
    pub fn kind(&self) -> &'static str {
        match &self.0 {
            Value::Null => "null",
            Value::String(_) => "string",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Boolean(_) => "boolean",
            Value::Date(_) => "date",
            Value::Array(_) => "array",
            Value::Json(_) => "json",
        }
    }

    fn unsupported(&self, ty: &Type) -> Box<dyn Error + Sync + Send> { Box::new(PgValueError::Unsupported { kind: self.kind(), ty: ty.clone() }) }

    fn encode<T: ToSql>(&self, value: T, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        if !T::accepts(ty) {
            return Err(self.unsupported(ty));
        }
        value.to_sql(ty, out)
    }
}

impl From<Value> for PgValue {
    fn from(value: Value) -> Self { PgValue(value) }
}

fn is_text(ty: &Type) -> bool { matches!(*ty, Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN) }

fn is_json(ty: &Type) -> bool { matches!(*ty, Type::JSON | Type::JSONB) }

fn out_of_range(value: i64, ty: &Type) -> PgValueError { PgValueError::OutOfRange { value, ty: ty.clone() } }

impl ToSql for PgValue {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match &self.0 {
            Value::Null => Ok(IsNull::Yes),
            Value::String(s) if is_json(ty) => self.encode(serde_json::Value::String(s.clone()), ty, out),
            Value::String(s) => self.encode(s.as_str(), ty, out),
            Value::Integer(i) => match *ty {
                Type::INT2 => self.encode(i16::try_from(*i).map_err(|_| out_of_range(*i, ty))?, ty, out),
                Type::INT4 => self.encode(i32::try_from(*i).map_err(|_| out_of_range(*i, ty))?, ty, out),
                Type::FLOAT4 => self.encode(*i as f32, ty, out),
                Type::FLOAT8 => self.encode(*i as f64, ty, out),
                _ if is_text(ty) => self.encode(i.to_string(), ty, out),
                _ if is_json(ty) => self.encode(serde_json::Value::from(*i), ty, out),
                _ => self.encode(*i, ty, out),
            },
            Value::Float(f) => match *ty {
                Type::FLOAT4 => self.encode(*f as f32, ty, out),
                _ if is_text(ty) => self.encode(f.to_string(), ty, out),
                _ if is_json(ty) => self.encode(serde_json::Value::from(*f), ty, out),
                _ => self.encode(*f, ty, out),
            },
            Value::Boolean(b) => match *ty {
                _ if is_text(ty) => self.encode(b.to_string(), ty, out),
                _ if is_json(ty) => self.encode(serde_json::Value::Bool(*b), ty, out),
                _ => self.encode(*b, ty, out),
            },
            Value::Date(d) => match *ty {
                Type::TIMESTAMP => self.encode(d.naive_utc(), ty, out),
                Type::DATE => self.encode(d.date_naive(), ty, out),
                _ if is_text(ty) => self.encode(d.to_rfc3339(), ty, out),
                _ if is_json(ty) => self.encode(serde_json::Value::String(d.to_rfc3339()), ty, out),
                _ => self.encode(*d, ty, out),
            },
            Value::Array(items) => match ty.kind() {
                Kind::Array(_) => self.encode(items.iter().cloned().map(PgValue).collect::<Vec<_>>(), ty, out),
                _ if is_json(ty) => self.encode(self.0.to_json(), ty, out),
                _ if is_text(ty) => self.encode(self.0.to_json().to_string(), ty, out),
                _ => Err(self.unsupported(ty)),
            },
            Value::Json(json) if is_text(ty) => self.encode(json.to_string(), ty, out),
            Value::Json(json) => self.encode(json, ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true // checked per value in to_sql
    }

    to_sql_checked!();
}
