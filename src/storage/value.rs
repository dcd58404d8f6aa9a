//! Backend-neutral SQL values
//!
//! `SqlValue` is what the loader binds as a parameter and what the query
//! tool reads back. It converts to both `rusqlite` and `postgres` parameter
//! types and serializes to plain JSON.

use bytes::BytesMut;
use chrono::{DateTime, SecondsFormat, Utc};
use postgres::types::{to_sql_checked, IsNull, ToSql as PgToSql, Type};
use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Bool(bool),
    Text(String),
    Timestamp(DateTime<Utc>),
    Json(serde_json::Value),
    Blob(Vec<u8>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Render for terminal tables
    pub fn display(&self) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Integer(v) => v.to_string(),
            SqlValue::Real(v) => v.to_string(),
            SqlValue::Bool(v) => v.to_string(),
            SqlValue::Text(v) => v.clone(),
            SqlValue::Timestamp(v) => format_timestamp(v),
            SqlValue::Json(v) => v.to_string(),
            SqlValue::Blob(v) => format!("<{} bytes>", v.len()),
        }
    }
}

/// ISO-8601 text form used for SQLite TEXT timestamp columns
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

impl From<Option<String>> for SqlValue {
    fn from(value: Option<String>) -> Self {
        value.map(SqlValue::Text).unwrap_or(SqlValue::Null)
    }
}

impl From<Option<i64>> for SqlValue {
    fn from(value: Option<i64>) -> Self {
        value.map(SqlValue::Integer).unwrap_or(SqlValue::Null)
    }
}

impl From<Option<DateTime<Utc>>> for SqlValue {
    fn from(value: Option<DateTime<Utc>>) -> Self {
        value.map(SqlValue::Timestamp).unwrap_or(SqlValue::Null)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<ValueRef<'_>> for SqlValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(v) => SqlValue::Integer(v),
            ValueRef::Real(v) => SqlValue::Real(v),
            ValueRef::Text(v) => SqlValue::Text(String::from_utf8_lossy(v).into_owned()),
            ValueRef::Blob(v) => SqlValue::Blob(v.to_vec()),
        }
    }
}

impl Serialize for SqlValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            SqlValue::Null => serializer.serialize_none(),
            SqlValue::Integer(v) => serializer.serialize_i64(*v),
            SqlValue::Real(v) => serializer.serialize_f64(*v),
            SqlValue::Bool(v) => serializer.serialize_bool(*v),
            SqlValue::Text(v) => serializer.serialize_str(v),
            SqlValue::Timestamp(v) => serializer.serialize_str(&format_timestamp(v)),
            SqlValue::Json(v) => v.serialize(serializer),
            SqlValue::Blob(v) => serializer.serialize_str(&format!("<{} bytes>", v.len())),
        }
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Owned(Value::Null),
            SqlValue::Integer(v) => ToSqlOutput::Owned(Value::Integer(*v)),
            SqlValue::Real(v) => ToSqlOutput::Owned(Value::Real(*v)),
            SqlValue::Bool(v) => ToSqlOutput::Owned(Value::Integer(i64::from(*v))),
            SqlValue::Text(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
            SqlValue::Timestamp(v) => ToSqlOutput::Owned(Value::Text(format_timestamp(v))),
            SqlValue::Json(v) => ToSqlOutput::Owned(Value::Text(v.to_string())),
            SqlValue::Blob(v) => ToSqlOutput::Borrowed(ValueRef::Blob(v)),
        })
    }
}

// Integers narrow to the declared column width; everything else defers to
// the postgres impl for the wrapped Rust type.
impl PgToSql for SqlValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            SqlValue::Null => Ok(IsNull::Yes),
            SqlValue::Integer(v) => match *ty {
                Type::INT2 => PgToSql::to_sql(&i16::try_from(*v)?, ty, out),
                Type::INT4 => PgToSql::to_sql(&i32::try_from(*v)?, ty, out),
                Type::FLOAT8 => PgToSql::to_sql(&(*v as f64), ty, out),
                _ => PgToSql::to_sql(v, ty, out),
            },
            SqlValue::Real(v) => PgToSql::to_sql(v, ty, out),
            SqlValue::Bool(v) => PgToSql::to_sql(v, ty, out),
            SqlValue::Text(v) => PgToSql::to_sql(v, ty, out),
            SqlValue::Timestamp(v) => match *ty {
                Type::TEXT | Type::VARCHAR => PgToSql::to_sql(&format_timestamp(v), ty, out),
                _ => PgToSql::to_sql(v, ty, out),
            },
            SqlValue::Json(v) => PgToSql::to_sql(v, ty, out),
            SqlValue::Blob(v) => PgToSql::to_sql(v, ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_json_serialization() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let values = vec![
            SqlValue::Null,
            SqlValue::Integer(7),
            SqlValue::Text("bug".into()),
            SqlValue::Timestamp(ts),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[null,7,"bug","2024-03-01T12:30:00Z"]"#);
    }

    #[test]
    fn test_option_conversions() {
        assert_eq!(SqlValue::from(None::<String>), SqlValue::Null);
        assert_eq!(SqlValue::from(Some(3_i64)), SqlValue::Integer(3));
        assert!(SqlValue::from(None::<DateTime<Utc>>).is_null());
    }

    #[test]
    fn test_sqlite_round_trip_of_timestamp_text() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let ts = Utc.with_ymd_and_hms(2023, 11, 5, 8, 0, 0).unwrap();
        let stored: String = conn
            .query_row("SELECT ?1", [SqlValue::Timestamp(ts)], |row| row.get(0))
            .unwrap();
        assert_eq!(stored, "2023-11-05T08:00:00Z");
    }
}
