//! PostgreSQL backend

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use postgres::types::{ToSql, Type};
use postgres::{Client, Config, NoTls, Row};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use crate::Result;
use super::backend::{Backend, QueryRows};
use super::{Dialect, SqlValue};

/// Server option that makes every transaction on the session read-only
const READ_ONLY_OPTIONS: &str = "-c default_transaction_read_only=on";

/// PostgreSQL-backed connection
pub struct PostgresBackend {
    client: Client,
}

impl PostgresBackend {
    /// Connect for loading
    pub fn connect(url: &str) -> Result<Self> {
        let config: Config = url.parse()?;
        Self::connect_with(config)
    }

    /// Connect with every transaction forced read-only by the server
    pub fn connect_read_only(url: &str) -> Result<Self> {
        let mut config: Config = url.parse()?;
        config.options(READ_ONLY_OPTIONS);
        Self::connect_with(config)
    }

    fn connect_with(config: Config) -> Result<Self> {
        let client = config.connect(NoTls)?;
        Ok(Self { client })
    }
}

fn as_params(params: &[SqlValue]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

/// Decode one column of a result row into a backend-neutral value
fn column_value(row: &Row, idx: usize, ty: &Type) -> std::result::Result<SqlValue, postgres::Error> {
    let value = match *ty {
        Type::BOOL => row.try_get::<_, Option<bool>>(idx)?.map(SqlValue::Bool),
        Type::INT2 => row.try_get::<_, Option<i16>>(idx)?.map(|v| SqlValue::Integer(v.into())),
        Type::INT4 => row.try_get::<_, Option<i32>>(idx)?.map(|v| SqlValue::Integer(v.into())),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx)?.map(SqlValue::Integer),
        Type::OID => row.try_get::<_, Option<u32>>(idx)?.map(|v| SqlValue::Integer(v.into())),
        Type::FLOAT4 => row.try_get::<_, Option<f32>>(idx)?.map(|v| SqlValue::Real(v.into())),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx)?.map(SqlValue::Real),
        Type::NUMERIC => row
            .try_get::<_, Option<Decimal>>(idx)?
            .map(|d| d.to_f64().map(SqlValue::Real).unwrap_or_else(|| SqlValue::Text(d.to_string()))),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            row.try_get::<_, Option<String>>(idx)?.map(SqlValue::Text)
        }
        Type::TIMESTAMPTZ => row.try_get::<_, Option<DateTime<Utc>>>(idx)?.map(SqlValue::Timestamp),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(|v| SqlValue::Timestamp(v.and_utc())),
        Type::DATE => row
            .try_get::<_, Option<NaiveDate>>(idx)?
            .map(|v| SqlValue::Text(v.to_string())),
        Type::JSON | Type::JSONB => row.try_get::<_, Option<serde_json::Value>>(idx)?.map(SqlValue::Json),
        Type::BYTEA => row.try_get::<_, Option<Vec<u8>>>(idx)?.map(SqlValue::Blob),
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY => row
            .try_get::<_, Option<Vec<Option<String>>>>(idx)?
            .map(|v| SqlValue::Json(serde_json::json!(v))),
        Type::INT8_ARRAY => row
            .try_get::<_, Option<Vec<Option<i64>>>>(idx)?
            .map(|v| SqlValue::Json(serde_json::json!(v))),
        _ => Some(SqlValue::Text(format!("<unsupported type {}>", ty))),
    };
    Ok(value.unwrap_or(SqlValue::Null))
}

impl Backend for PostgresBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn execute_script(&mut self, sql: &str) -> Result<()> {
        self.client.batch_execute(sql)?;
        Ok(())
    }

    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        Ok(self.client.execute(sql, &as_params(params))?)
    }

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<QueryRows> {
        let stmt = self.client.prepare(sql)?;
        let columns: Vec<String> = stmt.columns().iter().map(|c| c.name().to_string()).collect();
        let types: Vec<Type> = stmt.columns().iter().map(|c| c.type_().clone()).collect();

        let mut result = QueryRows { columns, rows: Vec::new() };
        for row in self.client.query(&stmt, &as_params(params))? {
            let mut values = Vec::with_capacity(types.len());
            for (idx, ty) in types.iter().enumerate() {
                values.push(column_value(&row, idx, ty)?);
            }
            result.rows.push(values);
        }
        Ok(result)
    }
}
