use std::time::Duration;

use crate::{DatabaseResult, DbError};

use super::Database;
use config::Credentials;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Value, json};
use sqlx::postgres::types::{Oid, PgInterval};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};

pub struct PostgresDatabase {
    pool: PgPool,
}

impl std::fmt::Debug for PostgresDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresDatabase").finish_non_exhaustive()
    }
}

impl PostgresDatabase {
    pub async fn new(creds: &Credentials) -> Result<Self, DbError> {
        let options = PgConnectOptions::new()
            .host(&creds.host)
            .port(creds.port)
            .username(&creds.user)
            .password(&creds.password)
            .database(&creds.database);

        let database = Self::connect_with(options).await?;
        tracing::info!(database = %creds, "connected to postgres");
        Ok(database)
    }

    /// Dropped connections are replaced on the next acquire.
    async fn connect_with(options: PgConnectOptions) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .test_before_acquire(true)
            .connect_with(options)
            .await
            .map_err(DbError::Connect)?;

        Ok(Self { pool })
    }
}

#[async_trait::async_trait]
impl Database for PostgresDatabase {
    async fn list_tables(&mut self) -> Result<Vec<String>, DbError> {
        let tables = sqlx::query_scalar::<_, String>(
            r#"SELECT table_name::text
            FROM information_schema.tables
            WHERE table_schema = current_schema()
              AND table_type = 'BASE TABLE'
            ORDER BY table_name"#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(tables)
    }

    async fn table_columns(&mut self, table: &str) -> Result<Vec<String>, DbError> {
        let columns = sqlx::query_scalar::<_, String>(
            r#"SELECT column_name::text
            FROM information_schema.columns
            WHERE table_schema = current_schema()
              AND table_name = $1
            ORDER BY ordinal_position"#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        Ok(columns)
    }

    async fn get_results(&mut self, query: &str) -> Result<DatabaseResult, DbError> {
        let rows = sqlx::query(query).fetch_all(&self.pool).await?;

        let mut results = DatabaseResult::default();

        let Some(first) = rows.first() else {
            return Ok(results);
        };

        for col in first.columns() {
            results
                .headers
                .push((col.name().to_string(), col.type_info().name().to_string()));
        }

        for row in &rows {
            let row_data = (0..row.columns().len())
                .map(|i| decode_value(row, i))
                .collect();
            results.rows.push(row_data);
        }

        Ok(results)
    }
}

fn decode_value(row: &PgRow, i: usize) -> Value {
    if row.try_get_raw(i).map_or(true, |raw| raw.is_null()) {
        return Value::Null;
    }

    let type_name = row.columns()[i].type_info().name();
    match type_name {
        "UUID" => row
            .try_get::<uuid::Uuid, _>(i)
            .map(|v| json!(v.to_string()))
            .unwrap_or(Value::Null),

        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => row
            .try_get::<String, _>(i)
            .map(|v| json!(v))
            .unwrap_or(Value::Null),

        "DATE" => row
            .try_get::<chrono::NaiveDate, _>(i)
            .map(|v| json!(v.format("%Y-%m-%d").to_string()))
            .unwrap_or(Value::Null),

        "TIME" => row
            .try_get::<chrono::NaiveTime, _>(i)
            .map(|v| json!(v.to_string()))
            .unwrap_or(Value::Null),

        "TIMESTAMP" => row
            .try_get::<chrono::NaiveDateTime, _>(i)
            .map(|dt| json!(dt.format("%Y-%m-%dT%H:%M:%S").to_string()))
            .unwrap_or(Value::Null),

        "TIMESTAMPTZ" => row
            .try_get::<chrono::DateTime<chrono::Utc>, _>(i)
            .map(|dt| json!(dt.to_rfc3339()))
            .unwrap_or(Value::Null),

        "INTERVAL" => row
            .try_get::<PgInterval, _>(i)
            .map(|v| json!(format_interval(&v)))
            .unwrap_or(Value::Null),

        "INT2" => row
            .try_get::<i16, _>(i)
            .map(|v| json!(v))
            .unwrap_or(Value::Null),

        "INT4" => row
            .try_get::<i32, _>(i)
            .map(|v| json!(v))
            .unwrap_or(Value::Null),

        "INT8" => row
            .try_get::<i64, _>(i)
            .map(|v| json!(v))
            .unwrap_or(Value::Null),

        "OID" => row
            .try_get::<Oid, _>(i)
            .map(|v| json!(v.0))
            .unwrap_or(Value::Null),

        "FLOAT4" => row
            .try_get::<f32, _>(i)
            .map(float4_to_json)
            .unwrap_or(Value::Null),

        "FLOAT8" => row
            .try_get::<f64, _>(i)
            .map(|v| json!(v))
            .unwrap_or(Value::Null),

        "NUMERIC" => row
            .try_get::<Decimal, _>(i)
            .map(numeric_to_json)
            .unwrap_or(Value::Null),

        "JSON" | "JSONB" => row.try_get::<Value, _>(i).unwrap_or(Value::Null),

        "BOOL" => row
            .try_get::<bool, _>(i)
            .map(|v| json!(v))
            .unwrap_or(Value::Null),

        "TEXT[]" | "VARCHAR[]" | "BPCHAR[]" | "NAME[]" => row
            .try_get::<Vec<Option<String>>, _>(i)
            .map(|v| json!(v))
            .unwrap_or(Value::Null),

        "INT2[]" => row
            .try_get::<Vec<Option<i16>>, _>(i)
            .map(|v| json!(v))
            .unwrap_or(Value::Null),

        "INT4[]" => row
            .try_get::<Vec<Option<i32>>, _>(i)
            .map(|v| json!(v))
            .unwrap_or(Value::Null),

        "INT8[]" => row
            .try_get::<Vec<Option<i64>>, _>(i)
            .map(|v| json!(v))
            .unwrap_or(Value::Null),

        "FLOAT4[]" => row
            .try_get::<Vec<Option<f32>>, _>(i)
            .map(|v| {
                Value::Array(
                    v.into_iter()
                        .map(|f| f.map_or(Value::Null, float4_to_json))
                        .collect(),
                )
            })
            .unwrap_or(Value::Null),

        "FLOAT8[]" => row
            .try_get::<Vec<Option<f64>>, _>(i)
            .map(|v| json!(v))
            .unwrap_or(Value::Null),

        "BOOL[]" => row
            .try_get::<Vec<Option<bool>>, _>(i)
            .map(|v| json!(v))
            .unwrap_or(Value::Null),

        // Results arrive in binary format; raw bytes of other types are not text.
        other => json!(format!("<unsupported {other}>")),
    }
}

/// Shortest decimal form of the `f32`, so `0.1` stays `0.1` once widened.
fn float4_to_json(v: f32) -> Value {
    v.to_string()
        .parse::<f64>()
        .map_or_else(|_| json!(f64::from(v)), |f| json!(f))
}

/// A JSON number when `f64` holds the value exactly, otherwise the decimal
/// string so no digits are lost.
fn numeric_to_json(v: Decimal) -> Value {
    let v = v.normalize();
    match v.to_f64() {
        Some(f) if f.is_finite() && f.to_string() == v.to_string() => json!(f),
        _ => json!(v.to_string()),
    }
}

/// Renders an interval the way `psql` does, e.g. `1 year 2 mons 3 days 04:05:06`.
fn format_interval(interval: &PgInterval) -> String {
    fn unit(n: i64, singular: &str, plural: &str) -> String {
        format!("{n} {}", if n.abs() == 1 { singular } else { plural })
    }

    let mut parts = Vec::new();
    let years = i64::from(interval.months / 12);
    let months = i64::from(interval.months % 12);
    if years != 0 {
        parts.push(unit(years, "year", "years"));
    }
    if months != 0 {
        parts.push(unit(months, "mon", "mons"));
    }
    if interval.days != 0 {
        parts.push(unit(i64::from(interval.days), "day", "days"));
    }

    let micros = interval.microseconds;
    if micros != 0 || parts.is_empty() {
        let sign = if micros < 0 { "-" } else { "" };
        let micros = micros.unsigned_abs();
        let secs = micros / 1_000_000;
        let frac = micros % 1_000_000;
        let mut time = format!(
            "{sign}{:02}:{:02}:{:02}",
            secs / 3600,
            secs / 60 % 60,
            secs % 60
        );
        if frac != 0 {
            time.push_str(format!(".{frac:06}").trim_end_matches('0'));
        }
        parts.push(time);
    }

    parts.join(" ")
}
