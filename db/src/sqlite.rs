use std::str::FromStr;

use crate::{DatabaseResult, DbError};

use super::Database;
use serde_json::{Value, json};
use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{Column, ConnectOptions, Row, SqliteConnection, TypeInfo, ValueRef};

/// A single SQLite connection, used for local database files and tests.
pub struct SqliteDatabase {
    connection: SqliteConnection,
}

impl std::fmt::Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDatabase").finish_non_exhaustive()
    }
}

impl SqliteDatabase {
    /// Opens an existing database. `sqlite::memory:` gives a private in-memory one.
    pub async fn open(url: &str) -> Result<Self, DbError> {
        let options = SqliteConnectOptions::from_str(url).map_err(DbError::Connect)?;
        let connection = options.connect().await.map_err(DbError::Connect)?;
        tracing::info!(url, "opened sqlite database");
        Ok(Self { connection })
    }

    /// Runs one or more statements without the read-only guard.
    pub async fn execute(&mut self, sql: &str) -> Result<u64, DbError> {
        let result = sqlx::raw_sql(sql).execute(&mut self.connection).await?;
        Ok(result.rows_affected())
    }
}

#[async_trait::async_trait]
impl Database for SqliteDatabase {
    async fn list_tables(&mut self) -> Result<Vec<String>, DbError> {
        let tables = sqlx::query_scalar::<_, String>(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&mut self.connection)
        .await?;

        Ok(tables)
    }

    async fn table_columns(&mut self, table: &str) -> Result<Vec<String>, DbError> {
        let columns =
            sqlx::query_scalar::<_, String>("SELECT name FROM pragma_table_info(?1) ORDER BY cid")
                .bind(table)
                .fetch_all(&mut self.connection)
                .await?;

        Ok(columns)
    }

    async fn get_results(&mut self, query: &str) -> Result<DatabaseResult, DbError> {
        let rows = sqlx::query(query).fetch_all(&mut self.connection).await?;

        let mut results = DatabaseResult::default();

        let Some(first) = rows.first() else {
            return Ok(results);
        };

        results.headers = first
            .columns()
            .iter()
            .map(|col| (col.name().to_string(), col.type_info().name().to_string()))
            .collect();

        results.rows = rows
            .iter()
            .map(|row| (0..row.columns().len()).map(|i| decode_value(row, i)).collect())
            .collect();

        Ok(results)
    }
}

// SQLite columns are loosely typed, so decode by the storage class of the
// value rather than the declared column type.
fn decode_value(row: &SqliteRow, i: usize) -> Value {
    let Ok(raw) = row.try_get_raw(i) else {
        return Value::Null;
    };
    if raw.is_null() {
        return Value::Null;
    }

    match raw.type_info().name() {
        "INTEGER" => row
            .try_get_unchecked::<i64, _>(i)
            .map(|v| json!(v))
            .unwrap_or(Value::Null),
        "REAL" => row
            .try_get_unchecked::<f64, _>(i)
            .map(|v| json!(v))
            .unwrap_or(Value::Null),
        "TEXT" => row
            .try_get_unchecked::<String, _>(i)
            .map(Value::String)
            .unwrap_or(Value::Null),
        _ => row
            .try_get_unchecked::<Vec<u8>, _>(i)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .map_or(Value::Null, Value::String),
    }
}
