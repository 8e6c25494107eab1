pub mod connector;
pub mod postgres;
pub mod sqlite;

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

pub use connector::{DatabaseConnector, QueryOutcome, ensure_select};

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Only SELECT statements are allowed")]
    NotSelect,
    #[error("no such table: {0}")]
    NoSuchTable(String),
    #[error("could not connect to the database: {0}")]
    Connect(#[source] sqlx::Error),
    #[error(transparent)]
    Driver(#[from] sqlx::Error),
}

/// Trait defining the interface for database operations
#[async_trait]
pub trait Database: Send {
    /// Names of the user tables in the default schema, sorted.
    async fn list_tables(&mut self) -> Result<Vec<String>, DbError>;

    /// Column names of `table` in declaration order. Empty when the table
    /// does not exist.
    async fn table_columns(&mut self, table: &str) -> Result<Vec<String>, DbError>;

    /// Execute a query and return the rows as JSON values, together with
    /// `(column_name, column_type)` headers.
    async fn get_results(&mut self, query: &str) -> Result<DatabaseResult, DbError>;
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct DatabaseResult {
    pub headers: Vec<(String, String)>,
    pub rows: Vec<Vec<Value>>,
}

impl DatabaseResult {
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.headers.iter().map(|(name, _)| name.as_str())
    }

    /// Rows keyed by column name.
    pub fn records(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.column_names()
                    .map(str::to_string)
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }
}

impl fmt::Display for DatabaseResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let records = Value::Array(self.records().into_iter().map(Value::Object).collect());
        write!(f, "{records}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn records_pair_values_with_headers() {
        let result = DatabaseResult {
            headers: vec![
                ("id".to_string(), "INT4".to_string()),
                ("name".to_string(), "TEXT".to_string()),
            ],
            rows: vec![vec![json!(1), json!("Ada")], vec![json!(2), Value::Null]],
        };

        assert_eq!(
            result.to_string(),
            r#"[{"id":1,"name":"Ada"},{"id":2,"name":null}]"#
        );
    }

    #[test]
    fn empty_result_renders_as_empty_list() {
        assert_eq!(DatabaseResult::default().to_string(), "[]");
    }
}
