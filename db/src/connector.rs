//! Guarded access to the agent's database.
//!
//! [`DatabaseConnector`] owns one live connection for the lifetime of the
//! process and is the only way the rest of the workspace touches the
//! database. Introspection calls pass errors through; [`DatabaseConnector::execute_query`]
//! refuses anything that is not a `SELECT` and turns driver failures into a
//! message the model can read.

use config::Credentials;
use tokio::sync::Mutex;

use crate::postgres::PostgresDatabase;
use crate::sqlite::SqliteDatabase;
use crate::{Database, DatabaseResult, DbError};

/// Result of a query that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Rows(DatabaseResult),
    /// The database rejected the query; the text explains why.
    Failed(String),
}

impl std::fmt::Display for QueryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryOutcome::Rows(result) => write!(f, "{result}"),
            QueryOutcome::Failed(message) => f.write_str(message),
        }
    }
}

/// Fails unless `query` starts with `select`, ignoring case and leading whitespace.
pub fn ensure_select(query: &str) -> Result<(), DbError> {
    let head = query.trim_start();
    match head.get(..6) {
        Some(keyword) if keyword.eq_ignore_ascii_case("select") => Ok(()),
        _ => Err(DbError::NotSelect),
    }
}

pub struct DatabaseConnector {
    database: Mutex<Box<dyn Database>>,
}

impl std::fmt::Debug for DatabaseConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConnector").finish_non_exhaustive()
    }
}

impl DatabaseConnector {
    /// Connects to Postgres with the given credentials.
    pub async fn connect(creds: &Credentials) -> Result<Self, DbError> {
        let database = PostgresDatabase::new(creds).await?;
        Ok(Self::from_database(Box::new(database)))
    }

    /// Opens a SQLite database by url.
    pub async fn open(url: &str) -> Result<Self, DbError> {
        let database = SqliteDatabase::open(url).await?;
        Ok(Self::from_database(Box::new(database)))
    }

    pub fn from_database(database: Box<dyn Database>) -> Self {
        Self {
            database: Mutex::new(database),
        }
    }

    /// Table names, one per line.
    pub async fn list_db_tables(&self) -> Result<String, DbError> {
        let tables = self.database.lock().await.list_tables().await?;
        Ok(tables.join("\n"))
    }

    pub async fn get_table_columns(&self, table_name: &str) -> Result<Vec<String>, DbError> {
        let columns = self
            .database
            .lock()
            .await
            .table_columns(table_name.trim())
            .await?;

        if columns.is_empty() {
            return Err(DbError::NoSuchTable(table_name.trim().to_string()));
        }
        Ok(columns)
    }

    /// Runs a `SELECT`. Anything else is rejected before reaching the
    /// database; failures inside the database come back as
    /// [`QueryOutcome::Failed`].
    pub async fn execute_query(&self, query: &str) -> Result<QueryOutcome, DbError> {
        ensure_select(query)?;

        match self.database.lock().await.get_results(query).await {
            Ok(result) => {
                tracing::debug!(rows = result.rows.len(), "query succeeded");
                Ok(QueryOutcome::Rows(result))
            }
            Err(err) => {
                tracing::warn!(error = %err, "query failed");
                Ok(QueryOutcome::Failed(format!(
                    "An error occurred when attempting to process the query: {err}"
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls so tests can prove rejected queries never reach the backend.
    struct Recording {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Database for Recording {
        async fn list_tables(&mut self) -> Result<Vec<String>, DbError> {
            Ok(vec!["users".to_string()])
        }

        async fn table_columns(&mut self, _table: &str) -> Result<Vec<String>, DbError> {
            Ok(vec![])
        }

        async fn get_results(&mut self, _query: &str) -> Result<DatabaseResult, DbError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(DatabaseResult::default())
        }
    }

    async fn shop() -> DatabaseConnector {
        let mut db = SqliteDatabase::open("sqlite::memory:").await.unwrap();
        db.execute(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, journey TEXT);
             CREATE TABLE journeys (id INTEGER PRIMARY KEY, title TEXT);
             INSERT INTO users VALUES (1, 'Ada', 'DevOps'), (2, 'Linus', 'DevOps'), (3, 'Grace', 'Data');",
        )
        .await
        .unwrap();
        DatabaseConnector::from_database(Box::new(db))
    }

    #[test]
    fn select_prefix_is_case_insensitive() {
        assert!(ensure_select("SELECT 1").is_ok());
        assert!(ensure_select("select 1").is_ok());
        assert!(ensure_select("  \n\tSeLeCt * FROM users").is_ok());
    }

    #[test]
    fn everything_else_is_rejected() {
        for query in [
            "DELETE FROM users",
            "drop table users",
            "UPDATE users SET name = 'x'",
            "INSERT INTO users VALUES (4, 'x', 'y')",
            "WITH t AS (SELECT 1) SELECT * FROM t",
            "sel",
            "",
            "   ",
            "-- comment\nSELECT 1",
        ] {
            assert!(
                matches!(ensure_select(query), Err(DbError::NotSelect)),
                "{query:?} should be rejected"
            );
        }
    }

    #[test]
    fn multibyte_input_does_not_panic() {
        assert!(ensure_select("sélect 1").is_err());
        assert!(ensure_select("ß").is_err());
    }

    #[tokio::test]
    async fn rejected_queries_never_reach_the_database() {
        let calls = Arc::new(AtomicUsize::new(0));
        let connector = DatabaseConnector::from_database(Box::new(Recording {
            calls: calls.clone(),
        }));

        let err = connector.execute_query("TRUNCATE users").await.unwrap_err();
        assert_eq!(err.to_string(), "Only SELECT statements are allowed");
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        connector.execute_query("select 1").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn tables_match_live_schema() {
        let connector = shop().await;
        assert_eq!(connector.list_db_tables().await.unwrap(), "journeys\nusers");
    }

    #[tokio::test]
    async fn columns_match_live_schema() {
        let connector = shop().await;
        assert_eq!(
            connector.get_table_columns("users").await.unwrap(),
            vec!["id", "name", "journey"]
        );
    }

    #[tokio::test]
    async fn unknown_table_is_an_error() {
        let connector = shop().await;
        let err = connector.get_table_columns("nope").await.unwrap_err();
        assert!(matches!(err, DbError::NoSuchTable(name) if name == "nope"));
    }

    #[tokio::test]
    async fn select_returns_rows() {
        let connector = shop().await;
        let outcome = connector
            .execute_query("SELECT count(*) AS n FROM users WHERE journey = 'DevOps'")
            .await
            .unwrap();

        let QueryOutcome::Rows(result) = outcome else {
            panic!("expected rows, got {outcome:?}");
        };
        assert_eq!(result.rows, vec![vec![json!(2)]]);
        assert_eq!(result.to_string(), r#"[{"n":2}]"#);
    }

    #[tokio::test]
    async fn driver_errors_become_messages() {
        let connector = shop().await;
        let outcome = connector
            .execute_query("SELECT * FROM no_such_table")
            .await
            .unwrap();

        let QueryOutcome::Failed(message) = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert!(message.starts_with("An error occurred when attempting to process the query:"));
        assert!(message.contains("no_such_table"));
    }
}
