//! The tools handed to the model.

use std::sync::Arc;

use ai::{HashMap, Tool, ToolCallInfo, Value, create_tool, json};
use db::{DatabaseConnector, DbError};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::report::ReportWriter;

pub const RUN_SQL_QUERY: &str = "run_sql_query";
pub const LIST_TABLES: &str = "list_tables";
pub const LIST_COLUMNS: &str = "list_columns";
pub const WRITE_REPORT: &str = "write_report";

#[derive(Debug, Deserialize)]
struct RunQueryArgs {
    query: String,
}

#[derive(Debug, Deserialize)]
struct ListColumnsArgs {
    table_name: String,
}

#[derive(Debug, Deserialize)]
struct WriteReportArgs {
    file_name: String,
    html: String,
}

/// Database and report tools, dispatched by name.
#[derive(Debug, Clone)]
pub struct Toolbelt {
    connector: Arc<DatabaseConnector>,
    reports: ReportWriter,
}

impl Toolbelt {
    pub fn new(connector: Arc<DatabaseConnector>, reports: ReportWriter) -> Self {
        Self { connector, reports }
    }

    pub fn connector(&self) -> &DatabaseConnector {
        &self.connector
    }

    pub fn definitions(&self) -> Vec<Tool> {
        vec![
            create_tool(
                RUN_SQL_QUERY,
                "Run a postgresql SELECT query, returns the result of the query.",
                schema(json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "The SELECT statement to run.",
                        },
                    },
                    "required": ["query"],
                })),
            ),
            create_tool(
                LIST_TABLES,
                "List all tables in the database. Returns the table names.",
                schema(json!({"type": "object", "properties": {}})),
            ),
            create_tool(
                LIST_COLUMNS,
                "Given a table name as an input, Returns the column names for that table.",
                schema(json!({
                    "type": "object",
                    "properties": {
                        "table_name": {
                            "type": "string",
                            "description": "Name of the table to describe.",
                        },
                    },
                    "required": ["table_name"],
                })),
            ),
            create_tool(
                WRITE_REPORT,
                "Write an HTML report to a file. Use this tool whenever someone asks for a report.",
                schema(json!({
                    "type": "object",
                    "properties": {
                        "file_name": {
                            "type": "string",
                            "description": "File name of the report, e.g. report.html.",
                        },
                        "html": {
                            "type": "string",
                            "description": "The complete HTML document.",
                        },
                    },
                    "required": ["file_name", "html"],
                })),
            ),
        ]
    }

    /// Runs one tool call. Failures are reported back to the model as text.
    pub async fn call(&self, call: &ToolCallInfo) -> String {
        tracing::info!(tool = %call.name, id = %call.id, "calling tool");

        let result = match call.name.as_str() {
            RUN_SQL_QUERY => match parse_args::<RunQueryArgs>(call) {
                Ok(args) => self.run_sql_query(&args.query).await,
                Err(message) => message,
            },
            LIST_TABLES => self.list_tables().await,
            LIST_COLUMNS => match parse_args::<ListColumnsArgs>(call) {
                Ok(args) => self.list_columns(&args.table_name).await,
                Err(message) => message,
            },
            WRITE_REPORT => match parse_args::<WriteReportArgs>(call) {
                Ok(args) => self.write_report(&args.file_name, &args.html).await,
                Err(message) => message,
            },
            other => format!("Error: unknown tool {other:?}"),
        };

        tracing::debug!(tool = %call.name, result = %result, "tool finished");
        result
    }

    async fn run_sql_query(&self, query: &str) -> String {
        match self.connector.execute_query(query).await {
            Ok(outcome) => outcome.to_string(),
            Err(err) => error_text(&err),
        }
    }

    async fn list_tables(&self) -> String {
        self.connector
            .list_db_tables()
            .await
            .unwrap_or_else(|err| error_text(&err))
    }

    async fn list_columns(&self, table_name: &str) -> String {
        match self.connector.get_table_columns(table_name).await {
            Ok(columns) => columns.join(", "),
            Err(err) => error_text(&err),
        }
    }

    async fn write_report(&self, file_name: &str, html: &str) -> String {
        match self.reports.write(file_name, html).await {
            Ok(path) => format!("Report written to {}", path.display()),
            Err(err) => format!("Error: {err}"),
        }
    }
}

fn error_text(err: &DbError) -> String {
    format!("Error: {err}")
}

fn parse_args<T: DeserializeOwned>(call: &ToolCallInfo) -> Result<T, String> {
    serde_json::from_str(&call.arguments)
        .map_err(|e| format!("Error: invalid arguments for {}: {e}", call.name))
}

fn schema(value: Value) -> HashMap<String, Value> {
    match value {
        Value::Object(map) => map.into_iter().collect(),
        _ => HashMap::new(),
    }
}
