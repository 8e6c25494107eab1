//! The SQL assistant: a model, four tools and a loop that runs them.

mod console;
pub mod prompt;
pub mod report;
pub mod tools;

use std::path::Path;
use std::sync::Arc;

use ai::{ChatClient, LLM, LlmError, MessageObserver};
use config::{AppConfig, Credentials, CredentialsError};
use db::{DatabaseConnector, DbError};

pub use console::ConsolePrinter;
pub use report::{ReportError, ReportWriter};
pub use tools::Toolbelt;

/// Returned instead of an answer when the model keeps calling tools.
pub const ITERATION_LIMIT_MESSAGE: &str = "Agent stopped due to iteration limit or time limit.";

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Credentials(#[from] CredentialsError),
    #[error(transparent)]
    Database(#[from] DbError),
    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// Opens the configured database: a `sqlite:` url when set, Postgres from
/// credentials otherwise. `credentials_file` overrides the configured file.
pub async fn connect_database(
    conf: &AppConfig,
    credentials_file: Option<&Path>,
) -> Result<DatabaseConnector, AgentError> {
    if let Some(url) = conf.database.sqlite_url() {
        return Ok(DatabaseConnector::open(url).await?);
    }

    let file = credentials_file.or(conf.database.credentials_file.as_deref());
    let creds = Credentials::load(file)?;
    Ok(DatabaseConnector::connect(&creds).await?)
}

pub struct Agent {
    client: ChatClient,
    toolbelt: Toolbelt,
    tables: String,
    max_iterations: usize,
    observer: Option<Arc<dyn MessageObserver>>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("client", &self.client)
            .field("max_iterations", &self.max_iterations)
            .finish_non_exhaustive()
    }
}

impl Agent {
    /// Captures the table list once; it is baked into every system prompt.
    pub async fn new(
        client: ChatClient,
        toolbelt: Toolbelt,
        max_iterations: usize,
    ) -> Result<Self, AgentError> {
        let tables = toolbelt.connector().list_db_tables().await?;
        tracing::info!(tables = tables.lines().count(), "agent ready");

        Ok(Self {
            client,
            toolbelt,
            tables,
            max_iterations,
            observer: None,
        })
    }

    pub async fn from_config(
        conf: &AppConfig,
        credentials_file: Option<&Path>,
    ) -> Result<Self, AgentError> {
        let client = ChatClient::from_config(&conf.ai)?;
        let connector = connect_database(conf, credentials_file).await?;
        let toolbelt = Toolbelt::new(Arc::new(connector), ReportWriter::new(&conf.reports.dir));
        Self::new(client, toolbelt, conf.ai.max_iterations).await
    }

    pub fn with_observer(mut self, observer: Arc<dyn MessageObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn toolbelt(&self) -> &Toolbelt {
        &self.toolbelt
    }

    /// Answers one question in a fresh conversation.
    pub async fn ask(&self, question: &str) -> Result<String, AgentError> {
        let mut llm = LLM::new(self.client.clone());
        if let Some(observer) = &self.observer {
            llm = llm.with_observer(observer.clone());
        }

        let tools = self.toolbelt.definitions();
        let system = prompt::system_prompt(&self.tables, &tools);
        llm.set_tools(tools);
        llm.set_system_prompt(system);

        let mut turn = llm.completion(question).await?;
        let mut rounds = 0;

        while !turn.tool_calls.is_empty() {
            if rounds == self.max_iterations {
                tracing::warn!(rounds, "giving up on question");
                return Ok(ITERATION_LIMIT_MESSAGE.to_string());
            }
            rounds += 1;

            let mut results = Vec::with_capacity(turn.tool_calls.len());
            for call in &turn.tool_calls {
                results.push((call.id.clone(), self.toolbelt.call(call).await));
            }
            turn = llm.add_tool_results(results).await?;
        }

        tracing::info!(rounds, "answered question");
        Ok(turn.text)
    }
}
