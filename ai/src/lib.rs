mod client;
mod error;
pub mod types;

use std::fmt::Display;
use std::sync::Arc;

pub use client::ChatClient;
pub use error::LlmError;
pub use types::{ChatMessage, Function, Role, Tool, ToolType};

// Re-export types that consumers will need to create and use tools
pub use serde_json::{Value, json};
pub use std::collections::HashMap;

use types::ChatCompletionRequest;

/// Information about a tool call from the model
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolCallInfo {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// One reply from the model
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Turn {
    pub text: String,
    pub tool_calls: Vec<ToolCallInfo>,
}

/// Sees every message list right before it is sent to the model.
pub trait MessageObserver: Send + Sync {
    fn on_chat_model_start(&self, messages: &[ChatMessage]);
}

pub struct LLM {
    client: ChatClient,
    history: Vec<ChatMessage>,
    tools: Vec<Tool>,
    observer: Option<Arc<dyn MessageObserver>>,
}

impl std::fmt::Debug for LLM {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LLM")
            .field("client", &self.client)
            .field("history", &self.history.len())
            .field("tools", &self.tools.len())
            .finish_non_exhaustive()
    }
}

impl LLM {
    pub fn new(client: ChatClient) -> Self {
        LLM {
            client,
            history: vec![],
            tools: vec![],
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn MessageObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn add_tool(&mut self, tool: Tool) {
        self.tools.push(tool);
    }

    /// Set all tools for the LLM, replacing any existing tools
    pub fn set_tools(&mut self, tools: Vec<Tool>) {
        self.tools = tools;
    }

    /// Replaces the system prompt if one is already set.
    pub fn set_system_prompt(&mut self, prompt: impl Display) {
        let message = ChatMessage::system(prompt.to_string());
        match self.history.first_mut() {
            Some(first) if first.role == Role::System => *first = message,
            _ => self.history.insert(0, message),
        }
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Sends `prompt` as a user message and returns the model's reply.
    pub async fn completion(&mut self, prompt: impl Display) -> Result<Turn, LlmError> {
        self.history.push(ChatMessage::user(prompt.to_string()));
        self.send().await
    }

    /// Answers the tool calls of the previous turn, as `(tool_call_id, result)`
    /// pairs, and continues the conversation.
    pub async fn add_tool_results(
        &mut self,
        results: Vec<(String, String)>,
    ) -> Result<Turn, LlmError> {
        self.history.extend(
            results
                .into_iter()
                .map(|(id, content)| ChatMessage::tool(id, content)),
        );
        self.send().await
    }

    async fn send(&mut self) -> Result<Turn, LlmError> {
        if let Some(observer) = &self.observer {
            observer.on_chat_model_start(&self.history);
        }

        let request = ChatCompletionRequest {
            model: self.client.model().to_string(),
            messages: self.history.clone(),
            tools: self.tools.clone(),
            tool_choice: (!self.tools.is_empty()).then(|| "auto".to_string()),
            temperature: self.client.temperature(),
        };

        let response = self.client.create_chat_completion(&request).await?;
        if let Some(usage) = &response.usage {
            tracing::debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "completion usage"
            );
        }
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::unexpected("response contained no choices"))?;
        tracing::debug!(finish_reason = ?choice.finish_reason, "completion finished");
        let message = choice.message;

        let turn = Turn {
            text: message.text().to_string(),
            tool_calls: message
                .tool_calls
                .iter()
                .map(|call| ToolCallInfo {
                    id: call.id.clone(),
                    name: call.function.name.clone(),
                    arguments: call.function.arguments.clone(),
                })
                .collect(),
        };

        self.history.push(message);
        Ok(turn)
    }

    /// Get the tools that are configured for this LLM
    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }
}

/// Helper function to create a tool with the given name, description, and parameters
///
/// # Example
/// ```rust
/// use ai::{create_tool, json, HashMap, Value};
///
/// let parameters: HashMap<String, Value> = serde_json::from_value(json!({
///     "type": "object",
///     "properties": {
///         "query": {
///             "type": "string",
///             "description": "The SQL query to execute",
///         },
///     },
///     "required": ["query"],
/// })).unwrap();
///
/// let tool = create_tool(
///     "run_sql_query",
///     "Run a postgresql SELECT query, returns the result of the query.",
///     parameters,
/// );
/// assert_eq!(tool.function.name, "run_sql_query");
/// ```
pub fn create_tool(
    name: impl Into<String>,
    description: impl Into<String>,
    parameters: HashMap<String, Value>,
) -> Tool {
    Tool {
        tp: ToolType::Function,
        function: Function {
            name: name.into(),
            description: Some(description.into()),
            parameters: Some(parameters),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<Vec<Role>>>,
    }

    impl MessageObserver for Recorder {
        fn on_chat_model_start(&self, messages: &[ChatMessage]) {
            self.seen
                .lock()
                .unwrap()
                .push(messages.iter().map(|m| m.role).collect());
        }
    }

    fn no_params() -> HashMap<String, Value> {
        serde_json::from_value(json!({"type": "object", "properties": {}})).unwrap()
    }

    #[test]
    fn system_prompt_is_replaced_not_duplicated() {
        let client = ChatClient::new("sk-test", "gpt-test").unwrap();
        let mut llm = LLM::new(client);
        llm.set_system_prompt("first");
        llm.set_system_prompt("second");

        assert_eq!(llm.history().len(), 1);
        assert_eq!(llm.history()[0].text(), "second");
    }

    #[tokio::test]
    async fn tool_call_round_trip() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("POST", "/v1/chat/completions")
            .match_body(Matcher::PartialJson(json!({
                "tool_choice": "auto",
                "tools": [{"type": "function", "function": {"name": "list_tables"}}]
            })))
            .with_status(200)
            .with_body(
                json!({
                    "choices": [{"message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": {"name": "list_tables", "arguments": "{}"}
                        }]
                    }}]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let recorder = Arc::new(Recorder::default());
        let client = ChatClient::new("sk-test", "gpt-test")
            .unwrap()
            .with_base_url(server.url());
        let mut llm = LLM::new(client).with_observer(recorder.clone());
        llm.set_system_prompt("You can access a database.");
        llm.add_tool(create_tool("list_tables", "List all tables", no_params()));

        let turn = llm.completion("what tables exist?").await.unwrap();
        first.assert_async().await;
        first.remove_async().await;

        assert_eq!(turn.text, "");
        assert_eq!(
            turn.tool_calls,
            vec![ToolCallInfo {
                id: "call_1".to_string(),
                name: "list_tables".to_string(),
                arguments: "{}".to_string(),
            }]
        );

        let second = server
            .mock("POST", "/v1/chat/completions")
            .match_body(Matcher::PartialJson(json!({
                "messages": [
                    {"role": "system"},
                    {"role": "user"},
                    {"role": "assistant"},
                    {"role": "tool", "tool_call_id": "call_1", "content": "users\norders"}
                ]
            })))
            .with_status(200)
            .with_body(
                json!({"choices": [{"message": {"role": "assistant", "content": "users and orders"}}]})
                    .to_string(),
            )
            .create_async()
            .await;

        let turn = llm
            .add_tool_results(vec![("call_1".to_string(), "users\norders".to_string())])
            .await
            .unwrap();
        second.assert_async().await;

        assert_eq!(turn.text, "users and orders");
        assert!(turn.tool_calls.is_empty());
        assert_eq!(llm.history().len(), 5);
        assert_eq!(
            *recorder.seen.lock().unwrap(),
            vec![
                vec![Role::System, Role::User],
                vec![Role::System, Role::User, Role::Assistant, Role::Tool],
            ]
        );
    }

    #[tokio::test]
    async fn empty_choices_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices": []}"#)
            .create_async()
            .await;

        let client = ChatClient::new("sk-test", "gpt-test")
            .unwrap()
            .with_base_url(server.url());
        let mut llm = LLM::new(client);
        let err = llm.completion("hello").await.unwrap_err();
        assert!(matches!(err, LlmError::UnexpectedResponse { .. }));
    }
}
