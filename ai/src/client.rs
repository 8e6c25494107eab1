use std::time::Duration;

use config::AIConfig;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};

use crate::error::LlmError;
use crate::types::{ChatCompletionRequest, ChatCompletionResponse, ErrorResponse};

/// Client for an OpenAI-compatible chat-completions API
#[derive(Clone)]
pub struct ChatClient {
    api_key: String,
    base_url: String,
    model: String,
    temperature: Option<f32>,
    http_client: reqwest::Client,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl ChatClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        Self::with_timeout(api_key, model, Duration::from_secs(300))
    }

    fn with_timeout(
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(LlmError::authentication("API key cannot be empty"));
        }

        let http_client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            api_key,
            base_url: "https://api.openai.com".to_string(),
            model: model.into(),
            temperature: None,
            http_client,
        })
    }

    pub fn from_config(conf: &AIConfig) -> Result<Self, LlmError> {
        let api_key = conf
            .api_key
            .clone()
            .ok_or_else(|| LlmError::authentication("OPENAI_API_KEY is not set"))?;

        Ok(
            Self::with_timeout(api_key, &conf.model, Duration::from_secs(conf.timeout_secs))?
                .with_base_url(&conf.base_url)
                .with_temperature(conf.temperature),
        )
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn temperature(&self) -> Option<f32> {
        self.temperature
    }

    pub async fn create_chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                .map_err(|_| LlmError::authentication("Invalid API key format"))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "sending chat completion"
        );

        let response = self
            .http_client
            .post(&url)
            .headers(headers)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let body = response.text().await?;
            return serde_json::from_str(&body)
                .map_err(|e| LlmError::unexpected(format!("Failed to parse response: {e}")));
        }

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        let message = serde_json::from_str::<ErrorResponse>(&error_text)
            .map(|e| e.error.message)
            .unwrap_or(error_text);

        Err(match status {
            StatusCode::BAD_REQUEST => LlmError::invalid_request(message),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::authentication(message),
            StatusCode::TOO_MANY_REQUESTS => LlmError::rate_limit(message, retry_after),
            _ => LlmError::Api {
                status: status.as_u16(),
                message,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatMessage;
    use mockito::Matcher;
    use serde_json::json;

    fn request() -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: "gpt-test".to_string(),
            messages: vec![ChatMessage::user("hi")],
            tools: vec![],
            tool_choice: None,
            temperature: None,
        }
    }

    #[test]
    fn empty_key_is_rejected() {
        let err = ChatClient::new("", "gpt-test").unwrap_err();
        assert!(matches!(err, LlmError::Authentication { .. }));
    }

    #[test]
    fn config_without_key_is_rejected() {
        let err = ChatClient::from_config(&AIConfig::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Authentication failed: OPENAI_API_KEY is not set"
        );
    }

    #[test]
    fn config_values_are_applied() {
        let conf = AIConfig {
            api_key: Some("sk-test".to_string()),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
            ..AIConfig::default()
        };
        let client = ChatClient::from_config(&conf).unwrap();
        assert_eq!(client.model(), "gpt-4o-mini");
        assert_eq!(client.temperature(), Some(0.0));
        assert!(!format!("{client:?}").contains("sk-test"));
    }

    #[tokio::test]
    async fn sends_bearer_token_and_parses_reply() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({"model": "gpt-test"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "id": "chatcmpl-1",
                    "choices": [{
                        "index": 0,
                        "message": {"role": "assistant", "content": "hello"},
                        "finish_reason": "stop"
                    }],
                    "usage": {"prompt_tokens": 3, "completion_tokens": 1, "total_tokens": 4}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = ChatClient::new("sk-test", "gpt-test")
            .unwrap()
            .with_base_url(server.url());
        let response = client.create_chat_completion(&request()).await.unwrap();

        assert_eq!(response.choices[0].message.text(), "hello");
        assert_eq!(response.usage.unwrap().total_tokens, 4);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn provider_error_message_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(401)
            .with_body(r#"{"error":{"message":"Incorrect API key provided"}}"#)
            .create_async()
            .await;

        let client = ChatClient::new("sk-bad", "gpt-test")
            .unwrap()
            .with_base_url(server.url());
        let err = client.create_chat_completion(&request()).await.unwrap_err();

        assert!(
            matches!(err, LlmError::Authentication { ref message } if message == "Incorrect API key provided")
        );
    }

    #[tokio::test]
    async fn rate_limit_keeps_retry_after() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(429)
            .with_header("retry-after", "20")
            .with_body("slow down")
            .create_async()
            .await;

        let client = ChatClient::new("sk-test", "gpt-test")
            .unwrap()
            .with_base_url(server.url());
        let err = client.create_chat_completion(&request()).await.unwrap_err();

        assert!(matches!(
            err,
            LlmError::RateLimit { ref message, retry_after: Some(20) } if message == "slow down"
        ));
    }

    #[tokio::test]
    async fn garbage_success_body_is_unexpected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body("<html>proxy</html>")
            .create_async()
            .await;

        let client = ChatClient::new("sk-test", "gpt-test")
            .unwrap()
            .with_base_url(server.url());
        let err = client.create_chat_completion(&request()).await.unwrap_err();

        assert!(matches!(err, LlmError::UnexpectedResponse { .. }));
    }
}
