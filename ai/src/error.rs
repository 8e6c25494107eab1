/// Errors talking to the hosted chat-completions API
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// HTTP 401/403, or no usable API key
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// HTTP 429
    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        retry_after: Option<u64>,
    },

    /// HTTP 400
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    /// The provider answered 2xx with something we could not use
    #[error("Unexpected response: {message}")]
    UnexpectedResponse { message: String },
}

impl LlmError {
    pub fn authentication<S: Into<String>>(message: S) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    pub fn rate_limit<S: Into<String>>(message: S, retry_after: Option<u64>) -> Self {
        Self::RateLimit {
            message: message.into(),
            retry_after,
        }
    }

    pub fn invalid_request<S: Into<String>>(message: S) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn unexpected<S: Into<String>>(message: S) -> Self {
        Self::UnexpectedResponse {
            message: message.into(),
        }
    }
}
