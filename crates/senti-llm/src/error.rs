use thiserror::Error;

/// Unified error type for provider calls
#[derive(Error, Debug)]
pub enum LLMError {
    #[error("network error: {0}")]
    Network(String),

    #[error("api error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("rate limited, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("stream error: {0}")]
    Stream(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

impl From<serde_json::Error> for LLMError {
    fn from(e: serde_json::Error) -> Self {
        LLMError::Parse(e.to_string())
    }
}

impl From<reqwest_middleware::Error> for LLMError {
    fn from(e: reqwest_middleware::Error) -> Self {
        LLMError::Network(e.to_string())
    }
}

impl From<reqwest::Error> for LLMError {
    fn from(e: reqwest::Error) -> Self {
        LLMError::Network(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LLMError>;
