use thiserror::Error;

pub type Result<T> = std::result::Result<T, LlmError>;

/// Typed failures from the LLM collaborator. `Timeout` and `RateLimited`
/// are transient; `MalformedResponse` is retried by callers and then
/// treated as terminal for that unit of work.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM request timed out")]
    Timeout,

    #[error("LLM rate limited")]
    RateLimited,

    #[error("malformed LLM response: {0}")]
    MalformedResponse(String),

    #[error("LLM API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),
}

impl LlmError {
    /// Transient failures are worth a backoff-and-retry at the call site.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmError::Timeout | LlmError::RateLimited | LlmError::MalformedResponse(_)
        )
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}
