use thiserror::Error;

/// Error taxonomy for the research core.
///
/// `Validation`, `NotFound`, and `Unavailable` surface as structured
/// failures of an orchestrator call. `Timeout` and `Upstream` are captured
/// inside `ModelResponse::error` by the executor and never abort a request
/// — partial success with a qualified synthesis is the designed behavior.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResearchError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("model not found: {0}")]
    NotFound(String),

    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    #[error("timeout after {0}ms")]
    Timeout(u64),

    #[error("upstream error: {0}")]
    Upstream(String),
}

impl ResearchError {
    /// Short machine-readable kind, used as the `error` field on
    /// `ModelResponse` and as the MCP error code string.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Validation",
            Self::NotFound(_) => "NotFound",
            Self::Unavailable(_) => "Unavailable",
            Self::Timeout(_) => "Timeout",
            Self::Upstream(_) => "Upstream",
        }
    }

    /// Sanitized message safe for returning across the tool boundary.
    /// Never leaks raw upstream response bodies beyond a short excerpt.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::NotFound(model) => format!("model not found: {model}"),
            Self::Unavailable(msg) => msg.clone(),
            Self::Timeout(ms) => format!("request timed out after {ms}ms"),
            Self::Upstream(msg) => {
                let excerpt: String = msg.chars().take(300).collect();
                format!("upstream error: {excerpt}")
            }
        }
    }
}

impl From<reqwest::Error> for ResearchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ResearchError::Timeout(0)
        } else if e.is_connect() {
            ResearchError::Unavailable(format!("cannot reach upstream: {e}"))
        } else {
            ResearchError::Upstream(e.to_string())
        }
    }
}
