use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("circuit breaker is open")]
    CircuitOpen,
    #[error("expected {expected} results, got {got}")]
    ResultCount { expected: usize, got: usize },
    #[error("batch request failed: {0}")]
    BatchFailed(String),
    #[error("batcher is shut down")]
    Closed,
}

impl ClientError {
    /// Whether retrying later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Http(e) => e.is_timeout() || e.is_connect(),
            ClientError::Server { status, .. } => *status >= 500 || *status == 429,
            ClientError::CircuitOpen | ClientError::BatchFailed(_) => true,
            ClientError::Json(_) | ClientError::ResultCount { .. } | ClientError::Closed => false,
        }
    }
}
