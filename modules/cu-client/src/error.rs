use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CuError>;

#[derive(Debug, Error)]
pub enum CuError {
    /// Bad caller input. Never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Unexpected HTTP status on a non-polling call (or a fatal poll response).
    #[error("API error (status {status}): {message}")]
    Transport { status: u16, message: String },

    #[error("Response for {0} carried no Operation-Location header")]
    MissingOperationLocation(String),

    /// The polled operation reached the `failed` state.
    #[error("Operation {operation} failed: {detail}")]
    RemoteOperation { operation: String, detail: String },

    /// The local deadline passed while the operation was still running.
    /// The remote job is not cancelled and may keep running.
    #[error("Operation {operation} timed out after {:.2}s", .timeout.as_secs_f64())]
    Timeout { operation: String, timeout: Duration },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CuError {
    /// Whether a failed poll GET should count as another polling tick
    /// rather than abort the wait.
    pub fn is_transient(&self) -> bool {
        match self {
            CuError::Network(_) => true,
            CuError::Transport { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Whether resubmitting the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, CuError::Validation(_) | CuError::Config(_))
    }
}

impl From<reqwest::Error> for CuError {
    fn from(err: reqwest::Error) -> Self {
        CuError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for CuError {
    fn from(err: serde_json::Error) -> Self {
        CuError::Parse(err.to_string())
    }
}

impl From<reqwest::header::InvalidHeaderValue> for CuError {
    fn from(err: reqwest::header::InvalidHeaderValue) -> Self {
        CuError::Config(format!("invalid header value: {err}"))
    }
}
