use crate::auto_reply::ReplyStyle;

/// Errors surfaced to callers of the core.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),

    #[error("{endpoint} failed: {message}")]
    Backend {
        endpoint: &'static str,
        message: String,
    },

    #[error("{0}")]
    Generation(String),

    #[error("No {0} reply in generation response")]
    MissingSuggestion(ReplyStyle),

    #[error("{0}")]
    Send(String),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// Failures of the streaming transport. Never surfaced past `ConnectionState`.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("stream request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("stream responded with status {0}")]
    Status(reqwest::StatusCode),

    #[error("stream closed by server")]
    Closed,

    #[error("no heartbeat for {0:?}")]
    HeartbeatTimeout(std::time::Duration),

    #[error("{0}")]
    Other(String),
}
