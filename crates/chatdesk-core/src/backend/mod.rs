//! External collaborators: the backend's REST endpoints.

pub mod http;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Expert;

pub use http::HttpBackend;
pub use types::{GenerateReplyRequest, HistoryEntry, ReplySuggestions};

/// Everything the core asks of the backend besides the event stream.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Draft reply variants for the latest customer message.
    async fn generate_reply(&self, request: &GenerateReplyRequest) -> Result<ReplySuggestions>;

    /// Deliver `message` to `recipient`. The confirmation comes back through the event stream.
    async fn send_message(&self, recipient: &str, message: &str) -> Result<()>;

    async fn list_experts(&self) -> Result<Vec<Expert>>;

    /// Drop the backend's stored context for a conversation; returns the deleted row count.
    async fn delete_session(&self, conversation_id: &str) -> Result<u64>;
}
