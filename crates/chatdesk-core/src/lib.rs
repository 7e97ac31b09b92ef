pub mod auto_reply;
pub mod backend;
pub mod cache;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod models;
pub mod notifications;
pub mod runtime;
pub mod store;
pub mod streaming;
pub mod tracing_setup;

#[cfg(test)]
pub(crate) mod test_support;

pub use auto_reply::{AutoReplyConfig, AutoReplyEngine, ReplyStyle};
pub use backend::{ChatBackend, HttpBackend};
pub use config::{CoreConfig, StreamConfig};
pub use error::{CoreError, Result, StreamError};
pub use events::CoreEvent;
pub use models::{ConversationId, ConversationState, Expert, Message};
pub use notifications::{Notification, NotificationCenter, NotificationKind};
pub use runtime::CoreRuntime;
pub use store::{SessionStore, SharedSessionStore};
pub use streaming::{ConnectionState, StreamConnectionManager};
