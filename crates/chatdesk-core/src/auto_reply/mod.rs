//! Debounced automatic replies to incoming customer messages.

pub mod config;
pub mod debounce;
pub mod engine;

pub use config::{AutoReplyConfig, ReplyStyle, SharedAutoReplyConfig};
pub use debounce::KeyedDebouncer;
pub use engine::AutoReplyEngine;
