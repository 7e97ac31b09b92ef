//! Application-wide constants
//!
//! Centralized location for timing values, limits and endpoint paths
//! that are used across multiple modules.

use std::time::Duration;

/// Default backend base URL
pub const API_BASE_URL: &str = "http://localhost:5000";

// Stream connection defaults
/// Silence longer than this marks the stream as dead
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(30);
/// How often the watchdog checks for silence
pub const WATCHDOG_INTERVAL: Duration = Duration::from_secs(10);
pub const RECONNECT_INITIAL_DELAY: Duration = Duration::from_millis(1000);
pub const RECONNECT_MAX_DELAY: Duration = Duration::from_millis(30_000);
pub const MAX_RECONNECT_RETRIES: u32 = 10;
/// Jitter applied to every reconnect delay (±20%)
pub const RECONNECT_JITTER: f64 = 0.2;

// Session defaults
/// Most recent messages kept per conversation
pub const MAX_MESSAGES_PER_CONVERSATION: usize = 100;
/// Messages of history sent along with a generation request
pub const AUTO_REPLY_HISTORY_LEN: usize = 10;
pub const MESSAGE_PREVIEW_LENGTH: usize = 50;

// Auto-reply defaults
pub const DEFAULT_DEBOUNCE_SECONDS: u64 = 5;

// Notification defaults
pub const NOTIFICATION_TTL: Duration = Duration::from_secs(5);

// Cache defaults
pub const EXPERT_CACHE_TTL: Duration = Duration::from_secs(2 * 60);
pub const EXPERT_CACHE_KEY: &str = "ai-experts-list";

// Local persistence file names (inside the data dir)
pub const SESSION_SNAPSHOT_FILE: &str = "session_snapshot.bin";
pub const AUTO_REPLY_CONFIG_FILE: &str = "auto_reply_config.json";

// Backend endpoints
pub mod endpoints {
    pub const MESSAGE_STREAM: &str = "/api/messages/stream";
    pub const SEND_MESSAGE: &str = "/api/send";
    pub const AI_PROMPTS: &str = "/api/ai/prompts";
    pub const AI_GENERATE: &str = "/api/ai/generate";
    /// Followed by the percent-encoded conversation id
    pub const AI_CONTEXT_SESSION: &str = "/api/ai/context/session";
}
