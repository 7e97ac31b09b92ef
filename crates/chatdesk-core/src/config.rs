use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    self, endpoints, EXPERT_CACHE_TTL, HEARTBEAT_TIMEOUT, MAX_MESSAGES_PER_CONVERSATION,
    MAX_RECONNECT_RETRIES, NOTIFICATION_TTL, RECONNECT_INITIAL_DELAY, RECONNECT_MAX_DELAY,
    WATCHDOG_INTERVAL,
};

/// Tuning for the stream connection manager.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    pub heartbeat_timeout: Duration,
    pub watchdog_interval: Duration,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_retries: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout: HEARTBEAT_TIMEOUT,
            watchdog_interval: WATCHDOG_INTERVAL,
            initial_delay: RECONNECT_INITIAL_DELAY,
            max_delay: RECONNECT_MAX_DELAY,
            max_retries: MAX_RECONNECT_RETRIES,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub data_dir: PathBuf,
    pub api_base_url: String,
    pub stream: StreamConfig,
    /// Per-conversation message retention bound
    pub retention: usize,
    pub notification_ttl: Duration,
    pub expert_cache_ttl: Duration,
}

impl CoreConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            api_base_url: constants::API_BASE_URL.to_string(),
            stream: StreamConfig::default(),
            retention: MAX_MESSAGES_PER_CONVERSATION,
            notification_ttl: NOTIFICATION_TTL,
            expert_cache_ttl: EXPERT_CACHE_TTL,
        }
    }

    /// Build from `CHATDESK_DATA_DIR` / `CHATDESK_API_URL`, falling back to defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("CHATDESK_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::default_data_dir());
        let mut config = Self::new(data_dir);
        if let Ok(url) = std::env::var("CHATDESK_API_URL") {
            config = config.with_api_base_url(url);
        }
        config
    }

    fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .map(|dir| dir.join("chatdesk"))
            .unwrap_or_else(|| PathBuf::from("chatdesk_data"))
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_stream(mut self, stream: StreamConfig) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention.max(1);
        self
    }

    pub fn stream_url(&self) -> String {
        format!("{}{}", self.api_base_url, endpoints::MESSAGE_STREAM)
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self::new("chatdesk_data")
    }
}
