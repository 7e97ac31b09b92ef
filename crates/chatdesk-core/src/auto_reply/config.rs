use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::constants::{AUTO_REPLY_CONFIG_FILE, DEFAULT_DEBOUNCE_SECONDS};

/// Which of the three drafted variants gets sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStyle {
    Aggressive,
    Conservative,
    #[default]
    Professional,
}

impl fmt::Display for ReplyStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReplyStyle::Aggressive => "aggressive",
            ReplyStyle::Conservative => "conservative",
            ReplyStyle::Professional => "professional",
        };
        f.write_str(name)
    }
}

/// Auto-reply settings (persisted to JSON file)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoReplyConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, alias = "replyStyle")]
    pub reply_style: ReplyStyle,
    #[serde(default, alias = "selectedExpertId")]
    pub selected_expert_id: Option<i64>,
    #[serde(default = "default_debounce_seconds", alias = "debounceSeconds")]
    pub debounce_seconds: u64,
}

fn default_debounce_seconds() -> u64 {
    DEFAULT_DEBOUNCE_SECONDS
}

impl Default for AutoReplyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            reply_style: ReplyStyle::default(),
            selected_expert_id: None,
            debounce_seconds: DEFAULT_DEBOUNCE_SECONDS,
        }
    }
}

impl AutoReplyConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_secs(self.debounce_seconds)
    }
}

/// Shared, optionally file-backed auto-reply settings.
///
/// Readers always get the current value; the engine reads it again at fire
/// time, so a change made while a timer is armed takes effect for that timer.
#[derive(Debug, Clone)]
pub struct SharedAutoReplyConfig {
    inner: Arc<RwLock<AutoReplyConfig>>,
    path: Option<PathBuf>,
}

impl SharedAutoReplyConfig {
    /// In-memory only.
    pub fn new(config: AutoReplyConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
            path: None,
        }
    }

    /// Load from `data_dir`; missing or unreadable file gives the default.
    pub fn load_or_default(data_dir: &Path) -> Self {
        let path = data_dir.join(AUTO_REPLY_CONFIG_FILE);
        let config = Self::load_from_file(&path).unwrap_or_default();
        Self {
            inner: Arc::new(RwLock::new(config)),
            path: Some(path),
        }
    }

    fn load_from_file(path: &Path) -> Option<AutoReplyConfig> {
        let contents = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring corrupt auto-reply config");
                None
            }
        }
    }

    fn save_to_file(&self, config: &AutoReplyConfig) {
        let Some(path) = &self.path else {
            return;
        };
        match serde_json::to_string_pretty(config) {
            Ok(json) => {
                if let Err(e) = fs::write(path, json) {
                    tracing::warn!(path = %path.display(), error = %e, "failed to save auto-reply config");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to encode auto-reply config"),
        }
    }

    pub fn get(&self) -> AutoReplyConfig {
        self.inner.read().clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.read().enabled
    }

    /// Replace and persist. Returns the previous value.
    pub fn set(&self, config: AutoReplyConfig) -> AutoReplyConfig {
        let previous = std::mem::replace(&mut *self.inner.write(), config.clone());
        self.save_to_file(&config);
        previous
    }

    /// Edit in place and persist.
    pub fn update(&self, f: impl FnOnce(&mut AutoReplyConfig)) -> AutoReplyConfig {
        let updated = {
            let mut config = self.inner.write();
            f(&mut config);
            config.clone()
        };
        self.save_to_file(&updated);
        updated
    }
}

impl Default for SharedAutoReplyConfig {
    fn default() -> Self {
        Self::new(AutoReplyConfig::default())
    }
}
