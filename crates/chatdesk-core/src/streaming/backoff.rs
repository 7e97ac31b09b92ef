use std::time::Duration;

use rand::Rng;

use crate::config::StreamConfig;
use crate::constants::RECONNECT_JITTER;

/// Exponential reconnect delay, capped, with ±20% jitter.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_retries: u32,
    pub jitter_ratio: f64,
}

impl ReconnectPolicy {
    pub fn from_config(config: &StreamConfig) -> Self {
        Self {
            initial_delay: config.initial_delay,
            max_delay: config.max_delay,
            max_retries: config.max_retries,
            jitter_ratio: RECONNECT_JITTER,
        }
    }

    /// `min(initial * 2^retry_count, max)` without jitter.
    pub fn base_delay(&self, retry_count: u32) -> Duration {
        let initial_ms = self.initial_delay.as_millis() as u64;
        let max_ms = self.max_delay.as_millis() as u64;
        let scaled = initial_ms.saturating_mul(1_u64 << retry_count.min(32));
        Duration::from_millis(scaled.min(max_ms))
    }

    /// Base delay scaled by `factor`, clamped to the jitter window.
    pub fn delay_with_factor(&self, retry_count: u32, factor: f64) -> Duration {
        let ratio = self.jitter_ratio.clamp(0.0, 1.0);
        let factor = factor.clamp(1.0 - ratio, 1.0 + ratio);
        let base_ms = self.base_delay(retry_count).as_millis() as f64;
        Duration::from_millis((base_ms * factor).round() as u64)
    }

    /// Delay before reconnect attempt number `retry_count + 1`.
    pub fn delay(&self, retry_count: u32) -> Duration {
        let ratio = self.jitter_ratio.clamp(0.0, 1.0);
        let factor = if ratio > 0.0 {
            rand::thread_rng().gen_range((1.0 - ratio)..=(1.0 + ratio))
        } else {
            1.0
        };
        self.delay_with_factor(retry_count, factor)
    }

    /// No more automatic retries once this many have been used.
    pub fn is_exhausted(&self, retry_count: u32) -> bool {
        retry_count >= self.max_retries
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_config(&StreamConfig::default())
    }
}
