use std::time::Duration;

use crate::config::settings::RetryConfig;

pub const RETRY_ATTEMPTS_DEFAULT: u32 = 3;
pub const RETRY_BASE_DELAY_MS_DEFAULT: u64 = 200;
pub const RETRY_MAX_DELAY_MS_DEFAULT: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySettings {
    pub attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            attempts: RETRY_ATTEMPTS_DEFAULT,
            base_delay_ms: RETRY_BASE_DELAY_MS_DEFAULT,
            max_delay_ms: RETRY_MAX_DELAY_MS_DEFAULT,
        }
    }
}

impl RetrySettings {
    pub fn from_config(retry: &Option<RetryConfig>) -> Self {
        Self {
            attempts: retry.as_ref().and_then(|r| r.attempts).unwrap_or(RETRY_ATTEMPTS_DEFAULT).max(1),
            base_delay_ms: retry.as_ref().and_then(|r| r.base_delay_ms).unwrap_or(RETRY_BASE_DELAY_MS_DEFAULT),
            max_delay_ms: retry.as_ref().and_then(|r| r.max_delay_ms).unwrap_or(RETRY_MAX_DELAY_MS_DEFAULT),
        }
    }

    /// Delay before the attempt following `failed_attempt` (1-based):
    /// base, base*2, base*4 ... capped at max_delay_ms.
    pub fn backoff(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(31);
        let delay = self
            .base_delay_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_delay_ms);
        Duration::from_millis(delay)
    }
}
