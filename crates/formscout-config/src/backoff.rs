//! Retry delays derived from a [`BackoffConfig`].

use std::time::Duration;

use crate::schema::{BackoffConfig, BackoffKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub kind: BackoffKind,
    pub base: Duration,
    pub max: Duration,
}

impl Backoff {
    pub fn from_config(config: &BackoffConfig) -> Self {
        Self {
            kind: config.kind,
            base: Duration::from_millis(config.base_delay_ms),
            max: Duration::from_millis(config.max_delay_ms.max(config.base_delay_ms)),
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        let retry = retry.max(1);
        let delay = match self.kind {
            BackoffKind::Linear => self.base.saturating_mul(retry),
            BackoffKind::Exponential => {
                let factor = 2u32.saturating_pow(retry - 1);
                self.base.saturating_mul(factor)
            }
        };
        delay.min(self.max)
    }
}
