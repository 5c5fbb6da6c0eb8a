//! Retry delay schedule.

use std::time::Duration;

use datagate_core::RetryConfig;

/// Delays between attempts: one item per permitted retry, growing by the
/// configured multiplier and capped at `max_backoff_ms`.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: RetryConfig,
    retry: u32,
}

impl Backoff {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            config: config.clone(),
            retry: 0,
        }
    }

    /// Retries handed out so far.
    pub fn retries(&self) -> u32 {
        self.retry
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.retry >= self.config.max_retries {
            return None;
        }
        self.retry += 1;
        Some(self.config.backoff_for(self.retry))
    }
}
