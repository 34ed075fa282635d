//! Retry policy with exponential backoff
//!
//! Bounded retry for transient reasoning-channel faults:
//! - Attempts: 1 + max_retries
//! - Delay: base * 2^attempt, capped, ±25% jitter
//! - A server `retry-after` hint raises the delay, never lowers it
//! - No sleep is started that would end past the caller's deadline

use crate::engine::types::EngineError;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::warn;

pub const DEFAULT_MAX_RETRIES: u32 = 3;

const BASE_DELAY_MS: u64 = 500;

const MAX_DELAY_MS: u64 = 8000;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
    enable_jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay_ms: BASE_DELAY_MS,
            max_delay_ms: MAX_DELAY_MS,
            enable_jitter: true,
        }
    }

    /// Policy that never retries
    pub fn none() -> Self {
        Self::new(0)
    }

    pub fn with_base_delay(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    pub fn without_jitter(mut self) -> Self {
        self.enable_jitter = false;
        self
    }

    /// Run `operation` until it succeeds, fails permanently, or the budget runs out
    pub async fn execute<F, Fut, T>(
        &self,
        deadline: Option<Instant>,
        mut operation: F,
    ) -> Result<T, EngineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, EngineError>>,
    {
        let mut attempt = 0;

        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !err.is_retryable() || attempt >= self.max_retries {
                return Err(err);
            }

            let mut delay = self.calculate_delay(attempt);
            if let Some(hint) = err.retry_after_ms() {
                delay = delay.max(Duration::from_millis(hint));
            }

            if let Some(deadline) = deadline {
                if Instant::now() + delay >= deadline {
                    return Err(err);
                }
            }

            attempt += 1;
            warn!(
                attempt,
                max_retries = self.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "engine call failed, retrying"
            );
            sleep(delay).await;
        }
    }

    fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponential = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        let delay_ms = exponential.min(self.max_delay_ms);

        let final_delay = if self.enable_jitter {
            let jitter = (delay_ms / 4) as f64;
            let offset = (rand::random::<f64>() * 2.0 - 1.0) * jitter;
            ((delay_ms as f64) + offset).max(0.0) as u64
        } else {
            delay_ms
        };

        Duration::from_millis(final_delay)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}
