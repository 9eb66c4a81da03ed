//! Bounded retries with exponential back-off.

use std::time::Duration;

use tracing::warn;

use crate::error::ServiceError;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub attempts: u32,
    /// Wait after the first failure; doubled after each further failure.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts. Used by tests and offline providers.
    pub fn immediate(attempts: u32) -> Self {
        Self {
            attempts,
            base_delay: Duration::ZERO,
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.min(16))
    }

    /// Runs `op` until it succeeds, fails with a permanent error, or the
    /// attempts are used up. The last error is returned.
    pub fn run<T>(
        &self,
        label: &str,
        mut op: impl FnMut() -> Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        let attempts = self.attempts.max(1);
        let mut attempt = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt + 1 < attempts => {
                    let wait = self.delay_for(attempt);
                    warn!(
                        request = label,
                        attempt = attempt + 1,
                        wait_ms = wait.as_millis() as u64,
                        error = %err,
                        "retrying request"
                    );
                    if !wait.is_zero() {
                        std::thread::sleep(wait);
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
