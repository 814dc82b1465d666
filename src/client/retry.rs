// Per-page retry with capped, jittered exponential backoff

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// How often a failed page request is sent again, and how long to wait between sends.
///
/// `max_attempts` counts every send, so `1` means the page is never retried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Fraction of each pause that is randomised, in `[0, 1]`.
    pub jitter: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, initial_backoff_ms: u64, max_backoff_ms: u64, jitter: f64) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms,
            max_backoff_ms,
            jitter,
        }
        .normalized()
    }

    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 500,
            max_backoff_ms: 10_000,
            jitter: 0.1,
        }
    }

    /// Brings hand-written or deserialized values back into range.
    pub fn normalized(&self) -> Self {
        let initial_backoff_ms = self.initial_backoff_ms.max(1);
        let jitter = if self.jitter.is_finite() {
            self.jitter.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            max_attempts: self.max_attempts.max(1),
            initial_backoff_ms,
            max_backoff_ms: self.max_backoff_ms.max(initial_backoff_ms),
            jitter,
        }
    }

    // Pause before the `retry`-th resend (1-based): initial * 2^(retry-1), capped.
    fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u64.checked_shl(retry.saturating_sub(1)).unwrap_or(u64::MAX);
        let ceiling = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);

        if self.jitter == 0.0 {
            return Duration::from_millis(ceiling);
        }
        let scale = rand::thread_rng().gen_range((1.0 - self.jitter)..=(1.0 + self.jitter));
        Duration::from_millis((ceiling as f64 * scale).round() as u64)
    }

    /// Calls `op` with the 1-based attempt number until it succeeds.
    ///
    /// Gives up with the last error once attempts are exhausted or
    /// `retryable` says the error is final.
    pub async fn run<F, Fut, T, E, R>(&self, mut op: F, retryable: R) -> Result<T, E>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        R: Fn(&E) -> bool,
    {
        let mut attempt = 1;
        loop {
            let err = match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if attempt >= self.max_attempts || !retryable(&err) {
                return Err(err);
            }

            let pause = self.backoff(attempt as u32);
            warn!(
                "attempt {}/{} failed: {}; next try in {:?}",
                attempt, self.max_attempts, err, pause
            );
            sleep(pause).await;
            attempt += 1;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}
