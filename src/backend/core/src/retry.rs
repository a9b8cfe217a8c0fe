//! Bounded retry with backoff for caller-layer integration checks.
//!
//! Background health runs never retry. This policy is used where a result
//! gates a user-facing action, such as an interactive integration retest.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{PreflightError, Result};

/// Hard ceiling on attempts, whatever the configuration says.
pub const MAX_ATTEMPTS_LIMIT: u32 = 3;

// ═══════════════════════════════════════════════════════════════════════════════
// Backoff Strategy
// ═══════════════════════════════════════════════════════════════════════════════

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// `base × attempt`
    #[default]
    Linear,
    /// `base × 2^(attempt - 1)`
    Exponential,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Retry Policy
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first, clamped to 1..=3
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay", with = "humantime_serde")]
    pub base_delay: Duration,

    #[serde(default = "default_max_delay", with = "humantime_serde")]
    pub max_delay: Duration,

    #[serde(default)]
    pub backoff: BackoffStrategy,

    /// Fraction of the delay added or removed at random (0.0 to 1.0)
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
            max_delay: default_max_delay(),
            backoff: BackoffStrategy::default(),
            jitter_factor: default_jitter_factor(),
        }
    }
}

fn default_max_attempts() -> u32 {
    MAX_ATTEMPTS_LIMIT
}

fn default_base_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_jitter_factor() -> f64 {
    0.1
}

impl RetryPolicy {
    /// A single attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Linear policy with no jitter.
    pub fn linear(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            jitter_factor: 0.0,
            ..Default::default()
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_jitter(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor;
        self
    }

    /// Attempts that will actually be made.
    pub fn effective_attempts(&self) -> u32 {
        self.max_attempts.clamp(1, MAX_ATTEMPTS_LIMIT)
    }

    /// Reject settings that would be silently clamped.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 || self.max_attempts > MAX_ATTEMPTS_LIMIT {
            return Err(PreflightError::invalid_configuration(format!(
                "retry.max_attempts must be between 1 and {}, got {}",
                MAX_ATTEMPTS_LIMIT, self.max_attempts
            )));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(PreflightError::invalid_configuration(format!(
                "retry.jitter_factor must be between 0.0 and 1.0, got {}",
                self.jitter_factor
            )));
        }
        if self.base_delay > self.max_delay {
            return Err(PreflightError::invalid_configuration(
                "retry.base_delay must not exceed retry.max_delay",
            ));
        }
        Ok(())
    }

    /// Delay after the given failed attempt (1-indexed), capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let factor = match self.backoff {
            BackoffStrategy::Linear => attempt,
            BackoffStrategy::Exponential => 2u32.saturating_pow(attempt - 1),
        };
        let capped = self.base_delay.saturating_mul(factor).min(self.max_delay);

        let jitter_factor = self.jitter_factor.clamp(0.0, 1.0);
        if jitter_factor == 0.0 || capped.is_zero() {
            return capped;
        }
        // delay * (1 +/- jitter_factor * random)
        let jitter = (rand_unit() * 2.0 - 1.0) * jitter_factor;
        capped.mul_f64(1.0 + jitter).min(self.max_delay)
    }

    /// Run `operation` until it succeeds or attempts run out.
    ///
    /// The closure receives the 1-indexed attempt number.
    pub async fn run<T, E, F, Fut>(
        &self,
        operation: &str,
        mut f: F,
    ) -> std::result::Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: fmt::Display,
    {
        let attempts = self.effective_attempts();
        let mut attempt = 1;

        loop {
            match f(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(operation, attempt, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) if attempt >= attempts => {
                    warn!(operation, attempts = attempt, error = %error, "Retries exhausted");
                    return Err(RetryError {
                        operation: operation.to_string(),
                        attempts: attempt,
                        last_error: error,
                    });
                }
                Err(error) => {
                    let delay = self.delay_for_attempt(attempt);
                    debug!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Attempt failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Pseudo-random number in [0.0, 1.0) for jitter.
fn rand_unit() -> f64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let mut hasher = RandomState::new().build_hasher();
    hasher.write_u64(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64,
    );
    (hasher.finish() as f64) / (u64::MAX as f64 + 1.0)
}

/// Every attempt failed.
#[derive(Debug, thiserror::Error)]
#[error("{operation} failed after {attempts} attempt(s): {last_error}")]
pub struct RetryError<E: fmt::Display> {
    pub operation: String,
    pub attempts: u32,
    pub last_error: E,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_linear_delays() {
        let policy = RetryPolicy::linear(3, Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(300));
    }

    #[test]
    fn test_exponential_delays() {
        let policy = RetryPolicy::linear(3, Duration::from_millis(100))
            .with_backoff(BackoffStrategy::Exponential);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = RetryPolicy::linear(3, Duration::from_secs(2))
            .with_max_delay(Duration::from_secs(3));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(3));

        let jittered = policy.with_jitter(0.5);
        for _ in 0..50 {
            assert!(jittered.delay_for_attempt(3) <= Duration::from_secs(3));
        }
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = RetryPolicy::linear(3, Duration::from_millis(1000)).with_jitter(0.2);
        for _ in 0..100 {
            let delay = policy.delay_for_attempt(1);
            assert!(delay >= Duration::from_millis(799));
            assert!(delay <= Duration::from_millis(1201));
        }
    }

    #[test]
    fn test_attempts_are_clamped() {
        assert_eq!(RetryPolicy::linear(10, Duration::ZERO).effective_attempts(), 3);
        assert_eq!(RetryPolicy::linear(0, Duration::ZERO).effective_attempts(), 1);
        assert_eq!(RetryPolicy::no_retry().effective_attempts(), 1);
    }

    #[test]
    fn test_validate() {
        assert!(RetryPolicy::default().validate().is_ok());
        assert!(RetryPolicy::linear(4, Duration::ZERO).validate().is_err());
        assert!(RetryPolicy::linear(0, Duration::ZERO).validate().is_err());
        assert!(RetryPolicy::default().with_jitter(1.5).validate().is_err());
    }

    #[tokio::test]
    async fn test_run_succeeds_after_failures() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::linear(3, Duration::from_millis(1));

        let result = policy
            .run("flaky", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(format!("attempt {} failed", attempt))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_exhausts_at_limit() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::linear(10, Duration::from_millis(1));

        let result: std::result::Result<(), _> = policy
            .run("always-down", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("connection refused") }
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts, 3);
        assert_eq!(err.last_error, "connection refused");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(err.to_string().contains("always-down failed after 3 attempt(s)"));
    }

    #[tokio::test]
    async fn test_no_retry_runs_once() {
        let calls = AtomicU32::new(0);
        let result: std::result::Result<(), _> = RetryPolicy::no_retry()
            .run("once", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("nope") }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_deserialize_humantime() {
        let policy: RetryPolicy = serde_json::from_str(
            r#"{"max_attempts": 2, "base_delay": "250ms", "max_delay": "2s", "backoff": "exponential"}"#,
        )
        .unwrap();
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.base_delay, Duration::from_millis(250));
        assert_eq!(policy.backoff, BackoffStrategy::Exponential);
        assert_eq!(policy.jitter_factor, 0.1);
    }
}
