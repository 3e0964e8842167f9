// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded retry with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use anonmatch_config::model::ResilienceConfig;
use anonmatch_core::AnonmatchError;
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Retry parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &ResilienceConfig) -> Self {
        Self {
            max_attempts: config.retry_max_attempts.max(1),
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
        }
    }

    /// Un-jittered delay after the given failed attempt (0-indexed):
    /// `min(base * 2^attempt, max)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(31));
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Delay drawn from `[delay/2, delay)`, never below the base delay.
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let delay = self.delay_for_attempt(attempt);
        let upper = delay.as_millis() as u64;
        let lower = upper / 2;
        let millis = if lower < upper {
            rand::thread_rng().gen_range(lower..upper)
        } else {
            upper
        };
        Duration::from_millis(millis).max(self.base_delay.min(delay))
    }
}

/// Run `op` until it succeeds, fails with a non-transient error, exhausts
/// the policy, or `cancel` fires. The last error is returned on failure.
pub async fn retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, AnonmatchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AnonmatchError>>,
{
    let mut attempt = 0u32;
    loop {
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        attempt += 1;
        if !err.is_transient() || attempt >= policy.max_attempts {
            if attempt > 1 {
                warn!(attempts = attempt, error = %err, "giving up after retries");
            }
            return Err(err);
        }

        let delay = policy.jittered_delay(attempt - 1);
        debug!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying");
        tokio::select! {
            _ = cancel.cancelled() => return Err(err),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn transient() -> AnonmatchError {
        AnonmatchError::Timeout {
            duration: Duration::from_secs(1),
        }
    }

    #[test]
    fn delay_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(10));
        assert_eq!(policy.delay_for_attempt(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn jitter_stays_in_range() {
        let policy = RetryPolicy::default();
        for _ in 0..100 {
            let d = policy.jittered_delay(3);
            assert!(d >= Duration::from_millis(2000), "{d:?}");
            assert!(d < Duration::from_millis(4000), "{d:?}");
            assert!(policy.jittered_delay(0) >= policy.base_delay);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_are_retried_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = retry(&RetryPolicy::default(), &CancellationToken::new(), || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(transient())
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn attempts_are_bounded() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<(), _> = retry(&RetryPolicy::default(), &CancellationToken::new(), || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(transient()) }
        })
        .await;
        assert!(matches!(result, Err(AnonmatchError::Timeout { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn domain_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<(), _> = retry(&RetryPolicy::default(), &CancellationToken::new(), || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(AnonmatchError::Banned) }
        })
        .await;
        assert!(matches!(result, Err(AnonmatchError::Banned)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_backoff() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<(), _> = retry(&RetryPolicy::default(), &cancel, || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(transient()) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
