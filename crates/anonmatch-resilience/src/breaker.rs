// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Three-state circuit breaker.
//!
//! `Closed` counts consecutive failures and opens at the threshold. `Open`
//! rejects every call with [`AnonmatchError::CircuitOpen`] until the reset
//! timeout elapses, then lets probes through as `HalfOpen`. Enough probe
//! successes close it again; any probe failure re-opens it.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use anonmatch_config::model::ResilienceConfig;
use anonmatch_core::AnonmatchError;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half-open",
        }
    }

    /// Gauge encoding: 0 closed, 1 half-open, 2 open.
    fn gauge_value(&self) -> f64 {
        match self {
            BreakerState::Closed => 0.0,
            BreakerState::HalfOpen => 1.0,
            BreakerState::Open => 2.0,
        }
    }
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
    pub half_open_successes: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
            half_open_successes: 2,
        }
    }
}

impl BreakerConfig {
    pub fn from_config(config: &ResilienceConfig) -> Self {
        Self {
            failure_threshold: config.breaker_failure_threshold.max(1),
            reset_timeout: Duration::from_secs(config.breaker_reset_timeout_secs),
            half_open_successes: config.breaker_half_open_successes.max(1),
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    probe_successes: u32,
    opened_at: Option<Instant>,
}

/// A named circuit breaker guarding one external dependency.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        let breaker = Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                probe_successes: 0,
                opened_at: None,
            }),
        };
        breaker.publish(BreakerState::Closed);
        breaker
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // The state is a handful of counters, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, state: BreakerState) {
        anonmatch_prometheus::set_circuit_breaker_state(&self.name, state.gauge_value());
    }

    fn transition(&self, inner: &mut Inner, to: BreakerState) {
        if inner.state == to {
            return;
        }
        match to {
            BreakerState::Open => {
                warn!(breaker = %self.name, from = %inner.state, "circuit breaker opened")
            }
            _ => info!(breaker = %self.name, from = %inner.state, to = %to, "circuit breaker state change"),
        }
        inner.state = to;
        inner.probe_successes = 0;
        inner.opened_at = (to == BreakerState::Open).then(Instant::now);
        if to == BreakerState::Closed {
            inner.consecutive_failures = 0;
        }
        self.publish(to);
    }

    /// Current state, moving `Open` to `HalfOpen` once the reset timeout elapsed.
    pub fn state(&self) -> BreakerState {
        let mut inner = self.lock();
        self.refresh(&mut inner);
        inner.state
    }

    fn refresh(&self, inner: &mut Inner) {
        if inner.state == BreakerState::Open
            && inner
                .opened_at
                .is_some_and(|at| at.elapsed() >= self.config.reset_timeout)
        {
            self.transition(inner, BreakerState::HalfOpen);
        }
    }

    /// Fails fast with `CircuitOpen` while the breaker is open.
    pub fn check(&self) -> Result<(), AnonmatchError> {
        match self.state() {
            BreakerState::Open => Err(AnonmatchError::CircuitOpen {
                name: self.name.clone(),
            }),
            _ => Ok(()),
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => inner.consecutive_failures = 0,
            BreakerState::HalfOpen => {
                inner.probe_successes += 1;
                if inner.probe_successes >= self.config.half_open_successes {
                    self.transition(&mut inner, BreakerState::Closed);
                }
            }
            BreakerState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    self.transition(&mut inner, BreakerState::Open);
                }
            }
            BreakerState::HalfOpen => self.transition(&mut inner, BreakerState::Open),
            BreakerState::Open => {}
        }
    }

    /// Run `fut` through the breaker. Only transient errors count as failures.
    pub async fn call<T, Fut>(&self, fut: Fut) -> Result<T, AnonmatchError>
    where
        Fut: Future<Output = Result<T, AnonmatchError>>,
    {
        self.check()?;
        match fut.await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                if err.is_transient() {
                    self.record_failure();
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new("moderation", BreakerConfig::default())
    }

    fn io_err() -> AnonmatchError {
        AnonmatchError::Moderation {
            message: "connection reset".into(),
            source: None,
        }
    }

    #[test]
    fn opens_after_threshold() {
        let b = breaker();
        for _ in 0..4 {
            b.record_failure();
        }
        assert_eq!(b.state(), BreakerState::Closed);
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Open);
        assert!(matches!(b.check(), Err(AnonmatchError::CircuitOpen { name }) if name == "moderation"));
    }

    #[test]
    #[tracing_test::traced_test]
    fn opening_is_logged_as_warning() {
        let b = breaker();
        for _ in 0..5 {
            b.record_failure();
        }
        assert!(logs_contain("circuit breaker opened"));
    }

    #[test]
    fn success_resets_failure_count() {
        let b = breaker();
        for _ in 0..4 {
            b.record_failure();
        }
        b.record_success();
        for _ in 0..4 {
            b.record_failure();
        }
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_after_reset_then_closes() {
        let b = breaker();
        for _ in 0..5 {
            b.record_failure();
        }
        tokio::time::advance(Duration::from_secs(29)).await;
        assert_eq!(b.state(), BreakerState::Open);
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(b.state(), BreakerState::HalfOpen);

        b.record_success();
        assert_eq!(b.state(), BreakerState::HalfOpen);
        b.record_success();
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn probe_failure_reopens() {
        let b = breaker();
        for _ in 0..5 {
            b.record_failure();
        }
        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(b.state(), BreakerState::HalfOpen);
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Open);
    }

    #[tokio::test]
    async fn call_fails_fast_when_open() {
        let b = breaker();
        for _ in 0..5 {
            let _ = b.call(async { Err::<(), _>(io_err()) }).await;
        }
        let mut ran = false;
        let result = b
            .call(async {
                ran = true;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(AnonmatchError::CircuitOpen { .. })));
        assert!(!ran);
    }

    #[tokio::test]
    async fn domain_errors_do_not_trip() {
        let b = breaker();
        for _ in 0..10 {
            let _ = b.call(async { Err::<(), _>(AnonmatchError::Banned) }).await;
        }
        assert_eq!(b.state(), BreakerState::Closed);
    }
}
