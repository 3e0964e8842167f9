// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resilience primitives for calls to external dependencies.
//!
//! [`retry`] re-runs a single operation on transient errors with jittered
//! exponential backoff. [`CircuitBreaker`] fails fast once a dependency has
//! failed repeatedly. Callers compose them as `breaker.call(retry(..))` and
//! decide the fallback themselves.

pub mod breaker;
pub mod retry;

pub use breaker::{BreakerConfig, BreakerState, CircuitBreaker};
pub use retry::{RetryPolicy, retry};
