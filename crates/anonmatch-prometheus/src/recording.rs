// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any recorder can collect these metrics.

use std::time::Duration;

use metrics::{describe_counter, describe_gauge, describe_histogram};

/// Register all metric descriptions. Called once after the recorder is installed.
pub fn register_metrics() {
    describe_gauge!("search_queue_size", "Users currently waiting in the matching pool");
    describe_counter!("messages_total", "Messages relayed between partners, by kind");
    describe_counter!("chat_matches_total", "Sessions created by the matcher");
    describe_counter!("reports_total", "Abuse reports filed");
    describe_counter!("blocks_total", "Block actions");
    describe_counter!(
        "moderation_blocked_total",
        "Media suppressed by the moderation gate, by reason"
    );
    describe_counter!(
        "moderation_checks_total",
        "Moderation gate decisions, by outcome"
    );
    describe_counter!(
        "otp_verifications_total",
        "One-time code verification attempts, by outcome"
    );
    describe_histogram!(
        "broadcast_duration_seconds",
        "Time to fan a whisper out to a department"
    );
    describe_gauge!("update_queue_depth", "Inbound events waiting for a worker");
    describe_histogram!(
        "update_process_duration_seconds",
        "Time spent handling one inbound event"
    );
    describe_histogram!(
        "user_lock_wait_seconds",
        "Time spent waiting for a per-user lock"
    );
    describe_counter!(
        "user_lock_contention_total",
        "Per-user lock acquisitions that had to wait"
    );
    describe_gauge!(
        "circuit_breaker_state",
        "Circuit breaker state (0 closed, 1 half-open, 2 open)"
    );
    describe_counter!("errors_total", "Handler errors, by kind");
}

pub fn set_queue_size(size: usize) {
    metrics::gauge!("search_queue_size").set(size as f64);
}

/// Record one relayed message of the given kind (`text`, `photo`, ...).
pub fn record_message(kind: &'static str) {
    metrics::counter!("messages_total", "kind" => kind).increment(1);
}

pub fn record_match() {
    metrics::counter!("chat_matches_total").increment(1);
}

pub fn record_report() {
    metrics::counter!("reports_total").increment(1);
}

pub fn record_block() {
    metrics::counter!("blocks_total").increment(1);
}

pub fn record_moderation_blocked(reason: &str) {
    metrics::counter!("moderation_blocked_total", "reason" => reason.to_string()).increment(1);
}

/// `outcome` is one of `safe`, `unsafe`, `disabled`, `error`.
pub fn record_moderation_check(outcome: &'static str) {
    metrics::counter!("moderation_checks_total", "outcome" => outcome).increment(1);
}

/// `outcome` is one of `success`, `invalid`, `locked`.
pub fn record_otp_verification(outcome: &'static str) {
    metrics::counter!("otp_verifications_total", "outcome" => outcome).increment(1);
}

pub fn record_broadcast_duration(elapsed: Duration) {
    metrics::histogram!("broadcast_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn set_update_queue_depth(depth: usize) {
    metrics::gauge!("update_queue_depth").set(depth as f64);
}

pub fn record_update_duration(elapsed: Duration) {
    metrics::histogram!("update_process_duration_seconds").record(elapsed.as_secs_f64());
}

/// Record a per-user lock wait; waits above one millisecond count as contention.
pub fn record_lock_wait(waited: Duration) {
    metrics::histogram!("user_lock_wait_seconds").record(waited.as_secs_f64());
    if waited > Duration::from_millis(1) {
        metrics::counter!("user_lock_contention_total").increment(1);
    }
}

/// 0 closed, 1 half-open, 2 open.
pub fn set_circuit_breaker_state(name: &str, value: f64) {
    metrics::gauge!("circuit_breaker_state", "name" => name.to_string()).set(value);
}

pub fn record_error(kind: &'static str) {
    metrics::counter!("errors_total", "kind" => kind).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helpers_are_noops_without_recorder() {
        register_metrics();
        set_queue_size(3);
        record_message("text");
        record_match();
        record_moderation_blocked("nudity");
        record_lock_wait(Duration::from_millis(5));
        set_circuit_breaker_state("moderation", 2.0);
        record_error("storage");
    }
}
