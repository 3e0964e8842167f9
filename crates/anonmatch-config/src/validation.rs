// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Collects every failure instead of stopping at the first one.

use crate::diagnostic::ConfigError;
use crate::model::AnonmatchConfig;

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &AnonmatchConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut invalid = |key: &str, message: String| errors.push(ConfigError::invalid(key, message));

    let level = config.bot.log_level.trim().to_ascii_lowercase();
    if !["trace", "debug", "info", "warn", "error"].contains(&level.as_str()) {
        invalid(
            "bot.log_level",
            format!(
                "must be one of trace, debug, info, warn, error; got `{}`",
                config.bot.log_level
            ),
        );
    }

    let bot = &config.bot;
    for (key, value) in [
        ("bot.max_update_workers", bot.max_update_workers as u64),
        ("bot.max_update_queue", bot.max_update_queue as u64),
        ("bot.handler_timeout_secs", bot.handler_timeout_secs),
    ] {
        if value == 0 {
            invalid(key, "must be at least 1".into());
        }
    }

    let storage = &config.storage;
    match storage.db_type.as_str() {
        "sqlite" => {
            if storage.database_path.trim().is_empty() {
                invalid("storage.database_path", "must not be empty".into());
            }
        }
        "postgres" => {
            for (key, value) in [
                ("storage.host", &storage.host),
                ("storage.user", &storage.user),
                ("storage.name", &storage.name),
            ] {
                if value.trim().is_empty() {
                    invalid(key, "is required when db_type is postgres".into());
                }
            }
        }
        other => invalid(
            "storage.db_type",
            format!("must be `sqlite` or `postgres`, got `{other}`"),
        ),
    }

    let otp = &config.verification;
    if !(4..=8).contains(&otp.otp_length) {
        invalid(
            "verification.otp_length",
            format!("must be between 4 and 8, got {}", otp.otp_length),
        );
    }
    if !(1..=60).contains(&otp.otp_expiry_minutes) {
        invalid(
            "verification.otp_expiry_minutes",
            format!("must be between 1 and 60, got {}", otp.otp_expiry_minutes),
        );
    }
    if otp.max_attempts == 0 {
        invalid("verification.max_attempts", "must be positive".into());
    }

    let limits = &config.limits;
    for (key, value) in [
        ("limits.max_search_per_minute", limits.max_search_per_minute),
        ("limits.max_confessions_per_hour", limits.max_confessions_per_hour),
        ("limits.max_reports_per_day", limits.max_reports_per_day),
        ("limits.max_whispers_per_hour", limits.max_whispers_per_hour),
        ("limits.max_replies_per_hour", limits.max_replies_per_hour),
        ("limits.auto_ban_report_count", limits.auto_ban_report_count),
    ] {
        if value == 0 {
            invalid(key, "must be positive".into());
        }
    }

    let matching = &config.matching;
    if matching.queue_tick_secs == 0 {
        invalid("matching.queue_tick_secs", "must be positive".into());
    }
    if matching.evidence_capacity == 0 {
        invalid("matching.evidence_capacity", "must be positive".into());
    }

    let resilience = &config.resilience;
    if resilience.retry_max_attempts == 0 {
        invalid("resilience.retry_max_attempts", "must be at least 1".into());
    }
    if resilience.retry_base_delay_ms > resilience.retry_max_delay_ms {
        invalid(
            "resilience.retry_base_delay_ms",
            format!(
                "{} exceeds retry_max_delay_ms ({})",
                resilience.retry_base_delay_ms, resilience.retry_max_delay_ms
            ),
        );
    }
    if resilience.breaker_failure_threshold == 0 {
        invalid("resilience.breaker_failure_threshold", "must be positive".into());
    }
    if resilience.breaker_half_open_successes == 0 {
        invalid("resilience.breaker_half_open_successes", "must be positive".into());
    }

    if config.gateway.enabled && config.gateway.host.trim().is_empty() {
        invalid("gateway.host", "must not be empty".into());
    }

    if config.moderation.api_user.is_some() != config.moderation.api_secret.is_some() {
        tracing::warn!("moderation needs both api_user and api_secret; classifier disabled");
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&AnonmatchConfig::default()).is_ok());
    }

    #[test]
    fn otp_length_outside_range_is_rejected() {
        let mut config = AnonmatchConfig::default();
        config.verification.otp_length = 9;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("otp_length"));
    }

    #[test]
    fn zero_limits_are_all_reported() {
        let mut config = AnonmatchConfig::default();
        config.limits.max_search_per_minute = 0;
        config.limits.auto_ban_report_count = 0;
        config.bot.max_update_workers = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn postgres_requires_connection_fields() {
        let mut config = AnonmatchConfig::default();
        config.storage.db_type = "postgres".into();
        config.storage.host = String::new();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].to_string().contains("storage.host"));
    }

    #[test]
    fn unknown_db_type_is_rejected() {
        let mut config = AnonmatchConfig::default();
        config.storage.db_type = "mysql".into();
        assert!(validate_config(&config).is_err());
    }
}
