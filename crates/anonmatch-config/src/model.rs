// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so a mistyped key fails at
//! startup instead of silently falling back to a default.

use serde::{Deserialize, Serialize};

/// Top-level configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnonmatchConfig {
    /// Transport credentials and dispatcher sizing.
    #[serde(default)]
    pub bot: BotConfig,

    /// Persistence backend.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Email OTP verification.
    #[serde(default)]
    pub verification: VerificationConfig,

    /// Per-user quotas.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Waiting pool and evidence tuning.
    #[serde(default)]
    pub matching: MatchingConfig,

    /// Outgoing mail server for OTP delivery.
    #[serde(default)]
    pub smtp: SmtpConfig,

    /// Media classifier credentials.
    #[serde(default)]
    pub moderation: ModerationConfig,

    /// Retry and circuit breaker parameters.
    #[serde(default)]
    pub resilience: ResilienceConfig,

    /// Health/metrics HTTP surface.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Prometheus metrics exporter.
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BotConfig {
    /// Telegram bot token. Required by `serve`.
    #[serde(default)]
    pub token: Option<String>,

    /// Verbose logging; forces the `debug` level.
    #[serde(default)]
    pub debug: bool,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// User id that bypasses the verification gate. 0 disables it.
    #[serde(default)]
    pub maintenance_account_id: i64,

    /// Number of dispatcher workers.
    #[serde(default = "default_max_update_workers")]
    pub max_update_workers: usize,

    /// Capacity of the dispatcher queue.
    #[serde(default = "default_max_update_queue")]
    pub max_update_queue: usize,

    /// Upper bound for a single event handler.
    #[serde(default = "default_handler_timeout_secs")]
    pub handler_timeout_secs: u64,

    /// How long shutdown waits for in-flight events.
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: None,
            debug: false,
            log_level: default_log_level(),
            maintenance_account_id: 0,
            max_update_workers: default_max_update_workers(),
            max_update_queue: default_max_update_queue(),
            handler_timeout_secs: default_handler_timeout_secs(),
            drain_timeout_secs: default_drain_timeout_secs(),
        }
    }
}

impl BotConfig {
    /// The configured token, treating an empty string as absent.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    /// Effective log level after applying `debug`.
    pub fn effective_log_level(&self) -> &str {
        if self.debug { "debug" } else { &self.log_level }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_update_workers() -> usize {
    16
}

fn default_max_update_queue() -> usize {
    256
}

fn default_handler_timeout_secs() -> u64 {
    120
}

fn default_drain_timeout_secs() -> u64 {
    30
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// `sqlite` or `postgres`.
    #[serde(default = "default_db_type")]
    pub db_type: String,

    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL journal mode.
    #[serde(default = "default_true")]
    pub wal_mode: bool,

    /// SQLite busy timeout.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    #[serde(default = "default_db_host")]
    pub host: String,

    #[serde(default = "default_db_port")]
    pub port: u16,

    #[serde(default = "default_db_user")]
    pub user: String,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_db_name")]
    pub name: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_type: default_db_type(),
            database_path: default_database_path(),
            wal_mode: true,
            busy_timeout_ms: default_busy_timeout_ms(),
            host: default_db_host(),
            port: default_db_port(),
            user: default_db_user(),
            password: None,
            name: default_db_name(),
        }
    }
}

fn default_db_type() -> String {
    "sqlite".to_string()
}

fn default_database_path() -> String {
    "./data/anonmatch.db".to_string()
}

fn default_true() -> bool {
    true
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_db_host() -> String {
    "localhost".to_string()
}

fn default_db_port() -> u16 {
    5432
}

fn default_db_user() -> String {
    "postgres".to_string()
}

fn default_db_name() -> String {
    "anonmatch".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VerificationConfig {
    /// Digits in a verification code (4..=8).
    #[serde(default = "default_otp_length")]
    pub otp_length: u32,

    /// Code lifetime in minutes (1..=60).
    #[serde(default = "default_otp_expiry_minutes")]
    pub otp_expiry_minutes: u32,

    /// Failed attempts before a lockout.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_lockout_minutes")]
    pub lockout_minutes: u32,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            otp_length: default_otp_length(),
            otp_expiry_minutes: default_otp_expiry_minutes(),
            max_attempts: default_max_attempts(),
            lockout_minutes: default_lockout_minutes(),
        }
    }
}

fn default_otp_length() -> u32 {
    6
}

fn default_otp_expiry_minutes() -> u32 {
    10
}

fn default_max_attempts() -> u32 {
    5
}

fn default_lockout_minutes() -> u32 {
    15
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    #[serde(default = "default_max_search_per_minute")]
    pub max_search_per_minute: u32,

    #[serde(default = "default_max_confessions_per_hour")]
    pub max_confessions_per_hour: u32,

    #[serde(default = "default_max_reports_per_day")]
    pub max_reports_per_day: u32,

    #[serde(default = "default_max_whispers_per_hour")]
    pub max_whispers_per_hour: u32,

    #[serde(default = "default_max_replies_per_hour")]
    pub max_replies_per_hour: u32,

    /// Reports received before a user is banned automatically.
    #[serde(default = "default_auto_ban_report_count")]
    pub auto_ban_report_count: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_search_per_minute: default_max_search_per_minute(),
            max_confessions_per_hour: default_max_confessions_per_hour(),
            max_reports_per_day: default_max_reports_per_day(),
            max_whispers_per_hour: default_max_whispers_per_hour(),
            max_replies_per_hour: default_max_replies_per_hour(),
            auto_ban_report_count: default_auto_ban_report_count(),
        }
    }
}

fn default_max_search_per_minute() -> u32 {
    5
}

fn default_max_confessions_per_hour() -> u32 {
    3
}

fn default_max_reports_per_day() -> u32 {
    5
}

fn default_max_whispers_per_hour() -> u32 {
    5
}

fn default_max_replies_per_hour() -> u32 {
    10
}

fn default_auto_ban_report_count() -> u32 {
    3
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MatchingConfig {
    /// Seconds a pool entry waits before its filter is relaxed.
    #[serde(default = "default_idle_threshold_secs")]
    pub idle_threshold_secs: u64,

    /// Period of the queue worker tick.
    #[serde(default = "default_queue_tick_secs")]
    pub queue_tick_secs: u64,

    /// Relayed events kept per session for abuse review.
    #[serde(default = "default_evidence_capacity")]
    pub evidence_capacity: usize,

    #[serde(default = "default_evidence_ttl_hours")]
    pub evidence_ttl_hours: u64,

    /// Upper bound for a single persistence call on the matching path.
    #[serde(default = "default_persistence_timeout_secs")]
    pub persistence_timeout_secs: u64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            idle_threshold_secs: default_idle_threshold_secs(),
            queue_tick_secs: default_queue_tick_secs(),
            evidence_capacity: default_evidence_capacity(),
            evidence_ttl_hours: default_evidence_ttl_hours(),
            persistence_timeout_secs: default_persistence_timeout_secs(),
        }
    }
}

fn default_idle_threshold_secs() -> u64 {
    60
}

fn default_queue_tick_secs() -> u64 {
    30
}

fn default_evidence_capacity() -> usize {
    20
}

fn default_evidence_ttl_hours() -> u64 {
    24
}

fn default_persistence_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SmtpConfig {
    #[serde(default = "default_smtp_host")]
    pub host: String,

    #[serde(default = "default_smtp_port")]
    pub port: u16,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Sender address; falls back to `username`.
    #[serde(default)]
    pub from: Option<String>,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            username: None,
            password: None,
            from: None,
        }
    }
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ModerationConfig {
    #[serde(default)]
    pub api_user: Option<String>,

    #[serde(default)]
    pub api_secret: Option<String>,

    #[serde(default = "default_moderation_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_moderation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            api_user: None,
            api_secret: None,
            endpoint: default_moderation_endpoint(),
            timeout_secs: default_moderation_timeout_secs(),
        }
    }
}

impl ModerationConfig {
    /// Both credentials present and non-empty.
    pub fn is_enabled(&self) -> bool {
        let set = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        set(&self.api_user) && set(&self.api_secret)
    }
}

fn default_moderation_endpoint() -> String {
    "https://api.sightengine.com/1.0/check.json".to_string()
}

fn default_moderation_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ResilienceConfig {
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    #[serde(default = "default_breaker_failure_threshold")]
    pub breaker_failure_threshold: u32,

    #[serde(default = "default_breaker_reset_timeout_secs")]
    pub breaker_reset_timeout_secs: u64,

    /// Successes in half-open needed to close the breaker.
    #[serde(default = "default_breaker_half_open_successes")]
    pub breaker_half_open_successes: u32,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            retry_max_attempts: default_retry_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            breaker_failure_threshold: default_breaker_failure_threshold(),
            breaker_reset_timeout_secs: default_breaker_reset_timeout_secs(),
            breaker_half_open_successes: default_breaker_half_open_successes(),
        }
    }
}

fn default_retry_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_retry_max_delay_ms() -> u64 {
    10_000
}

fn default_breaker_failure_threshold() -> u32 {
    5
}

fn default_breaker_reset_timeout_secs() -> u64 {
    30
}

fn default_breaker_half_open_successes() -> u32 {
    2
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_gateway_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_gateway_host(),
            port: default_gateway_port(),
        }
    }
}

fn default_gateway_host() -> String {
    "0.0.0.0".to_string()
}

fn default_gateway_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PrometheusConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
