// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports `./anonmatch.toml` > `~/.config/anonmatch/anonmatch.toml` >
//! `/etc/anonmatch/anonmatch.toml`, then the deployment environment keys
//! (`BOT_TOKEN`, `DB_PATH`, ...) and finally `ANONMATCH_`-prefixed overrides.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::AnonmatchConfig;

/// Sections addressable through `ANONMATCH_<SECTION>_<KEY>`.
const SECTIONS: &[&str] = &[
    "bot",
    "storage",
    "verification",
    "limits",
    "matching",
    "smtp",
    "moderation",
    "resilience",
    "gateway",
    "prometheus",
];

/// Deployment environment keys and the config path each one sets.
const DEPLOYMENT_KEYS: &[(&str, &str)] = &[
    ("BOT_TOKEN", "bot.token"),
    ("BOT_DEBUG", "bot.debug"),
    ("LOG_LEVEL", "bot.log_level"),
    ("MAINTENANCE_ACCOUNT_ID", "bot.maintenance_account_id"),
    ("MAX_UPDATE_WORKERS", "bot.max_update_workers"),
    ("MAX_UPDATE_QUEUE", "bot.max_update_queue"),
    ("DB_TYPE", "storage.db_type"),
    ("DB_PATH", "storage.database_path"),
    ("DB_HOST", "storage.host"),
    ("DB_PORT", "storage.port"),
    ("DB_USER", "storage.user"),
    ("DB_PASSWORD", "storage.password"),
    ("DB_NAME", "storage.name"),
    ("OTP_LENGTH", "verification.otp_length"),
    ("OTP_EXPIRY_MINUTES", "verification.otp_expiry_minutes"),
    ("MAX_SEARCH_PER_MINUTE", "limits.max_search_per_minute"),
    ("MAX_CONFESSIONS_PER_HOUR", "limits.max_confessions_per_hour"),
    ("MAX_REPORTS_PER_DAY", "limits.max_reports_per_day"),
    ("MAX_WHISPERS_PER_HOUR", "limits.max_whispers_per_hour"),
    ("MAX_REPLIES_PER_HOUR", "limits.max_replies_per_hour"),
    ("AUTO_BAN_REPORT_COUNT", "limits.auto_ban_report_count"),
    ("SMTP_HOST", "smtp.host"),
    ("SMTP_PORT", "smtp.port"),
    ("SMTP_USERNAME", "smtp.username"),
    ("SMTP_PASSWORD", "smtp.password"),
    ("SMTP_FROM", "smtp.from"),
    ("SIGHTENGINE_API_USER", "moderation.api_user"),
    ("SIGHTENGINE_API_SECRET", "moderation.api_secret"),
    ("HEALTH_PORT", "gateway.port"),
];

/// Load configuration from the standard hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/anonmatch/anonmatch.toml`
/// 3. `~/.config/anonmatch/anonmatch.toml`
/// 4. `./anonmatch.toml`
/// 5. Deployment keys (`BOT_TOKEN`, `MAX_SEARCH_PER_MINUTE`, ...)
/// 6. `ANONMATCH_*` environment variables
pub fn load_config() -> Result<AnonmatchConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no file lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<AnonmatchConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(AnonmatchConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<AnonmatchConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(AnonmatchConfig::default()))
        .merge(Toml::file(path))
        .merge(deployment_env_provider())
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(AnonmatchConfig::default()))
        .merge(Toml::file("/etc/anonmatch/anonmatch.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("anonmatch/anonmatch.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("anonmatch.toml"))
        .merge(deployment_env_provider())
        .merge(env_provider())
}

/// Config path for a deployment environment key, if it is one.
pub fn deployment_key_path(env_key: &str) -> Option<&'static str> {
    DEPLOYMENT_KEYS
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(env_key))
        .map(|(_, path)| *path)
}

/// Environment variable that sets `path`: the deployment key when one
/// exists, otherwise the `ANONMATCH_` form.
pub fn env_key_for(path: &str) -> String {
    DEPLOYMENT_KEYS
        .iter()
        .find(|(_, p)| *p == path)
        .map(|(k, _)| (*k).to_string())
        .unwrap_or_else(|| format!("ANONMATCH_{}", path.replace('.', "_").to_ascii_uppercase()))
}

/// Maps `ANONMATCH_<SECTION>_<KEY>` to `<section>.<key>`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// `ANONMATCH_LIMITS_MAX_SEARCH_PER_MINUTE` maps to
/// `limits.max_search_per_minute`.
pub fn map_prefixed_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key
}

fn deployment_env_provider() -> Env {
    Env::raw().filter_map(|key| deployment_key_path(key.as_str()).map(Into::into))
}

fn env_provider() -> Env {
    Env::prefixed("ANONMATCH_").map(|key| map_prefixed_key(key.as_str()).into())
}
