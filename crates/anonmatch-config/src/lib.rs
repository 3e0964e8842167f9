// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the anonmatch bot.
//!
//! TOML files and environment variables are layered with Figment, checked
//! with `deny_unknown_fields` and semantic validation, and failures are
//! rendered as miette diagnostics with typo suggestions.
//!
//! ```no_run
//! use anonmatch_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("search limit: {}/min", config.limits.max_search_per_minute);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::AnonmatchConfig;

/// Load configuration from files and environment, then validate it.
pub fn load_and_validate() -> Result<AnonmatchConfig, Vec<ConfigError>> {
    match loader::load_config() {
        Ok(config) => validation::validate_config(&config)
            .map(|()| config)
            .map_err(|errors| diagnostic::attach_sources(errors, &collect_toml_sources())),
        Err(err) => Err(diagnostic::figment_to_config_errors(err, &collect_toml_sources())),
    }
}

/// Load configuration from a TOML string and validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<AnonmatchConfig, Vec<ConfigError>> {
    let sources = [("<inline>".to_string(), toml_content.to_string())];
    match loader::load_config_from_str(toml_content) {
        Ok(config) => validation::validate_config(&config)
            .map(|()| config)
            .map_err(|errors| diagnostic::attach_sources(errors, &sources)),
        Err(err) => Err(diagnostic::figment_to_config_errors(err, &sources)),
    }
}

/// Contents of every config file that exists, for error span resolution.
fn collect_toml_sources() -> Vec<diagnostic::TomlSource> {
    let mut candidates = vec![
        std::env::current_dir()
            .map(|d| d.join("anonmatch.toml"))
            .unwrap_or_else(|_| "anonmatch.toml".into()),
    ];
    if let Some(config_dir) = dirs::config_dir() {
        candidates.push(config_dir.join("anonmatch/anonmatch.toml"));
    }
    candidates.push("/etc/anonmatch/anonmatch.toml".into());

    candidates
        .into_iter()
        .filter_map(|path| {
            std::fs::read_to_string(&path)
                .ok()
                .map(|content| (path.display().to_string(), content))
        })
        .collect()
}
