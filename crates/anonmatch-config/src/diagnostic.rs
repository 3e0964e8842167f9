// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration diagnostics.
//!
//! Figment errors and validation failures become [`ConfigError`] values
//! that miette renders with the offending line of `anonmatch.toml`, a
//! "did you mean" suggestion for misspelled keys and the environment
//! variable that sets the same value.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, GraphicalReportHandler, NamedSource, SourceSpan};
use thiserror::Error;

use crate::loader::env_key_for;

/// Minimum Jaro-Winkler similarity for a key suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A TOML file that was read while loading: display path and content.
pub type TomlSource = (String, String);

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(anonmatch::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        suggestion: Option<String>,
        valid_keys: String,
        #[label("not a setting here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("`{key}` has the wrong type: found {found}")]
    #[diagnostic(code(anonmatch::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        found: String,
        expected: String,
        #[label("expected {expected}")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(code(anonmatch::config::missing_key))]
    MissingKey { key: String },

    /// A value that parsed but is out of range or inconsistent.
    #[error("invalid `{key}`: {message}")]
    #[diagnostic(
        code(anonmatch::config::validation),
        help("fix `{key}` in anonmatch.toml or set {env}")
    )]
    Validation {
        key: String,
        message: String,
        env: String,
        #[label("{message}")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A setting that only `serve` needs, such as the bot token.
    #[error("missing required setting `{key}`")]
    #[diagnostic(
        code(anonmatch::config::missing_setting),
        help("set {env} in the environment or `{key}` in anonmatch.toml")
    )]
    MissingSetting { key: String, env: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(anonmatch::config::other))]
    Other(String),
}

impl ConfigError {
    /// A validation failure for the dotted config path `key`.
    pub fn invalid(key: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            key: key.to_string(),
            message: message.into(),
            env: env_key_for(key),
            span: None,
            src: None,
        }
    }

    /// The bot token is absent from every source.
    pub fn missing_token() -> Self {
        Self::MissingSetting {
            key: "bot.token".into(),
            env: env_key_for("bot.token"),
        }
    }
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

/// Converts every error inside a `figment::Error` into a diagnostic.
pub fn figment_to_config_errors(err: figment::Error, sources: &[TomlSource]) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| {
            let section = (!error.path.is_empty()).then(|| error.path.join("."));
            let origin = error_origin(&error);
            match &error.kind {
                Kind::UnknownField(field, expected) => {
                    let (span, src) =
                        locate_in_sources(sources, origin.as_deref(), section.as_deref(), field);
                    ConfigError::UnknownKey {
                        key: field.clone(),
                        suggestion: suggest_key(field, expected),
                        valid_keys: expected.join(", "),
                        span,
                        src,
                    }
                }
                Kind::MissingField(field) => ConfigError::MissingKey {
                    key: qualified(section.as_deref(), field),
                },
                Kind::InvalidType(actual, expected) => {
                    // For a type error the path already ends with the key.
                    let key = error.path.join(".");
                    let (parent, field) = split_key(&key);
                    let (span, src) = locate_in_sources(sources, origin.as_deref(), parent, field);
                    ConfigError::InvalidType {
                        key,
                        found: actual.to_string(),
                        expected: expected.clone(),
                        span,
                        src,
                    }
                }
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

/// Points validation errors at the line that set the value, when a file did.
pub fn attach_sources(errors: Vec<ConfigError>, sources: &[TomlSource]) -> Vec<ConfigError> {
    errors
        .into_iter()
        .map(|error| match error {
            ConfigError::Validation {
                key, message, env, ..
            } => {
                let (section, field) = split_key(&key);
                let (span, src) = locate_in_sources(sources, None, section, field);
                ConfigError::Validation {
                    key,
                    message,
                    env,
                    span,
                    src,
                }
            }
            other => other,
        })
        .collect()
}

fn qualified(section: Option<&str>, field: &str) -> String {
    match section {
        Some(s) => format!("{s}.{field}"),
        None => field.to_string(),
    }
}

/// Splits `limits.max_search_per_minute` into its table and key.
fn split_key(key: &str) -> (Option<&str>, &str) {
    match key.rsplit_once('.') {
        Some((section, field)) => (Some(section), field),
        None => (None, key),
    }
}

fn error_origin(error: &figment::Error) -> Option<String> {
    match error.metadata.as_ref()?.source.as_ref()? {
        figment::Source::File(path) => Some(path.display().to_string()),
        _ => None,
    }
}

/// Searches `origin` when figment knows it, otherwise every file in order.
fn locate_in_sources(
    sources: &[TomlSource],
    origin: Option<&str>,
    section: Option<&str>,
    field: &str,
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    sources
        .iter()
        .filter(|(path, _)| origin.is_none_or(|o| o == path))
        .find_map(|(path, content)| {
            let offset = locate_key(content, section, field)?;
            Some((
                Some(SourceSpan::new(offset.into(), field.len())),
                Some(NamedSource::new(path, content.clone())),
            ))
        })
        .unwrap_or((None, None))
}

/// Byte offset of `field` as a key inside table `section` (`None` is the
/// root table). Tables may appear in any order.
pub fn locate_key(content: &str, section: Option<&str>, field: &str) -> Option<usize> {
    let mut table: Option<&str> = None;
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        let code = line.split('#').next().unwrap_or_default().trim();
        if let Some(header) = code.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
            table = Some(header.trim());
        } else if table == section {
            let indent = line.len() - line.trim_start().len();
            let is_key = line[indent..]
                .strip_prefix(field)
                .is_some_and(|rest| rest.trim_start().starts_with('='));
            if is_key {
                return Some(offset + indent);
            }
        }
        offset += line.len();
    }
    None
}

/// Closest valid key to `unknown`, if any is similar enough.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Renders `errors` as miette reports.
pub fn render_to_string(errors: &[ConfigError]) -> String {
    let handler = GraphicalReportHandler::new();
    let mut out = String::new();
    for error in errors {
        let mut report = String::new();
        match handler.render_report(&mut report, error as &dyn Diagnostic) {
            Ok(()) => out.push_str(&report),
            Err(_) => out.push_str(&format!("Error: {error}\n")),
        }
    }
    out
}

/// Prints `errors` to stderr.
pub fn render_errors(errors: &[ConfigError]) {
    eprint!("{}", render_to_string(errors));
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOML: &str = "\
[limits]
max_reports_per_day = 5

[bot]
log_level = \"info\"  # quiet
max_serach = 3
";

    #[test]
    fn suggests_close_limit_key() {
        let valid = &["max_search_per_minute", "max_reports_per_day"];
        assert_eq!(
            suggest_key("max_serach_per_minute", valid),
            Some("max_search_per_minute".to_string())
        );
        assert_eq!(suggest_key("zzzzzz", &["otp_length"]), None);
    }

    #[test]
    fn locates_keys_by_table() {
        let at = locate_key(TOML, Some("bot"), "max_serach").unwrap();
        assert!(TOML[at..].starts_with("max_serach = 3"));
        let at = locate_key(TOML, Some("limits"), "max_reports_per_day").unwrap();
        assert_eq!(at, "[limits]\n".len());
        assert_eq!(locate_key(TOML, Some("limits"), "log_level"), None);
        assert_eq!(locate_key(TOML, None, "log_level"), None);
    }

    #[test]
    fn key_prefix_is_not_a_match() {
        let content = "[limits]\nmax_reports_per_day_extra = 1\n";
        assert_eq!(locate_key(content, Some("limits"), "max_reports_per_day"), None);
    }

    #[test]
    fn validation_errors_gain_spans_and_env_hints() {
        let sources = vec![("anonmatch.toml".to_string(), TOML.to_string())];
        let errors = attach_sources(
            vec![ConfigError::invalid("limits.max_reports_per_day", "must be positive")],
            &sources,
        );
        match &errors[0] {
            ConfigError::Validation { env, span, .. } => {
                assert_eq!(env, "MAX_REPORTS_PER_DAY");
                assert!(span.is_some());
            }
            other => panic!("expected a validation error, got {other:?}"),
        }
        let rendered = render_to_string(&errors);
        assert!(rendered.contains("max_reports_per_day"));
        assert!(rendered.contains("MAX_REPORTS_PER_DAY"));
    }

    #[test]
    fn missing_token_names_the_env_key() {
        let err = ConfigError::missing_token();
        assert_eq!(err.to_string(), "missing required setting `bot.token`");
        assert!(render_to_string(&[err]).contains("BOT_TOKEN"));
    }
}
