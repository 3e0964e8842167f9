// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Input validation for user-supplied text, emails, callback payloads and
//! `/search` arguments.

use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use anonmatch_core::types::{is_valid_entry_year, Department, Gender, MIN_ENTRY_YEAR};
use anonmatch_core::{AnonmatchError, SearchFilter};

/// Inclusive character-count bounds for a free-text field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextLimits {
    pub field: &'static str,
    pub min: usize,
    pub max: usize,
}

pub const CONFESSION: TextLimits = TextLimits { field: "confession", min: 10, max: 1000 };
pub const WHISPER: TextLimits = TextLimits { field: "whisper", min: 5, max: 500 };
pub const ROOM_NAME: TextLimits = TextLimits { field: "room_name", min: 3, max: 30 };
pub const ROOM_DESCRIPTION: TextLimits = TextLimits { field: "room_description", min: 5, max: 200 };
pub const REPORT_REASON: TextLimits = TextLimits { field: "report_reason", min: 5, max: 500 };
pub const REPLY: TextLimits = TextLimits { field: "reply", min: 1, max: 500 };
pub const POLL_QUESTION: TextLimits = TextLimits { field: "poll_question", min: 5, max: 300 };
pub const POLL_OPTION: TextLimits = TextLimits { field: "poll_option", min: 1, max: 100 };

pub const MAX_EMAIL_LEN: usize = 254;
pub const MAX_CALLBACK_LEN: usize = 64;

static PNJ_EMAIL: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9._%+-]+@(mhsw\.|stu\.)?pnj\.ac\.id$").ok()
});

/// Checks the trimmed length of `text` against `limits`.
pub fn validate_text(text: &str, limits: TextLimits) -> Result<(), AnonmatchError> {
    let len = text.trim().chars().count();
    if len < limits.min {
        return Err(AnonmatchError::invalid(
            limits.field,
            format!("too short, minimum {} characters", limits.min),
        ));
    }
    if len > limits.max {
        return Err(AnonmatchError::invalid(
            limits.field,
            format!("too long, maximum {} characters", limits.max),
        ));
    }
    Ok(())
}

/// Trims and strips control characters other than newline, tab and carriage return.
pub fn sanitize_text(text: &str) -> String {
    text.trim()
        .chars()
        .filter(|c| matches!(c, '\n' | '\t' | '\r') || !c.is_control())
        .collect()
}

/// Sanitizes then validates; returns the cleaned text.
pub fn clean_text(text: &str, limits: TextLimits) -> Result<String, AnonmatchError> {
    let cleaned = sanitize_text(text);
    validate_text(&cleaned, limits)?;
    Ok(cleaned)
}

/// Lowercases and trims the address and checks it against the campus domains.
pub fn normalize_email(email: &str) -> Result<String, AnonmatchError> {
    let email = email.trim().to_lowercase();
    if email.len() > MAX_EMAIL_LEN {
        return Err(AnonmatchError::invalid("email", "address is too long"));
    }
    let ok = PNJ_EMAIL.as_ref().is_some_and(|re| re.is_match(&email));
    if !ok {
        return Err(AnonmatchError::invalid(
            "email",
            "must use @mhsw.pnj.ac.id, @stu.pnj.ac.id or @pnj.ac.id",
        ));
    }
    Ok(email)
}

pub fn is_valid_callback_data(data: &str) -> bool {
    (1..=MAX_CALLBACK_LEN).contains(&data.len())
}

/// Escapes `<`, `>` and `&` for HTML-formatted outbound text.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            _ => out.push(c),
        }
    }
    out
}

/// Parses `/search` arguments into a filter.
///
/// Tokens may appear in any order: a gender (`M`, `F`, `Laki-laki`,
/// `Perempuan`), a four-digit entry year, and a department given by code or
/// by full name. An empty argument string, or the word `any`, yields the
/// "any" filter.
pub fn parse_search_args(args: &str, now: DateTime<Utc>) -> Result<SearchFilter, AnonmatchError> {
    let mut filter = SearchFilter::any();
    let mut rest: Vec<&str> = Vec::new();

    for token in args.split_whitespace() {
        if token.eq_ignore_ascii_case("any") {
            continue;
        }
        if filter.gender.is_none() {
            if let Ok(g) = Gender::from_str(token) {
                filter.gender = Some(g);
                continue;
            }
        }
        if token.len() == 4 && token.chars().all(|c| c.is_ascii_digit()) {
            let year: i32 = token
                .parse()
                .map_err(|_| AnonmatchError::invalid("entry_year", "not a number"))?;
            if !is_valid_entry_year(year, now) {
                return Err(AnonmatchError::invalid(
                    "entry_year",
                    format!("must be between {MIN_ENTRY_YEAR} and the current year"),
                ));
            }
            filter.entry_year = Some(year);
            continue;
        }
        rest.push(token);
    }

    if !rest.is_empty() {
        let name = rest.join(" ");
        let dept = Department::from_str(&name)
            .map_err(|_| AnonmatchError::invalid("department", format!("unknown department '{name}'")))?;
        filter.department = Some(dept);
    }
    Ok(filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn confession_length_boundaries() {
        assert!(validate_text(&"a".repeat(9), CONFESSION).is_err());
        assert!(validate_text(&"a".repeat(10), CONFESSION).is_ok());
        assert!(validate_text(&"a".repeat(1000), CONFESSION).is_ok());
        assert!(validate_text(&"a".repeat(1001), CONFESSION).is_err());
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        // Ten multi-byte characters.
        assert!(validate_text("éééééééééé", CONFESSION).is_ok());
        assert!(validate_text("   short   ", CONFESSION).is_err());
    }

    #[test]
    fn sanitize_strips_control_chars() {
        assert_eq!(sanitize_text("  a\u{0}b\u{7f}c\n\td  "), "abc\n\td");
    }

    #[test]
    fn email_domains() {
        assert_eq!(
            normalize_email("  Budi.S@MHSW.PNJ.AC.ID ").unwrap(),
            "budi.s@mhsw.pnj.ac.id"
        );
        assert!(normalize_email("x@stu.pnj.ac.id").is_ok());
        assert!(normalize_email("dosen@pnj.ac.id").is_ok());
        assert!(normalize_email("x@gmail.com").is_err());
        assert!(normalize_email("x@evilpnj.ac.id").is_err());
        assert!(normalize_email("@pnj.ac.id").is_err());
        let long = format!("{}@pnj.ac.id", "a".repeat(250));
        assert!(normalize_email(&long).is_err());
    }

    #[test]
    fn callback_data_bounds() {
        assert!(!is_valid_callback_data(""));
        assert!(is_valid_callback_data("gender:M"));
        assert!(is_valid_callback_data(&"x".repeat(64)));
        assert!(!is_valid_callback_data(&"x".repeat(65)));
    }

    #[test]
    fn html_escaping() {
        assert_eq!(escape_html("<b>a & b</b>"), "&lt;b&gt;a &amp; b&lt;/b&gt;");
    }

    #[test]
    fn search_args_any_order() {
        let f = parse_search_args("2022 F tik", now()).unwrap();
        assert_eq!(f.gender, Some(Gender::Female));
        assert_eq!(f.entry_year, Some(2022));
        assert_eq!(f.department, Some(Department::TeknikInformatika));

        let f = parse_search_args("Teknik Sipil Laki-laki", now()).unwrap();
        assert_eq!(f.department, Some(Department::TeknikSipil));
        assert_eq!(f.gender, Some(Gender::Male));

        assert!(parse_search_args("", now()).unwrap().is_any());
        assert!(parse_search_args("ANY", now()).unwrap().is_any());
    }

    #[test]
    fn search_args_reject_bad_values() {
        assert!(parse_search_args("2014", now()).is_err());
        assert!(parse_search_args("2027", now()).is_err());
        assert!(parse_search_args("astronomy", now()).is_err());
    }
}
