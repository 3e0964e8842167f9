// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row mapping between SQLite rows and core domain types.

use std::str::FromStr;

use anonmatch_core::types::{ChatSession, User};

/// Column list matching [`row_to_user`].
pub(crate) const USER_COLUMNS: &str = "id, email, verified, banned, gender, department, \
     entry_year, display_name, report_count, total_chats, karma, created_at, updated_at";

pub(crate) const SESSION_COLUMNS: &str = "id, user1_id, user2_id, active, started_at, ended_at";

/// Parses an optional enum column; unknown values read as absent.
pub(crate) fn parse_opt<T: FromStr>(value: Option<String>) -> Option<T> {
    value.and_then(|v| T::from_str(&v).ok())
}

pub(crate) fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        verified: row.get(2)?,
        banned: row.get(3)?,
        gender: parse_opt(row.get(4)?),
        department: parse_opt(row.get(5)?),
        entry_year: row.get(6)?,
        display_name: row.get(7)?,
        report_count: row.get(8)?,
        total_chats: row.get(9)?,
        karma: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

pub(crate) fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatSession> {
    Ok(ChatSession {
        id: row.get(0)?,
        user1: row.get(1)?,
        user2: row.get(2)?,
        active: row.get(3)?,
        started_at: row.get(4)?,
        ended_at: row.get(5)?,
    })
}
