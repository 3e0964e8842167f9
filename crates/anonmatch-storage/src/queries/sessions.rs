// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat session persistence.

use anonmatch_core::AnonmatchError;
use anonmatch_core::types::{ChatSession, EndedSession, SessionId, UserId, UserState};
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};

use crate::database::Database;
use crate::models::{SESSION_COLUMNS, row_to_session};
use crate::queries::users::{set_state_in, stored_state};

/// Insert an active session and bind both users to it in one transaction.
///
/// Both pool rows are deleted, both `total_chats` counters are incremented and
/// both states become `in_chat`. Nothing is written if any step fails.
pub async fn create_session(
    db: &Database,
    user1: UserId,
    user2: UserId,
    started_at: DateTime<Utc>,
) -> Result<ChatSession, AnonmatchError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO chat_sessions (user1_id, user2_id, active, started_at)
                 VALUES (?1, ?2, 1, ?3)",
                params![user1, user2, started_at],
            )?;
            let id = tx.last_insert_rowid();
            for user in [user1, user2] {
                tx.execute("DELETE FROM chat_queue WHERE user_id = ?1", params![user])?;
                tx.execute(
                    "UPDATE users SET total_chats = total_chats + 1 WHERE id = ?1",
                    params![user],
                )?;
                set_state_in(&tx, user, UserState::InChat, "", started_at)?;
            }
            tx.commit()?;
            Ok(ChatSession {
                id,
                user1,
                user2,
                active: true,
                started_at,
                ended_at: None,
            })
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_active_session(
    db: &Database,
    user: UserId,
) -> Result<Option<ChatSession>, AnonmatchError> {
    db.connection()
        .call(move |conn| {
            let session = conn
                .query_row(
                    &format!(
                        "SELECT {SESSION_COLUMNS} FROM chat_sessions
                         WHERE active = 1 AND (user1_id = ?1 OR user2_id = ?1)
                         ORDER BY id DESC LIMIT 1"
                    ),
                    params![user],
                    row_to_session,
                )
                .optional()?;
            Ok(session)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_session(
    db: &Database,
    id: SessionId,
) -> Result<Option<ChatSession>, AnonmatchError> {
    db.connection()
        .call(move |conn| {
            let session = conn
                .query_row(
                    &format!("SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE id = ?1"),
                    params![id],
                    row_to_session,
                )
                .optional()?;
            Ok(session)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// End an active session and reset both users to `none`.
///
/// Returns `None` when the session does not exist or was already ended, so a
/// concurrent second `end` is a no-op.
pub async fn end_session(
    db: &Database,
    id: SessionId,
    ended_at: DateTime<Utc>,
) -> Result<Option<EndedSession>, AnonmatchError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let row: Option<(UserId, UserId, DateTime<Utc>)> = tx
                .query_row(
                    "UPDATE chat_sessions SET active = 0, ended_at = MAX(?1, started_at)
                     WHERE id = ?2 AND active = 1
                     RETURNING user1_id, user2_id, started_at",
                    params![ended_at, id],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;

            let Some((user1, user2, started_at)) = row else {
                tx.commit()?;
                return Ok(None);
            };

            // States that only exist while the session does.
            let in_chat = stored_state(UserState::InChat);
            let reporting = stored_state(UserState::AwaitingReport);
            for user in [user1, user2] {
                tx.execute(
                    "UPDATE users SET state = '', state_payload = '', updated_at = ?1
                     WHERE id = ?2 AND state IN (?3, ?4)",
                    params![ended_at, user, in_chat, reporting],
                )?;
            }
            tx.commit()?;

            Ok(Some(EndedSession {
                session_id: id,
                user1,
                user2,
                started_at,
                ended_at: ended_at.max(started_at),
            }))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn count_active_sessions(db: &Database) -> Result<i64, AnonmatchError> {
    db.connection()
        .call(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM chat_sessions WHERE active = 1",
                [],
                |row| row.get(0),
            )?)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
