// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable mirror of the waiting pool.
//!
//! The in-memory pool is authoritative while the process runs; these rows let
//! it be rebuilt on startup.

use anonmatch_core::AnonmatchError;
use anonmatch_core::traits::PersistedQueueEntry;
use anonmatch_core::types::{SearchFilter, UserId, UserState};
use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::database::Database;
use crate::models::parse_opt;
use crate::queries::users::{set_state_in, stored_state};

/// All pool rows, oldest first.
pub async fn load_queue(db: &Database) -> Result<Vec<PersistedQueueEntry>, AnonmatchError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, preferred_department, preferred_gender, preferred_year, joined_at
                 FROM chat_queue ORDER BY joined_at ASC, user_id ASC",
            )?;
            let entries = stmt
                .query_map([], |row| {
                    Ok(PersistedQueueEntry {
                        user_id: row.get(0)?,
                        filter: SearchFilter {
                            department: parse_opt(row.get(1)?),
                            gender: parse_opt(row.get(2)?),
                            entry_year: row.get(3)?,
                        },
                        joined_at: row.get(4)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(entries)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Upsert the pool row and set the user's state to `searching`.
pub async fn enqueue_seeker(
    db: &Database,
    entry: &PersistedQueueEntry,
) -> Result<(), AnonmatchError> {
    let entry = entry.clone();
    let now = Utc::now();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO chat_queue
                     (user_id, preferred_department, preferred_gender, preferred_year, joined_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(user_id) DO UPDATE SET
                     preferred_department = excluded.preferred_department,
                     preferred_gender = excluded.preferred_gender,
                     preferred_year = excluded.preferred_year,
                     joined_at = excluded.joined_at",
                params![
                    entry.user_id,
                    entry.filter.department.map(|d| d.to_string()),
                    entry.filter.gender.map(|g| g.to_string()),
                    entry.filter.entry_year,
                    entry.joined_at,
                ],
            )?;
            set_state_in(
                &tx,
                entry.user_id,
                UserState::Searching,
                &entry.filter.to_payload(),
                now,
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Remove the pool row. With `reset_state`, a `searching` state becomes `none`.
pub async fn dequeue_seeker(
    db: &Database,
    id: UserId,
    reset_state: bool,
) -> Result<bool, AnonmatchError> {
    let now = Utc::now();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let removed = tx.execute("DELETE FROM chat_queue WHERE user_id = ?1", params![id])?;
            if reset_state {
                tx.execute(
                    "UPDATE users SET state = '', state_payload = '', updated_at = ?1
                     WHERE id = ?2 AND state = ?3",
                    params![now, id, stored_state(UserState::Searching)],
                )?;
            }
            tx.commit()?;
            Ok(removed > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Clear the entry's preferences and move its join time.
pub async fn relax_queue_entry(
    db: &Database,
    id: UserId,
    joined_at: DateTime<Utc>,
) -> Result<(), AnonmatchError> {
    let now = Utc::now();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE chat_queue
                 SET preferred_department = NULL, preferred_gender = NULL,
                     preferred_year = NULL, joined_at = ?1
                 WHERE user_id = ?2",
                params![joined_at, id],
            )?;
            tx.execute(
                "UPDATE users SET state_payload = '', updated_at = ?1
                 WHERE id = ?2 AND state = ?3",
                params![now, id, stored_state(UserState::Searching)],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}
