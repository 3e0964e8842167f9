// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity store and state register operations.

use std::str::FromStr;

use anonmatch_core::AnonmatchError;
use anonmatch_core::types::{Department, StateSnapshot, User, UserId, UserState};
use chrono::Utc;
use rusqlite::{OptionalExtension, params};

use crate::database::Database;
use crate::models::{USER_COLUMNS, row_to_user};

/// Insert the user if absent, then return the stored row.
pub async fn create_user(db: &Database, id: UserId) -> Result<User, AnonmatchError> {
    let now = Utc::now();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO users (id, created_at, updated_at) VALUES (?1, ?2, ?2)",
                params![id, now],
            )?;
            let user = conn.query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                row_to_user,
            )?;
            Ok(user)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_user(db: &Database, id: UserId) -> Result<Option<User>, AnonmatchError> {
    db.connection()
        .call(move |conn| {
            let user = conn
                .query_row(
                    &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                    params![id],
                    row_to_user,
                )
                .optional()?;
            Ok(user)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Update a single column. `column` is always a compile-time constant.
async fn set_column<T>(
    db: &Database,
    id: UserId,
    column: &'static str,
    value: T,
) -> Result<(), AnonmatchError>
where
    T: rusqlite::ToSql + Send + 'static,
{
    let now = Utc::now();
    db.connection()
        .call(move |conn| {
            conn.execute(
                &format!("UPDATE users SET {column} = ?1, updated_at = ?2 WHERE id = ?3"),
                params![value, now, id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn set_email(db: &Database, id: UserId, email: &str) -> Result<(), AnonmatchError> {
    set_column(db, id, "email", email.to_string()).await
}

pub async fn set_verified(db: &Database, id: UserId, email: &str) -> Result<(), AnonmatchError> {
    let email = email.to_string();
    let now = Utc::now();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE users SET verified = 1, email = ?1, updated_at = ?2 WHERE id = ?3",
                params![email, now, id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn set_gender(
    db: &Database,
    id: UserId,
    gender: anonmatch_core::types::Gender,
) -> Result<(), AnonmatchError> {
    set_column(db, id, "gender", gender.to_string()).await
}

pub async fn set_entry_year(db: &Database, id: UserId, year: i32) -> Result<(), AnonmatchError> {
    set_column(db, id, "entry_year", year).await
}

pub async fn set_department(
    db: &Database,
    id: UserId,
    dept: Department,
) -> Result<(), AnonmatchError> {
    set_column(db, id, "department", dept.to_string()).await
}

pub async fn set_banned(db: &Database, id: UserId, banned: bool) -> Result<(), AnonmatchError> {
    set_column(db, id, "banned", banned).await
}

/// Writes the display handle only when none is set yet.
pub async fn assign_display_name(
    db: &Database,
    id: UserId,
    name: &str,
) -> Result<bool, AnonmatchError> {
    let name = name.to_string();
    let now = Utc::now();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE users SET display_name = ?1, updated_at = ?2
                 WHERE id = ?3 AND (display_name IS NULL OR display_name = '')",
                params![name, now, id],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Atomically add `delta` to the user's karma and return the new value.
pub async fn increment_karma(db: &Database, id: UserId, delta: i64) -> Result<i64, AnonmatchError> {
    let now = Utc::now();
    db.connection()
        .call(move |conn| {
            let karma = conn.query_row(
                "UPDATE users SET karma = karma + ?1, updated_at = ?2 WHERE id = ?3
                 RETURNING karma",
                params![delta, now, id],
                |row| row.get(0),
            )?;
            Ok(karma)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn count_users(db: &Database) -> Result<i64, AnonmatchError> {
    db.connection()
        .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?))
        .await
        .map_err(crate::database::map_tr_err)
}

/// Verified, unbanned users of `dept`, excluding `except`.
pub async fn department_members(
    db: &Database,
    dept: Department,
    except: UserId,
) -> Result<Vec<UserId>, AnonmatchError> {
    let dept = dept.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id FROM users
                 WHERE department = ?1 AND verified = 1 AND banned = 0 AND id <> ?2
                 ORDER BY id",
            )?;
            let ids = stmt
                .query_map(params![dept, except], |row| row.get(0))?
                .collect::<Result<Vec<UserId>, _>>()?;
            Ok(ids)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Current state of a user; unknown users read as `none`.
pub async fn get_state(db: &Database, id: UserId) -> Result<StateSnapshot, AnonmatchError> {
    db.connection()
        .call(move |conn| {
            let row: Option<(String, String)> = conn
                .query_row(
                    "SELECT state, state_payload FROM users WHERE id = ?1",
                    params![id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            Ok(row
                .map(|(state, payload)| StateSnapshot {
                    state: UserState::from_str(&state).unwrap_or_default(),
                    payload,
                })
                .unwrap_or_default())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn set_state(
    db: &Database,
    id: UserId,
    state: UserState,
    payload: &str,
) -> Result<(), AnonmatchError> {
    let payload = payload.to_string();
    let now = Utc::now();
    db.connection()
        .call(move |conn| {
            set_state_in(conn, id, state, &payload, now)?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// State write usable inside a larger transaction.
pub(crate) fn set_state_in(
    conn: &rusqlite::Connection,
    id: UserId,
    state: UserState,
    payload: &str,
    now: chrono::DateTime<Utc>,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE users SET state = ?1, state_payload = ?2, updated_at = ?3 WHERE id = ?4",
        params![stored_state(state), payload, now, id],
    )?;
    Ok(())
}

/// `none` is stored as the empty string.
pub(crate) fn stored_state(state: UserState) -> String {
    match state {
        UserState::None => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anonmatch_core::types::Gender;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn create_user_is_idempotent() {
        let (db, _dir) = setup_db().await;

        let first = create_user(&db, 100).await.unwrap();
        set_gender(&db, 100, Gender::Female).await.unwrap();
        let second = create_user(&db, 100).await.unwrap();

        assert_eq!(first.id, 100);
        assert_eq!(second.gender, Some(Gender::Female));
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(count_users(&db).await.unwrap(), 1);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn missing_user_reads_as_none() {
        let (db, _dir) = setup_db().await;
        assert!(get_user(&db, 7).await.unwrap().is_none());
        assert_eq!(get_state(&db, 7).await.unwrap(), StateSnapshot::default());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn profile_setters_complete_the_profile() {
        let (db, _dir) = setup_db().await;
        create_user(&db, 1).await.unwrap();
        assert!(!get_user(&db, 1).await.unwrap().unwrap().is_profile_complete());

        set_verified(&db, 1, "a@stu.pnj.ac.id").await.unwrap();
        set_gender(&db, 1, Gender::Male).await.unwrap();
        set_entry_year(&db, 1, 2022).await.unwrap();
        set_department(&db, 1, Department::Akuntansi).await.unwrap();

        let user = get_user(&db, 1).await.unwrap().unwrap();
        assert!(user.is_profile_complete());
        assert_eq!(user.email.as_deref(), Some("a@stu.pnj.ac.id"));
        assert_eq!(user.department, Some(Department::Akuntansi));
        assert_eq!(user.entry_year, Some(2022));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn display_name_is_assigned_once() {
        let (db, _dir) = setup_db().await;
        create_user(&db, 1).await.unwrap();
        assert!(assign_display_name(&db, 1, "Silent Fox 12").await.unwrap());
        assert!(!assign_display_name(&db, 1, "Bold Owl 3").await.unwrap());
        let user = get_user(&db, 1).await.unwrap().unwrap();
        assert_eq!(user.display_name.as_deref(), Some("Silent Fox 12"));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn karma_increments_atomically() {
        let (db, _dir) = setup_db().await;
        create_user(&db, 1).await.unwrap();
        assert_eq!(increment_karma(&db, 1, 2).await.unwrap(), 2);
        assert_eq!(increment_karma(&db, 1, 1).await.unwrap(), 3);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn state_round_trip_stores_none_as_empty() {
        let (db, _dir) = setup_db().await;
        create_user(&db, 1).await.unwrap();

        set_state(&db, 1, UserState::AwaitingOtp, "x@pnj.ac.id").await.unwrap();
        let snap = get_state(&db, 1).await.unwrap();
        assert_eq!(snap.state, UserState::AwaitingOtp);
        assert_eq!(snap.payload, "x@pnj.ac.id");

        set_state(&db, 1, UserState::None, "").await.unwrap();
        let raw: String = db
            .connection()
            .call(|conn| Ok(conn.query_row("SELECT state FROM users WHERE id = 1", [], |r| r.get(0))?))
            .await
            .map_err(crate::database::map_tr_err)
            .unwrap();
        assert_eq!(raw, "");
        assert_eq!(get_state(&db, 1).await.unwrap().state, UserState::None);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn department_members_skip_banned_and_unverified() {
        let (db, _dir) = setup_db().await;
        for id in 1..=4 {
            create_user(&db, id).await.unwrap();
            set_department(&db, id, Department::TeknikMesin).await.unwrap();
        }
        set_verified(&db, 1, "a@pnj.ac.id").await.unwrap();
        set_verified(&db, 2, "b@pnj.ac.id").await.unwrap();
        set_verified(&db, 3, "c@pnj.ac.id").await.unwrap();
        set_banned(&db, 3, true).await.unwrap();

        let members = department_members(&db, Department::TeknikMesin, 1).await.unwrap();
        assert_eq!(members, vec![2]);
        db.close().await.unwrap();
    }
}
