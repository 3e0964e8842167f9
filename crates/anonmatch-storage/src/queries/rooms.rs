// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Circles: named multi-user rooms. A user sits in at most one circle.

use anonmatch_core::AnonmatchError;
use anonmatch_core::community::Room;
use anonmatch_core::types::UserId;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};

use crate::database::Database;

const ROOM_SELECT: &str = "SELECT r.id, r.slug, r.name, r.description, \
     (SELECT COUNT(*) FROM room_members m WHERE m.room_id = r.id), r.created_at \
     FROM rooms r";

fn row_to_room(row: &rusqlite::Row<'_>) -> rusqlite::Result<Room> {
    Ok(Room {
        id: row.get(0)?,
        slug: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        member_count: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Active rooms, busiest first.
pub async fn list_rooms(db: &Database) -> Result<Vec<Room>, AnonmatchError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{ROOM_SELECT} WHERE r.active = 1 ORDER BY 5 DESC, r.name"
            ))?;
            let rows = stmt.query_map([], row_to_room)?;
            let mut rooms = Vec::new();
            for row in rows {
                rooms.push(row?);
            }
            Ok(rooms)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_room_by_slug(db: &Database, slug: &str) -> Result<Option<Room>, AnonmatchError> {
    let slug = slug.to_string();
    db.connection()
        .call(move |conn| {
            let room = conn
                .query_row(
                    &format!("{ROOM_SELECT} WHERE r.slug = ?1 AND r.active = 1"),
                    params![slug],
                    row_to_room,
                )
                .optional()?;
            Ok(room)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn create_room(
    db: &Database,
    slug: &str,
    name: &str,
    description: &str,
    at: DateTime<Utc>,
) -> Result<Room, AnonmatchError> {
    let (slug, name, description) = (slug.to_string(), name.to_string(), description.to_string());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO rooms (slug, name, description, active, created_at)
                 VALUES (?1, ?2, ?3, 1, ?4)",
                params![slug, name, description, at],
            )?;
            Ok(Room {
                id: conn.last_insert_rowid(),
                slug,
                name,
                description,
                member_count: 0,
                created_at: at,
            })
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Move the user into `room_id`, leaving any other room.
pub async fn join_room(db: &Database, room_id: i64, user: UserId) -> Result<(), AnonmatchError> {
    let now = Utc::now();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM room_members WHERE user_id = ?1", params![user])?;
            tx.execute(
                "INSERT INTO room_members (room_id, user_id, joined_at) VALUES (?1, ?2, ?3)",
                params![room_id, user, now],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn leave_rooms(db: &Database, user: UserId) -> Result<(), AnonmatchError> {
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM room_members WHERE user_id = ?1", params![user])?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn room_members(db: &Database, room_id: i64) -> Result<Vec<UserId>, AnonmatchError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id FROM room_members WHERE room_id = ?1 ORDER BY joined_at, user_id",
            )?;
            let rows = stmt.query_map(params![room_id], |row| row.get(0))?;
            let mut members = Vec::new();
            for row in rows {
                members.push(row?);
            }
            Ok(members)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn user_room(db: &Database, user: UserId) -> Result<Option<Room>, AnonmatchError> {
    db.connection()
        .call(move |conn| {
            let room = conn
                .query_row(
                    &format!(
                        "{ROOM_SELECT} JOIN room_members rm ON rm.room_id = r.id
                         WHERE rm.user_id = ?1 LIMIT 1"
                    ),
                    params![user],
                    row_to_room,
                )
                .optional()?;
            Ok(room)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::users::create_user;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        for id in 1..=3 {
            create_user(&db, id).await.unwrap();
        }
        (db, dir)
    }

    #[tokio::test]
    async fn joining_a_room_leaves_the_previous_one() {
        let (db, _dir) = setup_db().await;
        let music = create_room(&db, "music", "Music", "Share songs", Utc::now())
            .await
            .unwrap();
        let games = create_room(&db, "games", "Games", "Play together", Utc::now())
            .await
            .unwrap();

        join_room(&db, music.id, 1).await.unwrap();
        join_room(&db, music.id, 2).await.unwrap();
        join_room(&db, games.id, 1).await.unwrap();

        assert_eq!(room_members(&db, music.id).await.unwrap(), vec![2]);
        assert_eq!(user_room(&db, 1).await.unwrap().unwrap().slug, "games");

        let rooms = list_rooms(&db).await.unwrap();
        assert_eq!(rooms.len(), 2);
        assert!(rooms.iter().all(|r| r.member_count == 1));

        leave_rooms(&db, 1).await.unwrap();
        assert!(user_room(&db, 1).await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_slug_is_rejected() {
        let (db, _dir) = setup_db().await;
        create_room(&db, "music", "Music", "Share songs", Utc::now())
            .await
            .unwrap();
        assert!(
            create_room(&db, "music", "Music 2", "Another one", Utc::now())
                .await
                .is_err()
        );
        assert!(get_room_by_slug(&db, "music").await.unwrap().is_some());
        assert!(get_room_by_slug(&db, "nothing").await.unwrap().is_none());
        db.close().await.unwrap();
    }
}
