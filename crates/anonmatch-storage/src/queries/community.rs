// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Confessions, replies, polls and whispers.

use anonmatch_core::AnonmatchError;
use anonmatch_core::community::{Confession, ConfessionReply, Poll, PollOption, Whisper};
use anonmatch_core::types::{Department, UserId};
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};

use crate::database::Database;
use crate::models::parse_opt;

const CONFESSION_SELECT: &str = "SELECT c.id, c.author_id, c.content, c.department, \
     (SELECT COUNT(*) FROM confession_reactions r WHERE r.confession_id = c.id), c.created_at \
     FROM confessions c";

fn row_to_confession(row: &rusqlite::Row<'_>) -> rusqlite::Result<Confession> {
    Ok(Confession {
        id: row.get(0)?,
        author_id: row.get(1)?,
        content: row.get(2)?,
        department: parse_opt(row.get(3)?),
        reaction_count: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn row_to_reply(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConfessionReply> {
    Ok(ConfessionReply {
        id: row.get(0)?,
        confession_id: row.get(1)?,
        author_id: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Counts rows in `table` written by `author` at or after `since`.
async fn count_since(
    db: &Database,
    table: &'static str,
    author_column: &'static str,
    author: UserId,
    since: DateTime<Utc>,
) -> Result<i64, AnonmatchError> {
    db.connection()
        .call(move |conn| {
            Ok(conn.query_row(
                &format!(
                    "SELECT COUNT(*) FROM {table} WHERE {author_column} = ?1 AND created_at >= ?2"
                ),
                params![author, since],
                |row| row.get(0),
            )?)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

// --- Confessions ---

pub async fn create_confession(
    db: &Database,
    author: UserId,
    content: &str,
    department: Option<Department>,
    at: DateTime<Utc>,
) -> Result<Confession, AnonmatchError> {
    let content = content.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO confessions (author_id, content, department, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![author, content, department.map(|d| d.to_string()), at],
            )?;
            Ok(Confession {
                id: conn.last_insert_rowid(),
                author_id: author,
                content,
                department,
                reaction_count: 0,
                created_at: at,
            })
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn count_confessions_since(
    db: &Database,
    author: UserId,
    since: DateTime<Utc>,
) -> Result<i64, AnonmatchError> {
    count_since(db, "confessions", "author_id", author, since).await
}

pub async fn count_confessions_by(db: &Database, author: UserId) -> Result<i64, AnonmatchError> {
    db.connection()
        .call(move |conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM confessions WHERE author_id = ?1",
                params![author],
                |row| row.get(0),
            )?)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Newest first.
pub async fn latest_confessions(
    db: &Database,
    limit: usize,
) -> Result<Vec<Confession>, AnonmatchError> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare(&format!("{CONFESSION_SELECT} ORDER BY c.id DESC LIMIT ?1"))?;
            let rows = stmt.query_map(params![limit], row_to_confession)?;
            let mut confessions = Vec::new();
            for row in rows {
                confessions.push(row?);
            }
            Ok(confessions)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_confession(db: &Database, id: i64) -> Result<Option<Confession>, AnonmatchError> {
    db.connection()
        .call(move |conn| {
            let confession = conn
                .query_row(
                    &format!("{CONFESSION_SELECT} WHERE c.id = ?1"),
                    params![id],
                    row_to_confession,
                )
                .optional()?;
            Ok(confession)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Upsert the user's reaction on a confession.
pub async fn react_to_confession(
    db: &Database,
    confession_id: i64,
    user: UserId,
    emoji: &str,
) -> Result<(), AnonmatchError> {
    let emoji = emoji.to_string();
    let now = Utc::now();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO confession_reactions (confession_id, user_id, reaction, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(confession_id, user_id)
                 DO UPDATE SET reaction = excluded.reaction, created_at = excluded.created_at",
                params![confession_id, user, emoji, now],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Reaction tallies, most popular first.
pub async fn reaction_counts(
    db: &Database,
    confession_id: i64,
) -> Result<Vec<(String, i64)>, AnonmatchError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT reaction, COUNT(*) AS n FROM confession_reactions
                 WHERE confession_id = ?1 GROUP BY reaction ORDER BY n DESC, reaction",
            )?;
            let rows = stmt.query_map(params![confession_id], |row| Ok((row.get(0)?, row.get(1)?)))?;
            let mut counts = Vec::new();
            for row in rows {
                counts.push(row?);
            }
            Ok(counts)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

// --- Replies ---

pub async fn create_reply(
    db: &Database,
    confession_id: i64,
    author: UserId,
    content: &str,
    at: DateTime<Utc>,
) -> Result<ConfessionReply, AnonmatchError> {
    let content = content.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO confession_replies (confession_id, author_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![confession_id, author, content, at],
            )?;
            Ok(ConfessionReply {
                id: conn.last_insert_rowid(),
                confession_id,
                author_id: author,
                content,
                created_at: at,
            })
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn count_replies_since(
    db: &Database,
    author: UserId,
    since: DateTime<Utc>,
) -> Result<i64, AnonmatchError> {
    count_since(db, "confession_replies", "author_id", author, since).await
}

/// Oldest first.
pub async fn list_replies(
    db: &Database,
    confession_id: i64,
) -> Result<Vec<ConfessionReply>, AnonmatchError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, confession_id, author_id, content, created_at
                 FROM confession_replies WHERE confession_id = ?1 ORDER BY id",
            )?;
            let rows = stmt.query_map(params![confession_id], row_to_reply)?;
            let mut replies = Vec::new();
            for row in rows {
                replies.push(row?);
            }
            Ok(replies)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

// --- Polls ---

pub async fn create_poll(
    db: &Database,
    author: UserId,
    question: &str,
    options: &[String],
    at: DateTime<Utc>,
) -> Result<Poll, AnonmatchError> {
    let question = question.to_string();
    let options = options.to_vec();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO polls (author_id, question, created_at) VALUES (?1, ?2, ?3)",
                params![author, question, at],
            )?;
            let poll_id = tx.last_insert_rowid();
            let mut stored = Vec::with_capacity(options.len());
            for (position, text) in options.into_iter().enumerate() {
                tx.execute(
                    "INSERT INTO poll_options (poll_id, option_text, position) VALUES (?1, ?2, ?3)",
                    params![poll_id, text, position as i64],
                )?;
                stored.push(PollOption {
                    id: tx.last_insert_rowid(),
                    text,
                    votes: 0,
                });
            }
            tx.commit()?;
            Ok(Poll {
                id: poll_id,
                author_id: author,
                question,
                options: stored,
                created_at: at,
            })
        })
        .await
        .map_err(crate::database::map_tr_err)
}

fn load_poll(conn: &rusqlite::Connection, id: i64) -> rusqlite::Result<Option<Poll>> {
    let head: Option<(UserId, String, DateTime<Utc>)> = conn
        .query_row(
            "SELECT author_id, question, created_at FROM polls WHERE id = ?1",
            params![id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;
    let Some((author_id, question, created_at)) = head else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT o.id, o.option_text,
                (SELECT COUNT(*) FROM poll_votes v WHERE v.option_id = o.id)
         FROM poll_options o WHERE o.poll_id = ?1 ORDER BY o.position",
    )?;
    let rows = stmt.query_map(params![id], |row| {
        Ok(PollOption {
            id: row.get(0)?,
            text: row.get(1)?,
            votes: row.get(2)?,
        })
    })?;
    let mut options = Vec::new();
    for row in rows {
        options.push(row?);
    }

    Ok(Some(Poll {
        id,
        author_id,
        question,
        options,
        created_at,
    }))
}

pub async fn get_poll(db: &Database, id: i64) -> Result<Option<Poll>, AnonmatchError> {
    db.connection()
        .call(move |conn| Ok(load_poll(conn, id)?))
        .await
        .map_err(crate::database::map_tr_err)
}

/// Newest first.
pub async fn latest_polls(db: &Database, limit: usize) -> Result<Vec<Poll>, AnonmatchError> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| {
            let ids: Vec<i64> = {
                let mut stmt = conn.prepare("SELECT id FROM polls ORDER BY id DESC LIMIT ?1")?;
                let rows = stmt.query_map(params![limit], |row| row.get(0))?;
                rows.collect::<rusqlite::Result<_>>()?
            };
            let mut polls = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(poll) = load_poll(conn, id)? {
                    polls.push(poll);
                }
            }
            Ok(polls)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record a vote. Returns false if the user already voted or the option is not
/// part of the poll.
pub async fn vote_poll(
    db: &Database,
    poll_id: i64,
    option_id: i64,
    user: UserId,
) -> Result<bool, AnonmatchError> {
    let now = Utc::now();
    db.connection()
        .call(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO poll_votes (poll_id, option_id, user_id, created_at)
                 SELECT ?1, id, ?3, ?4 FROM poll_options WHERE id = ?2 AND poll_id = ?1",
                params![poll_id, option_id, user, now],
            )?;
            Ok(inserted > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

// --- Whispers ---

pub async fn create_whisper(db: &Database, whisper: &Whisper) -> Result<(), AnonmatchError> {
    let whisper = whisper.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO whispers (sender_id, target_department, content, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    whisper.sender_id,
                    whisper.target_department.to_string(),
                    whisper.content,
                    whisper.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn count_whispers_since(
    db: &Database,
    sender: UserId,
    since: DateTime<Utc>,
) -> Result<i64, AnonmatchError> {
    count_since(db, "whispers", "sender_id", sender, since).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::users::create_user;
    use chrono::Duration;
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
    async fn confession_reactions_are_one_per_user() {
        let (db, _dir) = setup_db().await;
        let confession = create_confession(
            &db,
            1,
            "I still don't understand thermodynamics",
            Some(Department::TeknikMesin),
            Utc::now(),
        )
        .await
        .unwrap();

        react_to_confession(&db, confession.id, 2, "❤️").await.unwrap();
        react_to_confession(&db, confession.id, 2, "😂").await.unwrap();
        react_to_confession(&db, confession.id, 3, "😂").await.unwrap();

        assert_eq!(
            reaction_counts(&db, confession.id).await.unwrap(),
            vec![("😂".to_string(), 2)]
        );
        let stored = get_confession(&db, confession.id).await.unwrap().unwrap();
        assert_eq!(stored.reaction_count, 2);
        assert_eq!(stored.department, Some(Department::TeknikMesin));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn latest_confessions_are_newest_first() {
        let (db, _dir) = setup_db().await;
        for text in ["first confession", "second confession", "third confession"] {
            create_confession(&db, 1, text, None, Utc::now()).await.unwrap();
        }
        let latest = latest_confessions(&db, 2).await.unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].content, "third confession");
        assert_eq!(count_confessions_by(&db, 1).await.unwrap(), 3);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn hourly_counters_respect_the_window() {
        let (db, _dir) = setup_db().await;
        let old = Utc::now() - Duration::hours(2);
        create_confession(&db, 1, "an old confession", None, old).await.unwrap();
        let fresh = create_confession(&db, 1, "a fresh confession", None, Utc::now())
            .await
            .unwrap();
        create_reply(&db, fresh.id, 2, "same here", Utc::now()).await.unwrap();

        let since = Utc::now() - Duration::hours(1);
        assert_eq!(count_confessions_since(&db, 1, since).await.unwrap(), 1);
        assert_eq!(count_replies_since(&db, 2, since).await.unwrap(), 1);
        assert_eq!(list_replies(&db, fresh.id).await.unwrap()[0].content, "same here");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn poll_votes_are_unique_per_user() {
        let (db, _dir) = setup_db().await;
        let poll = create_poll(
            &db,
            1,
            "Best canteen on campus?",
            &["North".to_string(), "South".to_string()],
            Utc::now(),
        )
        .await
        .unwrap();
        let north = poll.options[0].id;
        let south = poll.options[1].id;

        assert!(vote_poll(&db, poll.id, north, 2).await.unwrap());
        assert!(!vote_poll(&db, poll.id, south, 2).await.unwrap());
        assert!(vote_poll(&db, poll.id, south, 3).await.unwrap());
        assert!(!vote_poll(&db, poll.id, 9999, 1).await.unwrap());

        let stored = get_poll(&db, poll.id).await.unwrap().unwrap();
        assert_eq!(stored.total_votes(), 2);
        assert_eq!(stored.options[0].text, "North");
        assert_eq!(latest_polls(&db, 5).await.unwrap().len(), 1);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn whispers_are_counted() {
        let (db, _dir) = setup_db().await;
        let whisper = Whisper {
            sender_id: 1,
            target_department: Department::Akuntansi,
            content: "Good luck on finals".into(),
            created_at: Utc::now(),
        };
        create_whisper(&db, &whisper).await.unwrap();
        let since = Utc::now() - Duration::hours(1);
        assert_eq!(count_whispers_since(&db, 1, since).await.unwrap(), 1);
        db.close().await.unwrap();
    }
}
