// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use anonmatch_core::AnonmatchError;
use anonmatch_core::types::{Achievement, UserId};
use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::database::Database;

/// Award an achievement. Returns false if the user already had it.
pub async fn award_achievement(
    db: &Database,
    user: UserId,
    key: &str,
    at: DateTime<Utc>,
) -> Result<bool, AnonmatchError> {
    let key = key.to_string();
    db.connection()
        .call(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO user_achievements (user_id, achievement_key, earned_at)
                 VALUES (?1, ?2, ?3)",
                params![user, key, at],
            )?;
            Ok(inserted > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn list_achievements(
    db: &Database,
    user: UserId,
) -> Result<Vec<Achievement>, AnonmatchError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, achievement_key, earned_at FROM user_achievements
                 WHERE user_id = ?1 ORDER BY earned_at, achievement_key",
            )?;
            let rows = stmt.query_map(params![user], |row| {
                Ok(Achievement {
                    user_id: row.get(0)?,
                    key: row.get(1)?,
                    earned_at: row.get(2)?,
                })
            })?;
            let mut achievements = Vec::new();
            for row in rows {
                achievements.push(row?);
            }
            Ok(achievements)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::users::create_user;
    use tempfile::tempdir;

    #[tokio::test]
    async fn achievements_are_awarded_once() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        create_user(&db, 1).await.unwrap();

        assert!(award_achievement(&db, 1, "first_chat", Utc::now()).await.unwrap());
        assert!(!award_achievement(&db, 1, "first_chat", Utc::now()).await.unwrap());
        assert!(award_achievement(&db, 1, "marathon", Utc::now()).await.unwrap());

        let keys: Vec<String> = list_achievements(&db, 1)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.key)
            .collect();
        assert_eq!(keys, vec!["first_chat", "marathon"]);
        db.close().await.unwrap();
    }
}
