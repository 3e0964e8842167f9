// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-time email verification codes.

use anonmatch_core::AnonmatchError;
use anonmatch_core::types::{UserId, VerificationCode};
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};

use crate::database::Database;

/// Store a fresh code. Any earlier code for the same user is discarded.
pub async fn save_verification_code(
    db: &Database,
    code: &VerificationCode,
) -> Result<(), AnonmatchError> {
    let code = code.clone();
    let now = Utc::now();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM verification_codes WHERE user_id = ?1",
                params![code.user_id],
            )?;
            tx.execute(
                "INSERT INTO verification_codes (user_id, email, code, expires_at, used, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![code.user_id, code.email, code.code, code.expires_at, code.used, now],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Consume a matching unused code that has not expired at `now`.
pub async fn consume_verification_code(
    db: &Database,
    user: UserId,
    code: &str,
    now: DateTime<Utc>,
) -> Result<Option<VerificationCode>, AnonmatchError> {
    let code = code.to_string();
    db.connection()
        .call(move |conn| {
            let row = conn
                .query_row(
                    "UPDATE verification_codes SET used = 1
                     WHERE user_id = ?1 AND code = ?2 AND used = 0 AND expires_at > ?3
                     RETURNING user_id, email, code, expires_at",
                    params![user, code, now],
                    |row| {
                        Ok(VerificationCode {
                            user_id: row.get(0)?,
                            email: row.get(1)?,
                            code: row.get(2)?,
                            expires_at: row.get(3)?,
                            used: true,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
        .await
        .map_err(crate::database::map_tr_err)
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
        create_user(&db, 7).await.unwrap();
        (db, dir)
    }

    fn code(value: &str, expires_in: Duration) -> VerificationCode {
        VerificationCode {
            user_id: 7,
            email: "someone@student.univ.ac.id".into(),
            code: value.into(),
            expires_at: Utc::now() + expires_in,
            used: false,
        }
    }

    #[tokio::test]
    async fn code_is_consumed_once() {
        let (db, _dir) = setup_db().await;
        save_verification_code(&db, &code("123456", Duration::minutes(10)))
            .await
            .unwrap();

        let consumed = consume_verification_code(&db, 7, "123456", Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(consumed.email, "someone@student.univ.ac.id");
        assert!(
            consume_verification_code(&db, 7, "123456", Utc::now())
                .await
                .unwrap()
                .is_none()
        );
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn new_code_replaces_old_one() {
        let (db, _dir) = setup_db().await;
        save_verification_code(&db, &code("111111", Duration::minutes(10)))
            .await
            .unwrap();
        save_verification_code(&db, &code("222222", Duration::minutes(10)))
            .await
            .unwrap();

        let now = Utc::now();
        assert!(consume_verification_code(&db, 7, "111111", now).await.unwrap().is_none());
        assert!(consume_verification_code(&db, 7, "222222", now).await.unwrap().is_some());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn expired_code_is_rejected() {
        let (db, _dir) = setup_db().await;
        save_verification_code(&db, &code("333333", Duration::minutes(-1)))
            .await
            .unwrap();
        assert!(
            consume_verification_code(&db, 7, "333333", Utc::now())
                .await
                .unwrap()
                .is_none()
        );
        db.close().await.unwrap();
    }
}
