// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reports and block edges.

use anonmatch_core::AnonmatchError;
use anonmatch_core::types::{Report, ReportOutcome, UserId};
use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::database::Database;

/// Record that `owner` blocked `blocked`. Repeating a block is a no-op.
pub async fn block_user(db: &Database, owner: UserId, blocked: UserId) -> Result<(), AnonmatchError> {
    let now = Utc::now();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO blocked_users (user_id, blocked_id, created_at)
                 VALUES (?1, ?2, ?3)",
                params![owner, blocked, now],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Every user with a block edge in either direction.
pub async fn blocked_peers(db: &Database, user: UserId) -> Result<Vec<UserId>, AnonmatchError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT blocked_id FROM blocked_users WHERE user_id = ?1
                 UNION
                 SELECT user_id FROM blocked_users WHERE blocked_id = ?1",
            )?;
            let rows = stmt.query_map(params![user], |row| row.get(0))?;
            let mut peers = Vec::new();
            for row in rows {
                peers.push(row?);
            }
            Ok(peers)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn count_reports_since(
    db: &Database,
    reporter: UserId,
    since: DateTime<Utc>,
) -> Result<i64, AnonmatchError> {
    db.connection()
        .call(move |conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM reports WHERE reporter_id = ?1 AND created_at >= ?2",
                params![reporter, since],
                |row| row.get(0),
            )?)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Insert the report, bump the reported user's counter and ban at the threshold.
pub async fn create_report(
    db: &Database,
    report: &Report,
    auto_ban_threshold: i64,
) -> Result<ReportOutcome, AnonmatchError> {
    let report = report.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO reports (reporter_id, reported_id, reason, session_id, evidence, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    report.reporter_id,
                    report.reported_id,
                    report.reason,
                    report.session_id,
                    report.evidence,
                    report.created_at,
                ],
            )?;
            let report_count: i64 = tx.query_row(
                "UPDATE users SET report_count = report_count + 1, updated_at = ?1
                 WHERE id = ?2 RETURNING report_count",
                params![report.created_at, report.reported_id],
                |row| row.get(0),
            )?;
            let banned = auto_ban_threshold > 0 && report_count >= auto_ban_threshold;
            if banned {
                tx.execute(
                    "UPDATE users SET banned = 1 WHERE id = ?1",
                    params![report.reported_id],
                )?;
            }
            tx.commit()?;
            Ok(ReportOutcome {
                report_count,
                banned,
            })
        })
        .await
        .map_err(crate::database::map_tr_err)
}
