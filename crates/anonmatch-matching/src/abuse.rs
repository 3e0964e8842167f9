// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reports, blocks and the auto-ban threshold.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use anonmatch_config::model::LimitsConfig;
use anonmatch_core::types::{Report, ReportOutcome};
use anonmatch_core::{Action, AnonmatchError, SessionId, StorageAdapter, UserId, UserState};

use crate::evidence::{EvidenceBuffer, EMPTY_TRANSCRIPT};
use crate::matcher::Matcher;
use crate::sessions::{SessionEnd, SessionRegistry};
use crate::validation::{clean_text, REPORT_REASON};

/// Result of a filed report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportResult {
    pub outcome: ReportOutcome,
    /// Threshold the count is compared against.
    pub threshold: i64,
    /// The reported user's session, if the report banned them mid-chat.
    pub ended: Option<SessionEnd>,
}

pub struct AbuseController {
    storage: Arc<dyn StorageAdapter + Send + Sync>,
    sessions: Arc<SessionRegistry>,
    matcher: Matcher,
    evidence: Arc<EvidenceBuffer>,
    max_reports_per_day: i64,
    auto_ban_threshold: i64,
}

impl AbuseController {
    pub fn new(
        storage: Arc<dyn StorageAdapter + Send + Sync>,
        sessions: Arc<SessionRegistry>,
        matcher: Matcher,
        evidence: Arc<EvidenceBuffer>,
        limits: &LimitsConfig,
    ) -> Self {
        Self {
            storage,
            sessions,
            matcher,
            evidence,
            max_reports_per_day: i64::from(limits.max_reports_per_day),
            auto_ban_threshold: i64::from(limits.auto_ban_report_count),
        }
    }

    pub fn auto_ban_threshold(&self) -> i64 {
        self.auto_ban_threshold
    }

    /// Files a report against `reported`.
    ///
    /// When the report pushes the reported user over the threshold they are
    /// banned, their active session is ended and they leave the pool.
    pub async fn report(
        &self,
        reporter: UserId,
        reported: UserId,
        reason: &str,
        session_id: Option<SessionId>,
        now: DateTime<Utc>,
    ) -> Result<ReportResult, AnonmatchError> {
        if reporter == reported {
            return Err(AnonmatchError::invalid("reported", "cannot report yourself"));
        }
        let reason = clean_text(reason, REPORT_REASON)?;

        let today = self
            .storage
            .count_reports_since(reporter, now - chrono::Duration::hours(24))
            .await?;
        if today >= self.max_reports_per_day {
            return Err(AnonmatchError::RateLimited {
                action: Action::Report,
            });
        }

        let evidence = session_id
            .map(|id| self.evidence.transcript(id, now))
            .unwrap_or_else(|| EMPTY_TRANSCRIPT.to_string());
        let report = Report {
            reporter_id: reporter,
            reported_id: reported,
            reason,
            session_id,
            evidence,
            created_at: now,
        };
        let outcome = self
            .storage
            .create_report(&report, self.auto_ban_threshold)
            .await?;
        anonmatch_prometheus::record_report();
        info!(
            reporter_id = reporter,
            reported_id = reported,
            report_count = outcome.report_count,
            banned = outcome.banned,
            "report filed"
        );

        let ended = if outcome.banned {
            self.enforce_ban(reported, now).await?
        } else {
            None
        };
        Ok(ReportResult {
            outcome,
            threshold: self.auto_ban_threshold,
            ended,
        })
    }

    /// Removes a banned user from any session and from the pool.
    pub async fn enforce_ban(
        &self,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionEnd>, AnonmatchError> {
        info!(user_id = user, "user banned");
        let ended = self.sessions.end_for_user(user, now).await?;
        self.matcher.stop_search(user).await?;
        if let Err(e) = self.storage.set_state(user, UserState::None, "").await {
            warn!(user_id = user, error = %e, "failed to reset banned user's state");
        }
        Ok(ended)
    }

    /// Persists a block and ends the session if the two are currently bound.
    pub async fn block(
        &self,
        owner: UserId,
        blocked: UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionEnd>, AnonmatchError> {
        if owner == blocked {
            return Err(AnonmatchError::invalid("blocked", "cannot block yourself"));
        }
        self.storage.block_user(owner, blocked).await?;
        anonmatch_prometheus::record_block();
        info!(user_id = owner, blocked_id = blocked, "user blocked");

        match self.sessions.get_active_for(owner).await? {
            Some(session) if session.partner_of(owner) == Some(blocked) => {
                self.sessions.end(session.id, now).await
            }
            _ => Ok(None),
        }
    }
}
