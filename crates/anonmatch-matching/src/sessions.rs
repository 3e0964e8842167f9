// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session registry.
//!
//! Answers "who is my partner?" and ends sessions. Every mutation of a
//! session runs under that session's lock, which the relay also takes while
//! delivering, so a message is never delivered after the session ended.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

use anonmatch_core::types::{ChatSession, EndedSession};
use anonmatch_core::{AnonmatchError, SessionId, StorageAdapter, UserId};

use crate::achievements::{self, KARMA_MASTER, KARMA_MASTER_THRESHOLD, MARATHON_MINUTES};
use crate::evidence::EvidenceBuffer;
use crate::locks::KeyedLocks;
use crate::bounded;

/// What happened when a session ended.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEnd {
    pub ended: EndedSession,
    /// Karma added to each participant.
    pub karma_delta: i64,
    /// Achievements newly earned as a consequence, per user.
    pub awarded: Vec<(UserId, &'static str)>,
}

impl SessionEnd {
    pub fn partner_of(&self, user: UserId) -> Option<UserId> {
        self.ended.partner_of(user)
    }
}

pub struct SessionRegistry {
    storage: Arc<dyn StorageAdapter + Send + Sync>,
    evidence: Arc<EvidenceBuffer>,
    locks: KeyedLocks<SessionId>,
    timeout: Duration,
}

impl SessionRegistry {
    pub fn new(
        storage: Arc<dyn StorageAdapter + Send + Sync>,
        evidence: Arc<EvidenceBuffer>,
        timeout: Duration,
    ) -> Self {
        Self {
            storage,
            evidence,
            locks: KeyedLocks::new(),
            timeout,
        }
    }

    /// Binds two users. Also removes both from the persisted pool and sets both to `in_chat`.
    pub async fn create(
        &self,
        user1: UserId,
        user2: UserId,
        started_at: DateTime<Utc>,
    ) -> Result<ChatSession, AnonmatchError> {
        if user1 == user2 {
            return Err(AnonmatchError::invalid("partner", "cannot chat with yourself"));
        }
        bounded(self.timeout, self.storage.create_session(user1, user2, started_at)).await
    }

    pub async fn get_active_for(&self, user: UserId) -> Result<Option<ChatSession>, AnonmatchError> {
        bounded(self.timeout, self.storage.get_active_session(user)).await
    }

    pub async fn partner_of(&self, user: UserId) -> Result<Option<UserId>, AnonmatchError> {
        Ok(self
            .get_active_for(user)
            .await?
            .and_then(|s| s.partner_of(user)))
    }

    /// Holds off [`end`](Self::end) on this session until the guard is dropped.
    pub async fn lock_session(&self, id: SessionId) -> OwnedMutexGuard<()> {
        self.locks.lock(id).await
    }

    pub(crate) fn release_lock(&self, id: SessionId) {
        self.locks.release(&id);
    }

    /// Ends the session if still active. Clears its evidence, applies karma
    /// and awards duration achievements.
    pub async fn end(
        &self,
        id: SessionId,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionEnd>, AnonmatchError> {
        let guard = self.lock_session(id).await;
        let ended = bounded(self.timeout, self.storage.end_session(id, now)).await;
        drop(guard);
        self.release_lock(id);

        let Some(ended) = ended? else {
            debug!(session_id = id, "session already ended");
            return Ok(None);
        };
        self.evidence.clear(id);

        let minutes = ended.duration().num_minutes();
        let karma_delta = achievements::karma_for_duration(minutes);
        let mut awarded = Vec::new();

        for user in [ended.user1, ended.user2] {
            if karma_delta > 0 {
                match self.storage.increment_karma(user, karma_delta).await {
                    Ok(karma) if karma >= KARMA_MASTER_THRESHOLD => {
                        if self.award(user, KARMA_MASTER, now).await {
                            awarded.push((user, KARMA_MASTER));
                        }
                    }
                    Ok(_) => {}
                    Err(e) => warn!(user_id = user, error = %e, "failed to apply session karma"),
                }
            }
            if minutes >= MARATHON_MINUTES && self.award(user, achievements::CHAT_MARATHON, now).await
            {
                awarded.push((user, achievements::CHAT_MARATHON));
            }
        }

        info!(
            session_id = id,
            user1 = ended.user1,
            user2 = ended.user2,
            duration_secs = ended.duration().num_seconds(),
            "session ended"
        );
        Ok(Some(SessionEnd {
            ended,
            karma_delta,
            awarded,
        }))
    }

    /// Ends `user`'s active session, if any.
    pub async fn end_for_user(
        &self,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionEnd>, AnonmatchError> {
        match self.get_active_for(user).await? {
            Some(session) => self.end(session.id, now).await,
            None => Ok(None),
        }
    }

    /// Ends every active session containing `user`. Used to heal state mismatches.
    pub async fn end_all_active(
        &self,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<SessionEnd>, AnonmatchError> {
        let mut ended = Vec::new();
        // A session that refuses to end would otherwise spin forever.
        for _ in 0..8 {
            let Some(session) = self.get_active_for(user).await? else {
                break;
            };
            match self.end(session.id, now).await? {
                Some(end) => ended.push(end),
                None => break,
            }
        }
        Ok(ended)
    }

    async fn award(&self, user: UserId, key: &str, now: DateTime<Utc>) -> bool {
        match self.storage.award_achievement(user, key, now).await {
            Ok(newly) => newly,
            Err(e) => {
                warn!(user_id = user, achievement = key, error = %e, "failed to award achievement");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::EvidenceFrame;
    use crate::test_support::{setup_storage, verified_user};
    use anonmatch_core::types::{Department, Gender};
    use anonmatch_core::UserState;

    async fn registry() -> (SessionRegistry, Arc<dyn StorageAdapter + Send + Sync>, Arc<EvidenceBuffer>, tempfile::TempDir) {
        let (storage, dir) = setup_storage().await;
        let evidence = Arc::new(EvidenceBuffer::new(20, chrono::Duration::hours(24)));
        let reg = SessionRegistry::new(storage.clone(), evidence.clone(), Duration::from_secs(5));
        (reg, storage, evidence, dir)
    }

    #[tokio::test]
    async fn create_binds_both_users() {
        let (reg, storage, _e, _dir) = registry().await;
        verified_user(&storage, 1, Gender::Male, Department::Akuntansi, 2022).await;
        verified_user(&storage, 2, Gender::Female, Department::Akuntansi, 2022).await;

        let s = reg.create(1, 2, Utc::now()).await.unwrap();
        assert_eq!(reg.partner_of(1).await.unwrap(), Some(2));
        assert_eq!(reg.partner_of(2).await.unwrap(), Some(1));
        assert_eq!(reg.get_active_for(2).await.unwrap().unwrap().id, s.id);
        assert_eq!(storage.get_state(1).await.unwrap().state, UserState::InChat);
        assert!(reg.create(3, 3, Utc::now()).await.is_err());
    }

    #[tokio::test]
    async fn end_resets_states_and_clears_evidence() {
        let (reg, storage, evidence, _dir) = registry().await;
        verified_user(&storage, 1, Gender::Male, Department::Akuntansi, 2022).await;
        verified_user(&storage, 2, Gender::Female, Department::Akuntansi, 2022).await;
        let t = Utc::now();
        let s = reg.create(1, 2, t).await.unwrap();
        evidence.record(
            s.id,
            EvidenceFrame {
                sender_id: 1,
                kind: "text".into(),
                text: "hi".into(),
                sent_at: t,
            },
        );

        let end = reg.end(s.id, t + chrono::Duration::minutes(1)).await.unwrap().unwrap();
        assert_eq!(end.karma_delta, 0);
        assert!(end.awarded.is_empty());
        assert_eq!(evidence.session_count(), 0);
        assert_eq!(storage.get_state(1).await.unwrap().state, UserState::None);
        assert_eq!(storage.get_state(2).await.unwrap().state, UserState::None);
        assert!(reg.partner_of(1).await.unwrap().is_none());

        // Second end is a no-op.
        assert!(reg.end(s.id, t).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn long_sessions_earn_karma_and_marathon() {
        let (reg, storage, _e, _dir) = registry().await;
        verified_user(&storage, 1, Gender::Male, Department::Akuntansi, 2022).await;
        verified_user(&storage, 2, Gender::Female, Department::Akuntansi, 2022).await;
        let t = Utc::now();
        let s = reg.create(1, 2, t).await.unwrap();

        let end = reg.end(s.id, t + chrono::Duration::minutes(61)).await.unwrap().unwrap();
        assert_eq!(end.karma_delta, 2);
        assert!(end.awarded.contains(&(1, achievements::CHAT_MARATHON)));
        assert!(end.awarded.contains(&(2, achievements::CHAT_MARATHON)));
        assert_eq!(storage.get_user(1).await.unwrap().unwrap().karma, 2);
        assert_eq!(storage.list_achievements(2).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn medium_session_earns_one_karma() {
        let (reg, storage, _e, _dir) = registry().await;
        verified_user(&storage, 1, Gender::Male, Department::Akuntansi, 2022).await;
        verified_user(&storage, 2, Gender::Female, Department::Akuntansi, 2022).await;
        let t = Utc::now();
        let s = reg.create(1, 2, t).await.unwrap();
        let end = reg.end(s.id, t + chrono::Duration::minutes(7)).await.unwrap().unwrap();
        assert_eq!(end.karma_delta, 1);
        assert_eq!(storage.get_user(2).await.unwrap().unwrap().karma, 1);
    }

    #[tokio::test]
    async fn end_for_user_and_end_all_active() {
        let (reg, storage, _e, _dir) = registry().await;
        verified_user(&storage, 1, Gender::Male, Department::Akuntansi, 2022).await;
        verified_user(&storage, 2, Gender::Female, Department::Akuntansi, 2022).await;
        assert!(reg.end_for_user(1, Utc::now()).await.unwrap().is_none());

        reg.create(1, 2, Utc::now()).await.unwrap();
        let ended = reg.end_all_active(2, Utc::now()).await.unwrap();
        assert_eq!(ended.len(), 1);
        assert_eq!(ended[0].partner_of(2), Some(1));
        assert!(reg.end_all_active(2, Utc::now()).await.unwrap().is_empty());
    }
}
