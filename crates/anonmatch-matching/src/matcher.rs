// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The matcher: picks the oldest compatible seeker from the waiting pool or
//! enqueues the caller.
//!
//! Pool scan, candidate removal and session creation form one critical
//! section under the pool mutex. The section runs in its own task so a
//! caller that gives up mid-way cannot leave a half-applied match behind.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use anonmatch_core::traits::PersistedQueueEntry;
use anonmatch_core::types::{MatchProfile, QueueEntry, User};
use anonmatch_core::{
    AnonmatchError, MatchOutcome, Rejection, SearchFilter, StorageAdapter, UserId,
};

use crate::bounded;
use crate::pool::WaitingPool;
use crate::rate_limit::RateLimiter;
use crate::sessions::SessionRegistry;

/// The compatibility predicate.
///
/// The seeker and the candidate must differ, must not have blocked each
/// other, and each side's filter must accept the other side's profile.
pub fn is_compatible(
    seeker: UserId,
    seeker_profile: &MatchProfile,
    seeker_filter: &SearchFilter,
    candidate: &QueueEntry,
    blocked: &HashSet<UserId>,
) -> bool {
    seeker != candidate.user_id
        && !blocked.contains(&candidate.user_id)
        && seeker_filter.accepts(&candidate.profile)
        && candidate.filter.accepts(seeker_profile)
}

fn precondition(user: Option<&User>) -> Option<Rejection> {
    let Some(user) = user else {
        return Some(Rejection::NotVerified);
    };
    if !user.verified {
        Some(Rejection::NotVerified)
    } else if user.banned {
        Some(Rejection::Banned)
    } else if !user.is_profile_complete() {
        Some(Rejection::ProfileIncomplete)
    } else {
        None
    }
}

struct Inner {
    storage: Arc<dyn StorageAdapter + Send + Sync>,
    sessions: Arc<SessionRegistry>,
    pool: Mutex<WaitingPool>,
    limiter: RateLimiter,
    timeout: Duration,
}

/// Cheap to clone; clones share the pool.
#[derive(Clone)]
pub struct Matcher {
    inner: Arc<Inner>,
}

impl Matcher {
    pub fn new(
        storage: Arc<dyn StorageAdapter + Send + Sync>,
        sessions: Arc<SessionRegistry>,
        max_search_per_minute: u32,
        persistence_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                storage,
                sessions,
                pool: Mutex::new(WaitingPool::new()),
                limiter: RateLimiter::per_minute(max_search_per_minute),
                timeout: persistence_timeout,
            }),
        }
    }

    /// Runs a search for `seeker` with `filter`.
    ///
    /// `event_id` identifies the inbound event; a redelivered event does not
    /// consume another rate-limit slot. A cancelled search returns before
    /// touching the pool.
    pub async fn search(
        &self,
        seeker: UserId,
        filter: SearchFilter,
        event_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<MatchOutcome, AnonmatchError> {
        let inner = self.inner.clone();
        let event_id = event_id.map(str::to_owned);
        let cancel = cancel.clone();
        tokio::spawn(async move { inner.search(seeker, filter, event_id.as_deref(), &cancel).await })
            .await
            .map_err(|e| AnonmatchError::Internal(format!("search task failed: {e}")))?
    }

    /// Removes `user` from the pool and clears a `searching` state.
    /// Returns true if the user was waiting.
    pub async fn stop_search(&self, user: UserId) -> Result<bool, AnonmatchError> {
        let inner = &self.inner;
        let mut pool = inner.pool.lock().await;
        let in_memory = pool.remove(user).is_some();
        let persisted = bounded(inner.timeout, inner.storage.dequeue_seeker(user, true)).await?;
        anonmatch_prometheus::set_queue_size(pool.len());
        if in_memory || persisted {
            debug!(user_id = user, "left the waiting pool");
        }
        Ok(in_memory || persisted)
    }

    /// Relaxes every filtered entry that joined more than `threshold` before `now`.
    ///
    /// The filter is cleared and the join time moved to `now`. Returns the
    /// users whose entries changed so they can be notified.
    pub async fn relax_idle(
        &self,
        now: DateTime<Utc>,
        threshold: Duration,
    ) -> Result<Vec<UserId>, AnonmatchError> {
        let inner = &self.inner;
        let threshold = chrono::Duration::from_std(threshold)
            .map_err(|e| AnonmatchError::Internal(format!("idle threshold out of range: {e}")))?;
        let cutoff = now - threshold;

        let mut pool = inner.pool.lock().await;
        let stale: Vec<UserId> = pool
            .expire_before(cutoff)
            .into_iter()
            .filter(|id| pool.get(*id).is_some_and(|e| !e.filter.is_any()))
            .collect();

        let mut relaxed = Vec::with_capacity(stale.len());
        for user in stale {
            if let Err(e) = bounded(inner.timeout, inner.storage.relax_queue_entry(user, now)).await {
                warn!(user_id = user, error = %e, "failed to relax queue entry");
                continue;
            }
            pool.relax(user, now);
            relaxed.push(user);
        }
        if !relaxed.is_empty() {
            info!(count = relaxed.len(), "relaxed idle search filters");
        }
        Ok(relaxed)
    }

    /// Rebuilds the in-memory pool from the persisted queue.
    ///
    /// Entries of banned, unverified or already-bound users are dropped.
    pub async fn restore_from_storage(&self) -> Result<usize, AnonmatchError> {
        let inner = &self.inner;
        let persisted = inner.storage.load_queue().await?;
        let mut pool = inner.pool.lock().await;
        pool.clear();

        for row in persisted {
            let user = inner.storage.get_user(row.user_id).await?;
            let busy = inner.storage.get_active_session(row.user_id).await?.is_some();
            match user {
                Some(user) if precondition(Some(&user)).is_none() && !busy => {
                    pool.add(QueueEntry {
                        user_id: row.user_id,
                        filter: row.filter,
                        profile: user.match_profile(),
                        joined_at: row.joined_at,
                    });
                }
                _ => {
                    debug!(user_id = row.user_id, "dropping stale queue row");
                    inner.storage.dequeue_seeker(row.user_id, !busy).await?;
                }
            }
        }
        anonmatch_prometheus::set_queue_size(pool.len());
        info!(size = pool.len(), "waiting pool restored");
        Ok(pool.len())
    }

    pub async fn pool_size(&self) -> usize {
        self.inner.pool.lock().await.len()
    }

    pub async fn queue_entry(&self, user: UserId) -> Option<QueueEntry> {
        self.inner.pool.lock().await.get(user).cloned()
    }

    /// Forgets rate-limit history of users idle for a full window.
    pub fn gc(&self) {
        self.inner.limiter.gc();
    }
}

impl Inner {
    async fn search(
        &self,
        seeker: UserId,
        filter: SearchFilter,
        event_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<MatchOutcome, AnonmatchError> {
        let user = bounded(self.timeout, self.storage.get_user(seeker)).await?;
        if let Some(rejection) = precondition(user.as_ref()) {
            debug!(user_id = seeker, reason = %rejection, "search rejected");
            return Ok(MatchOutcome::Rejected(rejection));
        }
        let Some(user) = user else {
            return Ok(MatchOutcome::Rejected(Rejection::NotVerified));
        };

        if bounded(self.timeout, self.storage.get_active_session(seeker))
            .await?
            .is_some()
        {
            return Ok(MatchOutcome::Rejected(Rejection::AlreadyInSession));
        }

        if !self.limiter.check(seeker, event_id) {
            debug!(user_id = seeker, "search rate limited");
            return Ok(MatchOutcome::Rejected(Rejection::RateLimited));
        }

        let blocked: HashSet<UserId> =
            bounded(self.timeout, self.storage.blocked_peers(seeker))
                .await?
                .into_iter()
                .collect();
        let profile = user.match_profile();

        if cancel.is_cancelled() {
            return Err(AnonmatchError::Internal("search cancelled".into()));
        }

        let mut pool = self.pool.lock().await;
        if pool.contains(seeker) {
            return Ok(MatchOutcome::Rejected(Rejection::AlreadyInQueue));
        }

        let now = Utc::now();
        let mut skipped: HashSet<UserId> = HashSet::new();
        loop {
            let candidate = pool
                .scan()
                .find(|c| {
                    !skipped.contains(&c.user_id)
                        && is_compatible(seeker, &profile, &filter, c, &blocked)
                })
                .cloned();
            let Some(mut candidate) = candidate else {
                break;
            };

            // Profiles and bans may have changed since the candidate joined.
            let fresh = bounded(self.timeout, self.storage.get_user(candidate.user_id)).await?;
            match fresh {
                Some(fresh) if precondition(Some(&fresh)).is_none() => {
                    candidate.profile = fresh.match_profile();
                    if !is_compatible(seeker, &profile, &filter, &candidate, &blocked) {
                        skipped.insert(candidate.user_id);
                        continue;
                    }
                }
                _ => {
                    debug!(user_id = candidate.user_id, "evicting ineligible seeker");
                    pool.remove(candidate.user_id);
                    if let Err(e) = self.storage.dequeue_seeker(candidate.user_id, true).await {
                        warn!(user_id = candidate.user_id, error = %e, "failed to evict seeker");
                    }
                    continue;
                }
            }

            pool.remove(candidate.user_id);
            match self.sessions.create(seeker, candidate.user_id, now).await {
                Ok(session) => {
                    anonmatch_prometheus::record_match();
                    anonmatch_prometheus::set_queue_size(pool.len());
                    info!(
                        session_id = session.id,
                        user1 = seeker,
                        user2 = candidate.user_id,
                        "matched"
                    );
                    return Ok(MatchOutcome::Matched {
                        partner_id: candidate.user_id,
                        session_id: session.id,
                    });
                }
                Err(err) => {
                    return self.reconcile_failed_create(&mut pool, seeker, candidate, err).await;
                }
            }
        }

        let persisted = PersistedQueueEntry {
            user_id: seeker,
            filter,
            joined_at: now,
        };
        bounded(self.timeout, self.storage.enqueue_seeker(&persisted)).await?;
        pool.add(QueueEntry {
            user_id: seeker,
            filter,
            profile,
            joined_at: now,
        });
        let position = pool.len();
        anonmatch_prometheus::set_queue_size(position);
        debug!(user_id = seeker, position, "enqueued");
        Ok(MatchOutcome::Enqueued { position })
    }

    /// A failed or timed-out create either committed or rolled back. Find out
    /// which; on rollback put the candidate back and surface the error.
    async fn reconcile_failed_create(
        &self,
        pool: &mut WaitingPool,
        seeker: UserId,
        candidate: QueueEntry,
        err: AnonmatchError,
    ) -> Result<MatchOutcome, AnonmatchError> {
        if matches!(err, AnonmatchError::Timeout { .. }) {
            if let Ok(Some(session)) = self.storage.get_active_session(seeker).await {
                if session.partner_of(seeker) == Some(candidate.user_id) {
                    warn!(session_id = session.id, "session create timed out but committed");
                    anonmatch_prometheus::record_match();
                    anonmatch_prometheus::set_queue_size(pool.len());
                    return Ok(MatchOutcome::Matched {
                        partner_id: candidate.user_id,
                        session_id: session.id,
                    });
                }
            }
        }
        warn!(
            user_id = seeker,
            partner_id = candidate.user_id,
            error = %err,
            "session create failed, restoring candidate"
        );
        pool.add(candidate);
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::EvidenceBuffer;
    use crate::test_support::{setup_storage, verified_user};
    use anonmatch_core::types::{Department, Gender};
    use anonmatch_core::UserState;

    struct Fixture {
        matcher: Matcher,
        storage: Arc<dyn StorageAdapter + Send + Sync>,
        _dir: tempfile::TempDir,
    }

    async fn fixture(per_minute: u32) -> Fixture {
        let (storage, dir) = setup_storage().await;
        let evidence = Arc::new(EvidenceBuffer::new(20, chrono::Duration::hours(24)));
        let sessions = Arc::new(SessionRegistry::new(
            storage.clone(),
            evidence,
            Duration::from_secs(5),
        ));
        let matcher = Matcher::new(storage.clone(), sessions, per_minute, Duration::from_secs(5));
        Fixture {
            matcher,
            storage,
            _dir: dir,
        }
    }

    fn gender(g: Gender) -> SearchFilter {
        SearchFilter {
            gender: Some(g),
            ..SearchFilter::any()
        }
    }

    fn dept(d: Department) -> SearchFilter {
        SearchFilter {
            department: Some(d),
            ..SearchFilter::any()
        }
    }

    async fn search(f: &Fixture, user: UserId, filter: SearchFilter) -> MatchOutcome {
        f.matcher
            .search(user, filter, None, &CancellationToken::new())
            .await
            .unwrap()
    }

    #[test]
    fn compatibility_is_mutual() {
        let male = MatchProfile {
            gender: Some(Gender::Male),
            department: Some(Department::Akuntansi),
            entry_year: Some(2022),
        };
        let female_wants_male = QueueEntry {
            user_id: 2,
            filter: gender(Gender::Male),
            profile: MatchProfile {
                gender: Some(Gender::Female),
                ..male
            },
            joined_at: Utc::now(),
        };
        let none = HashSet::new();
        assert!(is_compatible(1, &male, &SearchFilter::any(), &female_wants_male, &none));
        assert!(is_compatible(1, &male, &gender(Gender::Female), &female_wants_male, &none));
        assert!(!is_compatible(1, &male, &gender(Gender::Male), &female_wants_male, &none));

        let female = female_wants_male.profile;
        assert!(!is_compatible(3, &female, &SearchFilter::any(), &female_wants_male, &none));
        assert!(!is_compatible(2, &female, &SearchFilter::any(), &female_wants_male, &none));
        assert!(!is_compatible(1, &male, &SearchFilter::any(), &female_wants_male, &HashSet::from([2])));
    }

    #[tokio::test]
    async fn symmetric_filter_match() {
        let f = fixture(5).await;
        verified_user(&f.storage, 1, Gender::Male, Department::TeknikMesin, 2022).await;
        verified_user(&f.storage, 2, Gender::Female, Department::TeknikMesin, 2022).await;

        assert_eq!(
            search(&f, 2, gender(Gender::Male)).await,
            MatchOutcome::Enqueued { position: 1 }
        );
        assert_eq!(f.storage.get_state(2).await.unwrap().state, UserState::Searching);

        let outcome = search(&f, 1, gender(Gender::Female)).await;
        assert!(matches!(outcome, MatchOutcome::Matched { partner_id: 2, .. }));
        assert_eq!(f.matcher.pool_size().await, 0);
        assert!(f.storage.load_queue().await.unwrap().is_empty());
        assert_eq!(f.storage.get_state(1).await.unwrap().state, UserState::InChat);
        assert_eq!(f.storage.get_state(2).await.unwrap().state, UserState::InChat);
        assert_eq!(f.storage.get_user(1).await.unwrap().unwrap().total_chats, 1);
    }

    #[tokio::test]
    async fn occupant_filter_is_respected() {
        let f = fixture(5).await;
        verified_user(&f.storage, 1, Gender::Male, Department::TeknikMesin, 2022).await;
        verified_user(&f.storage, 2, Gender::Female, Department::TeknikMesin, 2022).await;

        // 2 only wants women; 1 is a man searching without preference.
        search(&f, 2, gender(Gender::Female)).await;
        assert_eq!(
            search(&f, 1, SearchFilter::any()).await,
            MatchOutcome::Enqueued { position: 2 }
        );
    }

    #[tokio::test]
    async fn filter_reject_then_fifo_fallback() {
        let f = fixture(5).await;
        verified_user(&f.storage, 3, Gender::Male, Department::Akuntansi, 2021).await;
        verified_user(&f.storage, 4, Gender::Female, Department::TeknikSipil, 2023).await;

        search(&f, 3, dept(Department::TeknikSipil)).await;
        let outcome = search(&f, 4, SearchFilter::any()).await;
        assert!(matches!(outcome, MatchOutcome::Matched { partner_id: 3, .. }));
    }

    #[tokio::test]
    async fn oldest_compatible_wins() {
        let f = fixture(5).await;
        for id in [10, 11, 12] {
            verified_user(&f.storage, id, Gender::Female, Department::Akuntansi, 2022).await;
        }
        verified_user(&f.storage, 20, Gender::Male, Department::Akuntansi, 2022).await;
        search(&f, 10, gender(Gender::Female)).await; // incompatible with 20
        tokio::time::sleep(Duration::from_millis(2)).await;
        search(&f, 11, SearchFilter::any()).await;
        tokio::time::sleep(Duration::from_millis(2)).await;
        search(&f, 12, SearchFilter::any()).await;

        let outcome = search(&f, 20, SearchFilter::any()).await;
        assert!(matches!(outcome, MatchOutcome::Matched { partner_id: 11, .. }));
        assert_eq!(f.matcher.pool_size().await, 2);
    }

    #[tokio::test]
    async fn blocked_pairs_never_match() {
        let f = fixture(5).await;
        verified_user(&f.storage, 1, Gender::Male, Department::Akuntansi, 2022).await;
        verified_user(&f.storage, 2, Gender::Female, Department::Akuntansi, 2022).await;
        f.storage.block_user(1, 2).await.unwrap();

        search(&f, 2, SearchFilter::any()).await;
        assert_eq!(
            search(&f, 1, SearchFilter::any()).await,
            MatchOutcome::Enqueued { position: 2 }
        );
    }

    #[tokio::test]
    async fn preconditions_reject_in_order() {
        let f = fixture(5).await;
        f.storage.create_user(1).await.unwrap();
        assert_eq!(
            search(&f, 1, SearchFilter::any()).await,
            MatchOutcome::Rejected(Rejection::NotVerified)
        );
        assert_eq!(
            search(&f, 99, SearchFilter::any()).await,
            MatchOutcome::Rejected(Rejection::NotVerified)
        );

        f.storage.set_verified(1, "a@pnj.ac.id").await.unwrap();
        assert_eq!(
            search(&f, 1, SearchFilter::any()).await,
            MatchOutcome::Rejected(Rejection::ProfileIncomplete)
        );

        verified_user(&f.storage, 2, Gender::Male, Department::Akuntansi, 2022).await;
        search(&f, 2, SearchFilter::any()).await;
        assert_eq!(
            search(&f, 2, SearchFilter::any()).await,
            MatchOutcome::Rejected(Rejection::AlreadyInQueue)
        );

        f.storage.set_banned(2, true).await.unwrap();
        assert_eq!(
            search(&f, 2, SearchFilter::any()).await,
            MatchOutcome::Rejected(Rejection::Banned)
        );
    }

    #[tokio::test]
    async fn already_in_session_is_rejected() {
        let f = fixture(5).await;
        verified_user(&f.storage, 1, Gender::Male, Department::Akuntansi, 2022).await;
        verified_user(&f.storage, 2, Gender::Female, Department::Akuntansi, 2022).await;
        search(&f, 1, SearchFilter::any()).await;
        search(&f, 2, SearchFilter::any()).await;
        assert_eq!(
            search(&f, 1, SearchFilter::any()).await,
            MatchOutcome::Rejected(Rejection::AlreadyInSession)
        );
    }

    #[tokio::test]
    async fn rate_limit_counts_event_ids_once() {
        let f = fixture(2).await;
        verified_user(&f.storage, 1, Gender::Male, Department::Akuntansi, 2022).await;
        let cancel = CancellationToken::new();

        for _ in 0..4 {
            let outcome = f
                .matcher
                .search(1, SearchFilter::any(), Some("evt-1"), &cancel)
                .await
                .unwrap();
            assert_ne!(outcome, MatchOutcome::Rejected(Rejection::RateLimited));
        }
        f.matcher.stop_search(1).await.unwrap();
        f.matcher
            .search(1, SearchFilter::any(), Some("evt-2"), &cancel)
            .await
            .unwrap();
        f.matcher.stop_search(1).await.unwrap();
        assert_eq!(
            f.matcher
                .search(1, SearchFilter::any(), Some("evt-3"), &cancel)
                .await
                .unwrap(),
            MatchOutcome::Rejected(Rejection::RateLimited)
        );
    }

    #[tokio::test]
    async fn banned_occupant_is_evicted_during_scan() {
        let f = fixture(5).await;
        verified_user(&f.storage, 1, Gender::Male, Department::Akuntansi, 2022).await;
        verified_user(&f.storage, 2, Gender::Female, Department::Akuntansi, 2022).await;
        search(&f, 2, SearchFilter::any()).await;
        f.storage.set_banned(2, true).await.unwrap();

        assert_eq!(
            search(&f, 1, SearchFilter::any()).await,
            MatchOutcome::Enqueued { position: 1 }
        );
        assert!(f.matcher.queue_entry(2).await.is_none());
    }

    #[tokio::test]
    async fn cancelled_search_leaves_no_residue() {
        let f = fixture(5).await;
        verified_user(&f.storage, 1, Gender::Male, Department::Akuntansi, 2022).await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(f.matcher.search(1, SearchFilter::any(), None, &cancel).await.is_err());
        assert_eq!(f.matcher.pool_size().await, 0);
        assert!(f.storage.load_queue().await.unwrap().is_empty());
        assert_eq!(f.storage.get_state(1).await.unwrap().state, UserState::None);
    }

    #[tokio::test]
    async fn stop_search_is_idempotent() {
        let f = fixture(5).await;
        verified_user(&f.storage, 1, Gender::Male, Department::Akuntansi, 2022).await;
        search(&f, 1, SearchFilter::any()).await;
        assert!(f.matcher.stop_search(1).await.unwrap());
        assert!(!f.matcher.stop_search(1).await.unwrap());
        assert_eq!(f.storage.get_state(1).await.unwrap().state, UserState::None);
    }

    #[tokio::test]
    async fn idle_entries_are_relaxed() {
        let f = fixture(5).await;
        verified_user(&f.storage, 5, Gender::Male, Department::Akuntansi, 2022).await;
        verified_user(&f.storage, 6, Gender::Male, Department::Akuntansi, 2022).await;
        search(&f, 5, dept(Department::Pascasarjana)).await;
        search(&f, 6, SearchFilter::any()).await;

        let later = Utc::now() + chrono::Duration::seconds(61);
        let relaxed = f.matcher.relax_idle(later, Duration::from_secs(60)).await.unwrap();
        assert_eq!(relaxed, vec![5]);

        let entry = f.matcher.queue_entry(5).await.unwrap();
        assert!(entry.filter.is_any());
        assert_eq!(entry.joined_at, later);
        assert_eq!(f.storage.get_state(5).await.unwrap().state, UserState::Searching);

        // Nothing left to relax.
        let again = f.matcher.relax_idle(later, Duration::from_secs(60)).await.unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn restore_rebuilds_pool_from_storage() {
        let f = fixture(5).await;
        verified_user(&f.storage, 1, Gender::Male, Department::Akuntansi, 2022).await;
        verified_user(&f.storage, 2, Gender::Female, Department::Akuntansi, 2022).await;
        search(&f, 1, dept(Department::TeknikSipil)).await;
        search(&f, 2, dept(Department::TeknikSipil)).await;
        f.storage.set_banned(2, true).await.unwrap();

        let sessions = Arc::new(SessionRegistry::new(
            f.storage.clone(),
            Arc::new(EvidenceBuffer::new(20, chrono::Duration::hours(24))),
            Duration::from_secs(5),
        ));
        let fresh = Matcher::new(f.storage.clone(), sessions, 5, Duration::from_secs(5));
        assert_eq!(fresh.restore_from_storage().await.unwrap(), 1);
        let entry = fresh.queue_entry(1).await.unwrap();
        assert_eq!(entry.filter, dept(Department::TeknikSipil));
        assert_eq!(entry.profile.gender, Some(Gender::Male));
        assert_eq!(f.storage.load_queue().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_searches_pair_everyone_once() {
        let f = fixture(5).await;
        for id in 1..=20 {
            let g = if id % 2 == 0 { Gender::Male } else { Gender::Female };
            verified_user(&f.storage, id, g, Department::Akuntansi, 2022).await;
        }
        let mut handles = Vec::new();
        for id in 1..=20 {
            let matcher = f.matcher.clone();
            handles.push(tokio::spawn(async move {
                matcher
                    .search(id, SearchFilter::any(), None, &CancellationToken::new())
                    .await
                    .unwrap()
            }));
        }
        let mut matched = 0;
        for h in handles {
            if matches!(h.await.unwrap(), MatchOutcome::Matched { .. }) {
                matched += 1;
            }
        }
        assert_eq!(matched, 10);
        assert_eq!(f.matcher.pool_size().await, 0);
        assert_eq!(f.storage.count_active_sessions().await.unwrap(), 10);
        for id in 1..=20 {
            assert_eq!(f.storage.get_state(id).await.unwrap().state, UserState::InChat);
        }
    }
}
