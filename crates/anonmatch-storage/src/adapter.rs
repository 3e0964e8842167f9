// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter and CommunityStore traits.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use anonmatch_config::model::StorageConfig;
use anonmatch_core::community::{Confession, ConfessionReply, Poll, Room, Whisper};
use anonmatch_core::traits::PersistedQueueEntry;
use anonmatch_core::types::{
    Achievement, ChatSession, Department, EndedSession, Gender, Report, ReportOutcome,
    StateSnapshot, User, VerificationCode,
};
use anonmatch_core::{
    AdapterType, AnonmatchError, CommunityStore, HealthStatus, PluginAdapter, SessionId,
    StorageAdapter, UserId, UserState,
};

use crate::database::{Database, OpenOptions};
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle and delegates every operation to the typed
/// query modules. The database is opened on the first call to
/// [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// The connection is not opened until [`StorageAdapter::initialize`] is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, AnonmatchError> {
        self.db.get().ok_or_else(|| AnonmatchError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, AnonmatchError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), AnonmatchError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), AnonmatchError> {
        if self.config.db_type != "sqlite" {
            return Err(AnonmatchError::Config(format!(
                "storage backend `{}` is not available in this build; use `sqlite`",
                self.config.db_type
            )));
        }
        let options = OpenOptions {
            wal_mode: self.config.wal_mode,
            busy_timeout: Duration::from_millis(self.config.busy_timeout_ms),
        };
        let db = Database::open_with(&self.config.database_path, options).await?;
        self.db.set(db).map_err(|_| AnonmatchError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), AnonmatchError> {
        self.db()?.checkpoint().await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    // --- Identity store ---

    async fn create_user(&self, id: UserId) -> Result<User, AnonmatchError> {
        queries::users::create_user(self.db()?, id).await
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, AnonmatchError> {
        queries::users::get_user(self.db()?, id).await
    }

    async fn set_email(&self, id: UserId, email: &str) -> Result<(), AnonmatchError> {
        queries::users::set_email(self.db()?, id, email).await
    }

    async fn set_verified(&self, id: UserId, email: &str) -> Result<(), AnonmatchError> {
        queries::users::set_verified(self.db()?, id, email).await
    }

    async fn set_gender(&self, id: UserId, gender: Gender) -> Result<(), AnonmatchError> {
        queries::users::set_gender(self.db()?, id, gender).await
    }

    async fn set_entry_year(&self, id: UserId, year: i32) -> Result<(), AnonmatchError> {
        queries::users::set_entry_year(self.db()?, id, year).await
    }

    async fn set_department(&self, id: UserId, dept: Department) -> Result<(), AnonmatchError> {
        queries::users::set_department(self.db()?, id, dept).await
    }

    async fn assign_display_name(&self, id: UserId, name: &str) -> Result<bool, AnonmatchError> {
        queries::users::assign_display_name(self.db()?, id, name).await
    }

    async fn set_banned(&self, id: UserId, banned: bool) -> Result<(), AnonmatchError> {
        queries::users::set_banned(self.db()?, id, banned).await
    }

    async fn increment_karma(&self, id: UserId, delta: i64) -> Result<i64, AnonmatchError> {
        queries::users::increment_karma(self.db()?, id, delta).await
    }

    async fn count_users(&self) -> Result<i64, AnonmatchError> {
        queries::users::count_users(self.db()?).await
    }

    async fn department_members(
        &self,
        dept: Department,
        except: UserId,
    ) -> Result<Vec<UserId>, AnonmatchError> {
        queries::users::department_members(self.db()?, dept, except).await
    }

    // --- State register ---

    async fn get_state(&self, id: UserId) -> Result<StateSnapshot, AnonmatchError> {
        queries::users::get_state(self.db()?, id).await
    }

    async fn set_state(
        &self,
        id: UserId,
        state: UserState,
        payload: &str,
    ) -> Result<(), AnonmatchError> {
        queries::users::set_state(self.db()?, id, state, payload).await
    }

    // --- Waiting pool mirror ---

    async fn load_queue(&self) -> Result<Vec<PersistedQueueEntry>, AnonmatchError> {
        queries::queue::load_queue(self.db()?).await
    }

    async fn enqueue_seeker(&self, entry: &PersistedQueueEntry) -> Result<(), AnonmatchError> {
        queries::queue::enqueue_seeker(self.db()?, entry).await
    }

    async fn dequeue_seeker(&self, id: UserId, reset_state: bool) -> Result<bool, AnonmatchError> {
        queries::queue::dequeue_seeker(self.db()?, id, reset_state).await
    }

    async fn relax_queue_entry(
        &self,
        id: UserId,
        joined_at: DateTime<Utc>,
    ) -> Result<(), AnonmatchError> {
        queries::queue::relax_queue_entry(self.db()?, id, joined_at).await
    }

    // --- Session registry ---

    async fn create_session(
        &self,
        user1: UserId,
        user2: UserId,
        started_at: DateTime<Utc>,
    ) -> Result<ChatSession, AnonmatchError> {
        queries::sessions::create_session(self.db()?, user1, user2, started_at).await
    }

    async fn get_active_session(
        &self,
        user: UserId,
    ) -> Result<Option<ChatSession>, AnonmatchError> {
        queries::sessions::get_active_session(self.db()?, user).await
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<ChatSession>, AnonmatchError> {
        queries::sessions::get_session(self.db()?, id).await
    }

    async fn end_session(
        &self,
        id: SessionId,
        ended_at: DateTime<Utc>,
    ) -> Result<Option<EndedSession>, AnonmatchError> {
        queries::sessions::end_session(self.db()?, id, ended_at).await
    }

    async fn count_active_sessions(&self) -> Result<i64, AnonmatchError> {
        queries::sessions::count_active_sessions(self.db()?).await
    }

    // --- Abuse records ---

    async fn block_user(&self, owner: UserId, blocked: UserId) -> Result<(), AnonmatchError> {
        queries::abuse::block_user(self.db()?, owner, blocked).await
    }

    async fn blocked_peers(&self, user: UserId) -> Result<Vec<UserId>, AnonmatchError> {
        queries::abuse::blocked_peers(self.db()?, user).await
    }

    async fn count_reports_since(
        &self,
        reporter: UserId,
        since: DateTime<Utc>,
    ) -> Result<i64, AnonmatchError> {
        queries::abuse::count_reports_since(self.db()?, reporter, since).await
    }

    async fn create_report(
        &self,
        report: &Report,
        auto_ban_threshold: i64,
    ) -> Result<ReportOutcome, AnonmatchError> {
        queries::abuse::create_report(self.db()?, report, auto_ban_threshold).await
    }

    // --- Verification ---

    async fn save_verification_code(&self, code: &VerificationCode) -> Result<(), AnonmatchError> {
        queries::verification::save_verification_code(self.db()?, code).await
    }

    async fn consume_verification_code(
        &self,
        user: UserId,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<VerificationCode>, AnonmatchError> {
        queries::verification::consume_verification_code(self.db()?, user, code, now).await
    }

    // --- Achievements ---

    async fn award_achievement(
        &self,
        user: UserId,
        key: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, AnonmatchError> {
        queries::achievements::award_achievement(self.db()?, user, key, at).await
    }

    async fn list_achievements(&self, user: UserId) -> Result<Vec<Achievement>, AnonmatchError> {
        queries::achievements::list_achievements(self.db()?, user).await
    }
}

#[async_trait]
impl CommunityStore for SqliteStorage {
    async fn create_confession(
        &self,
        author: UserId,
        content: &str,
        department: Option<Department>,
        at: DateTime<Utc>,
    ) -> Result<Confession, AnonmatchError> {
        queries::community::create_confession(self.db()?, author, content, department, at).await
    }

    async fn count_confessions_since(
        &self,
        author: UserId,
        since: DateTime<Utc>,
    ) -> Result<i64, AnonmatchError> {
        queries::community::count_confessions_since(self.db()?, author, since).await
    }

    async fn latest_confessions(&self, limit: usize) -> Result<Vec<Confession>, AnonmatchError> {
        queries::community::latest_confessions(self.db()?, limit).await
    }

    async fn get_confession(&self, id: i64) -> Result<Option<Confession>, AnonmatchError> {
        queries::community::get_confession(self.db()?, id).await
    }

    async fn react_to_confession(
        &self,
        confession_id: i64,
        user: UserId,
        emoji: &str,
    ) -> Result<(), AnonmatchError> {
        queries::community::react_to_confession(self.db()?, confession_id, user, emoji).await
    }

    async fn reaction_counts(
        &self,
        confession_id: i64,
    ) -> Result<Vec<(String, i64)>, AnonmatchError> {
        queries::community::reaction_counts(self.db()?, confession_id).await
    }

    async fn create_reply(
        &self,
        confession_id: i64,
        author: UserId,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<ConfessionReply, AnonmatchError> {
        queries::community::create_reply(self.db()?, confession_id, author, content, at).await
    }

    async fn count_replies_since(
        &self,
        author: UserId,
        since: DateTime<Utc>,
    ) -> Result<i64, AnonmatchError> {
        queries::community::count_replies_since(self.db()?, author, since).await
    }

    async fn list_replies(
        &self,
        confession_id: i64,
    ) -> Result<Vec<ConfessionReply>, AnonmatchError> {
        queries::community::list_replies(self.db()?, confession_id).await
    }

    async fn create_poll(
        &self,
        author: UserId,
        question: &str,
        options: &[String],
        at: DateTime<Utc>,
    ) -> Result<Poll, AnonmatchError> {
        queries::community::create_poll(self.db()?, author, question, options, at).await
    }

    async fn latest_polls(&self, limit: usize) -> Result<Vec<Poll>, AnonmatchError> {
        queries::community::latest_polls(self.db()?, limit).await
    }

    async fn get_poll(&self, id: i64) -> Result<Option<Poll>, AnonmatchError> {
        queries::community::get_poll(self.db()?, id).await
    }

    async fn vote_poll(
        &self,
        poll_id: i64,
        option_id: i64,
        user: UserId,
    ) -> Result<bool, AnonmatchError> {
        queries::community::vote_poll(self.db()?, poll_id, option_id, user).await
    }

    async fn create_whisper(&self, whisper: &Whisper) -> Result<(), AnonmatchError> {
        queries::community::create_whisper(self.db()?, whisper).await
    }

    async fn count_whispers_since(
        &self,
        sender: UserId,
        since: DateTime<Utc>,
    ) -> Result<i64, AnonmatchError> {
        queries::community::count_whispers_since(self.db()?, sender, since).await
    }

    async fn list_rooms(&self) -> Result<Vec<Room>, AnonmatchError> {
        queries::rooms::list_rooms(self.db()?).await
    }

    async fn get_room_by_slug(&self, slug: &str) -> Result<Option<Room>, AnonmatchError> {
        queries::rooms::get_room_by_slug(self.db()?, slug).await
    }

    async fn create_room(
        &self,
        slug: &str,
        name: &str,
        description: &str,
        at: DateTime<Utc>,
    ) -> Result<Room, AnonmatchError> {
        queries::rooms::create_room(self.db()?, slug, name, description, at).await
    }

    async fn join_room(&self, room_id: i64, user: UserId) -> Result<(), AnonmatchError> {
        queries::rooms::join_room(self.db()?, room_id, user).await
    }

    async fn leave_rooms(&self, user: UserId) -> Result<(), AnonmatchError> {
        queries::rooms::leave_rooms(self.db()?, user).await
    }

    async fn room_members(&self, room_id: i64) -> Result<Vec<UserId>, AnonmatchError> {
        queries::rooms::room_members(self.db()?, room_id).await
    }

    async fn user_room(&self, user: UserId) -> Result<Option<Room>, AnonmatchError> {
        queries::rooms::user_room(self.db()?, user).await
    }

    async fn count_confessions_by(&self, author: UserId) -> Result<i64, AnonmatchError> {
        queries::community::count_confessions_by(self.db()?, author).await
    }
}
