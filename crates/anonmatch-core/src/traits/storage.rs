// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for persistence backends (SQLite, etc.).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AnonmatchError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    Achievement, ChatSession, Department, EndedSession, Gender, Report, ReportOutcome,
    SearchFilter, SessionId, StateSnapshot, User, UserId, UserState, VerificationCode,
};

/// A waiting-pool row as persisted, without the in-memory profile snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedQueueEntry {
    pub user_id: UserId,
    pub filter: SearchFilter,
    pub joined_at: DateTime<Utc>,
}

/// Adapter for storage and persistence backends.
///
/// Owns the user rows, the per-user state register, the durable mirror of
/// the waiting pool, chat sessions and the abuse records. Every multi-row
/// mutation runs in a single transaction.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, pragmas).
    async fn initialize(&self) -> Result<(), AnonmatchError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), AnonmatchError>;

    // --- Identity store ---

    /// Creates the user if absent and returns the stored row.
    async fn create_user(&self, id: UserId) -> Result<User, AnonmatchError>;

    async fn get_user(&self, id: UserId) -> Result<Option<User>, AnonmatchError>;

    async fn set_email(&self, id: UserId, email: &str) -> Result<(), AnonmatchError>;

    /// Marks the user verified with the given email.
    async fn set_verified(&self, id: UserId, email: &str) -> Result<(), AnonmatchError>;

    async fn set_gender(&self, id: UserId, gender: Gender) -> Result<(), AnonmatchError>;

    async fn set_entry_year(&self, id: UserId, year: i32) -> Result<(), AnonmatchError>;

    async fn set_department(&self, id: UserId, dept: Department) -> Result<(), AnonmatchError>;

    /// Sets the display handle only if none was assigned yet. Returns true if written.
    async fn assign_display_name(&self, id: UserId, name: &str) -> Result<bool, AnonmatchError>;

    async fn set_banned(&self, id: UserId, banned: bool) -> Result<(), AnonmatchError>;

    /// Returns the new karma value.
    async fn increment_karma(&self, id: UserId, delta: i64) -> Result<i64, AnonmatchError>;

    async fn count_users(&self) -> Result<i64, AnonmatchError>;

    /// Verified, unbanned users of a department, excluding `except`.
    async fn department_members(
        &self,
        dept: Department,
        except: UserId,
    ) -> Result<Vec<UserId>, AnonmatchError>;

    // --- State register ---

    async fn get_state(&self, id: UserId) -> Result<StateSnapshot, AnonmatchError>;

    async fn set_state(
        &self,
        id: UserId,
        state: UserState,
        payload: &str,
    ) -> Result<(), AnonmatchError>;

    // --- Waiting pool mirror ---

    /// All persisted pool entries in join order.
    async fn load_queue(&self) -> Result<Vec<PersistedQueueEntry>, AnonmatchError>;

    /// Upserts the pool row and sets the user's state to `searching` with the filter payload.
    async fn enqueue_seeker(&self, entry: &PersistedQueueEntry) -> Result<(), AnonmatchError>;

    /// Removes the pool row; with `reset_state` also clears a `searching` state to `none`.
    /// Returns true if a row was removed.
    async fn dequeue_seeker(&self, id: UserId, reset_state: bool) -> Result<bool, AnonmatchError>;

    /// Clears the entry's filter and moves its join time to `joined_at`.
    async fn relax_queue_entry(
        &self,
        id: UserId,
        joined_at: DateTime<Utc>,
    ) -> Result<(), AnonmatchError>;

    // --- Session registry ---

    /// Atomically: insert the session, bump both users' `total_chats`, set both
    /// states to `in_chat` and delete both pool rows.
    async fn create_session(
        &self,
        user1: UserId,
        user2: UserId,
        started_at: DateTime<Utc>,
    ) -> Result<ChatSession, AnonmatchError>;

    async fn get_active_session(&self, user: UserId)
    -> Result<Option<ChatSession>, AnonmatchError>;

    async fn get_session(&self, id: SessionId) -> Result<Option<ChatSession>, AnonmatchError>;

    /// Atomically ends an active session and resets both users' states to `none`.
    /// Returns `None` if the session was already ended.
    async fn end_session(
        &self,
        id: SessionId,
        ended_at: DateTime<Utc>,
    ) -> Result<Option<EndedSession>, AnonmatchError>;

    async fn count_active_sessions(&self) -> Result<i64, AnonmatchError>;

    // --- Abuse records ---

    async fn block_user(&self, owner: UserId, blocked: UserId) -> Result<(), AnonmatchError>;

    /// Users with a block edge to or from `user`.
    async fn blocked_peers(&self, user: UserId) -> Result<Vec<UserId>, AnonmatchError>;

    async fn count_reports_since(
        &self,
        reporter: UserId,
        since: DateTime<Utc>,
    ) -> Result<i64, AnonmatchError>;

    /// Persists the report, increments the reported user's counter and bans
    /// them when the counter reaches `auto_ban_threshold`, all in one transaction.
    async fn create_report(
        &self,
        report: &Report,
        auto_ban_threshold: i64,
    ) -> Result<ReportOutcome, AnonmatchError>;

    // --- Verification ---

    /// Stores a fresh code, deleting every older code for the user.
    async fn save_verification_code(&self, code: &VerificationCode) -> Result<(), AnonmatchError>;

    /// Marks a matching unused, unexpired code as used and returns it.
    async fn consume_verification_code(
        &self,
        user: UserId,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<VerificationCode>, AnonmatchError>;

    // --- Achievements ---

    /// Returns true if the achievement was newly earned.
    async fn award_achievement(
        &self,
        user: UserId,
        key: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, AnonmatchError>;

    async fn list_achievements(&self, user: UserId) -> Result<Vec<Achievement>, AnonmatchError>;
}
