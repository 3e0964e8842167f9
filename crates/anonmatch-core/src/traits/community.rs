// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence for the community features that sit beside the matching core.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::community::{Confession, ConfessionReply, Poll, Room, Whisper};
use crate::error::AnonmatchError;
use crate::types::{Department, UserId};

#[async_trait]
pub trait CommunityStore: Send + Sync + 'static {
    async fn create_confession(
        &self,
        author: UserId,
        content: &str,
        department: Option<Department>,
        at: DateTime<Utc>,
    ) -> Result<Confession, AnonmatchError>;

    async fn count_confessions_since(
        &self,
        author: UserId,
        since: DateTime<Utc>,
    ) -> Result<i64, AnonmatchError>;

    async fn latest_confessions(&self, limit: usize) -> Result<Vec<Confession>, AnonmatchError>;

    async fn get_confession(&self, id: i64) -> Result<Option<Confession>, AnonmatchError>;

    /// One reaction per user per confession; a second reaction replaces the first.
    async fn react_to_confession(
        &self,
        confession_id: i64,
        user: UserId,
        emoji: &str,
    ) -> Result<(), AnonmatchError>;

    async fn reaction_counts(&self, confession_id: i64)
    -> Result<Vec<(String, i64)>, AnonmatchError>;

    async fn create_reply(
        &self,
        confession_id: i64,
        author: UserId,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<ConfessionReply, AnonmatchError>;

    async fn count_replies_since(
        &self,
        author: UserId,
        since: DateTime<Utc>,
    ) -> Result<i64, AnonmatchError>;

    async fn list_replies(&self, confession_id: i64)
    -> Result<Vec<ConfessionReply>, AnonmatchError>;

    async fn create_poll(
        &self,
        author: UserId,
        question: &str,
        options: &[String],
        at: DateTime<Utc>,
    ) -> Result<Poll, AnonmatchError>;

    async fn latest_polls(&self, limit: usize) -> Result<Vec<Poll>, AnonmatchError>;

    async fn get_poll(&self, id: i64) -> Result<Option<Poll>, AnonmatchError>;

    /// Returns false if the user already voted on this poll.
    async fn vote_poll(
        &self,
        poll_id: i64,
        option_id: i64,
        user: UserId,
    ) -> Result<bool, AnonmatchError>;

    async fn create_whisper(&self, whisper: &Whisper) -> Result<(), AnonmatchError>;

    async fn count_whispers_since(
        &self,
        sender: UserId,
        since: DateTime<Utc>,
    ) -> Result<i64, AnonmatchError>;

    async fn list_rooms(&self) -> Result<Vec<Room>, AnonmatchError>;

    async fn get_room_by_slug(&self, slug: &str) -> Result<Option<Room>, AnonmatchError>;

    async fn create_room(
        &self,
        slug: &str,
        name: &str,
        description: &str,
        at: DateTime<Utc>,
    ) -> Result<Room, AnonmatchError>;

    /// Leaves every other room and joins `room_id`.
    async fn join_room(&self, room_id: i64, user: UserId) -> Result<(), AnonmatchError>;

    async fn leave_rooms(&self, user: UserId) -> Result<(), AnonmatchError>;

    async fn room_members(&self, room_id: i64) -> Result<Vec<UserId>, AnonmatchError>;

    async fn user_room(&self, user: UserId) -> Result<Option<Room>, AnonmatchError>;

    async fn count_confessions_by(&self, author: UserId) -> Result<i64, AnonmatchError>;
}
