// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Records for the community features: confessions, polls, whispers and circles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Department, UserId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Confession {
    pub id: i64,
    pub author_id: UserId,
    pub content: String,
    pub department: Option<Department>,
    pub reaction_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfessionReply {
    pub id: i64,
    pub confession_id: i64,
    pub author_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollOption {
    pub id: i64,
    pub text: String,
    pub votes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poll {
    pub id: i64,
    pub author_id: UserId,
    pub question: String,
    pub options: Vec<PollOption>,
    pub created_at: DateTime<Utc>,
}

impl Poll {
    pub fn total_votes(&self) -> i64 {
        self.options.iter().map(|o| o.votes).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Whisper {
    pub sender_id: UserId,
    pub target_department: Department,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A circle (multi-user anonymous room).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub member_count: i64,
    pub created_at: DateTime<Utc>,
}
