// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Achievement catalog.

pub const CHAT_MARATHON: &str = "CHAT_MARATHON";
pub const KARMA_MASTER: &str = "KARMA_MASTER";
pub const POPULAR_AUTHOR: &str = "POPULAR_AUTHOR";

/// Session length that earns [`CHAT_MARATHON`].
pub const MARATHON_MINUTES: i64 = 60;
/// Karma that earns [`KARMA_MASTER`].
pub const KARMA_MASTER_THRESHOLD: i64 = 50;
/// Reactions on a single confession that earn [`POPULAR_AUTHOR`].
pub const POPULAR_AUTHOR_REACTIONS: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AchievementInfo {
    pub key: &'static str,
    pub icon: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub const CATALOG: [AchievementInfo; 3] = [
    AchievementInfo {
        key: CHAT_MARATHON,
        icon: "🏃",
        name: "Chat Marathon",
        description: "Ngobrol dengan satu partner selama 60 menit atau lebih",
    },
    AchievementInfo {
        key: KARMA_MASTER,
        icon: "✨",
        name: "Karma Master",
        description: "Mengumpulkan 50 karma",
    },
    AchievementInfo {
        key: POPULAR_AUTHOR,
        icon: "🔥",
        name: "Popular Author",
        description: "Confession kamu mendapat 5 reaksi",
    },
];

pub fn lookup(key: &str) -> Option<&'static AchievementInfo> {
    CATALOG.iter().find(|a| a.key == key)
}

/// Karma awarded to both participants for a session of `minutes`.
pub fn karma_for_duration(minutes: i64) -> i64 {
    if minutes >= 10 {
        2
    } else if minutes >= 5 {
        1
    } else {
        0
    }
}
