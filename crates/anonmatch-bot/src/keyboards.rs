// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inline keyboards.
//!
//! Callback payloads are `<prefix>:<value>` and stay within the 64-byte
//! transport limit; department buttons carry the short code.

use chrono::{DateTime, Datelike, Utc};

use anonmatch_core::community::{Poll, Room};
use anonmatch_core::types::{Button, Department, Gender, Keyboard, MIN_ENTRY_YEAR};

/// Reactions offered under a confession, in display order.
pub const REACTIONS: [&str; 5] = ["❤️", "😂", "😢", "😮", "🔥"];

const YEARS_PER_ROW: usize = 4;

fn department_rows(prefix: &str) -> Vec<Vec<Button>> {
    Department::ALL
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .map(|d| Button::new(format!("{} {d}", d.emoji()), format!("{prefix}{}", d.code())))
                .collect()
        })
        .collect()
}

fn year_rows(prefix: &str, now: DateTime<Utc>) -> Vec<Vec<Button>> {
    let years: Vec<i32> = (MIN_ENTRY_YEAR..=now.year()).rev().collect();
    years
        .chunks(YEARS_PER_ROW)
        .map(|chunk| {
            chunk
                .iter()
                .map(|y| Button::new(y.to_string(), format!("{prefix}{y}")))
                .collect()
        })
        .collect()
}

fn with_rows(rows: Vec<Vec<Button>>) -> Keyboard {
    rows.into_iter().fold(Keyboard::default(), Keyboard::row)
}

pub fn gender() -> Keyboard {
    Keyboard::default().row(
        Gender::ALL
            .iter()
            .map(|g| Button::new(format!("{} {}", g.emoji(), g.label()), format!("gender:{g}")))
            .collect(),
    )
}

pub fn entry_year(now: DateTime<Utc>) -> Keyboard {
    with_rows(year_rows("year:", now))
}

pub fn department() -> Keyboard {
    with_rows(department_rows("dept:"))
}

pub fn main_menu() -> Keyboard {
    Keyboard::default()
        .row(vec![
            Button::new("🔍 Cari Partner", "menu:search"),
            Button::new("💬 Confession", "menu:confess"),
        ])
        .row(vec![
            Button::new("📢 Whisper", "menu:whisper"),
            Button::new("📋 Confessions", "menu:confessions"),
        ])
        .row(vec![
            Button::new("🗳️ Polling", "menu:polls"),
            Button::new("👥 Circles", "menu:circles"),
        ])
        .row(vec![
            Button::new("👤 Profil", "menu:profile"),
            Button::new("📊 Statistik", "menu:stats"),
        ])
        .row(vec![
            Button::new("✏️ Edit Profil", "menu:edit"),
            Button::new("❓ Bantuan", "menu:help"),
        ])
}

/// Filter picker shown by a bare `/search`.
pub fn search() -> Keyboard {
    Keyboard::default()
        .row(vec![Button::new("🎲 Acak (Semua)", "search:any")])
        .row(vec![
            Button::new("👫 Gender", "search:by_gender"),
            Button::new("🏛️ Jurusan", "search:by_dept"),
            Button::new("🎓 Angkatan", "search:by_year"),
        ])
}

pub fn search_gender() -> Keyboard {
    Keyboard::default().row(
        Gender::ALL
            .iter()
            .map(|g| {
                Button::new(
                    format!("{} {}", g.emoji(), g.label()),
                    format!("search:gender:{g}"),
                )
            })
            .collect(),
    )
}

pub fn search_department() -> Keyboard {
    with_rows(department_rows("search:dept:"))
}

pub fn search_year(now: DateTime<Utc>) -> Keyboard {
    with_rows(year_rows("search:year:", now))
}

pub fn cancel_search() -> Keyboard {
    Keyboard::default().row(vec![Button::new("❌ Batalkan Pencarian", "search:cancel")])
}

pub fn chat_actions() -> Keyboard {
    Keyboard::default()
        .row(vec![
            Button::new("⏭️ Next", "chat:next"),
            Button::new("🛑 Stop", "chat:stop"),
        ])
        .row(vec![
            Button::new("⚠️ Report", "chat:report"),
            Button::new("🚫 Block", "chat:block"),
        ])
}

pub fn confirm(yes: impl Into<String>, no: impl Into<String>) -> Keyboard {
    Keyboard::default().row(vec![Button::new("✅ Ya", yes), Button::new("❌ Tidak", no)])
}

/// Reaction buttons with the current count next to each emoji.
pub fn reactions(confession_id: i64, counts: &[(String, i64)]) -> Keyboard {
    Keyboard::default().row(
        REACTIONS
            .iter()
            .map(|emoji| {
                let count = counts
                    .iter()
                    .find(|(e, _)| e == emoji)
                    .map_or(0, |(_, n)| *n);
                let label = if count > 0 {
                    format!("{emoji} {count}")
                } else {
                    (*emoji).to_string()
                };
                Button::new(label, format!("react:{confession_id}:{emoji}"))
            })
            .collect(),
    )
}

pub fn poll_vote(poll: &Poll) -> Keyboard {
    with_rows(
        poll.options
            .iter()
            .map(|o| {
                vec![Button::new(
                    format!("{} ({})", o.text, o.votes),
                    format!("vote:{}:{}", poll.id, o.id),
                )]
            })
            .collect(),
    )
}

pub fn whisper_department() -> Keyboard {
    with_rows(department_rows("whisper:")).row(vec![Button::new("🔙 Kembali", "menu:main")])
}

pub fn circles(rooms: &[Room]) -> Keyboard {
    let rows = rooms
        .iter()
        .map(|r| {
            vec![Button::new(
                format!("👥 {} ({})", r.name, r.member_count),
                format!("circle:join:{}", r.slug),
            )]
        })
        .collect();
    with_rows(rows).row(vec![Button::new("➕ Buat Circle Baru", "circle:create")])
}

pub fn leave_circle() -> Keyboard {
    Keyboard::default().row(vec![Button::new("🚪 Keluar Circle", "circle:leave")])
}

pub fn back_to_menu() -> Keyboard {
    Keyboard::default().row(vec![Button::new("🔙 Menu Utama", "menu:main")])
}
