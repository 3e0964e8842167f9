// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Short-lived transcript of relayed events per session, read when a report
//! is filed. Frames are capped per session and expire after a TTL.

use std::collections::VecDeque;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use anonmatch_config::model::MatchingConfig;
use anonmatch_core::{SessionId, UserId};

/// Returned by [`EvidenceBuffer::transcript`] when nothing was recorded.
pub const EMPTY_TRANSCRIPT: &str = "No recent chat logs found for this session.";

#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceFrame {
    pub sender_id: UserId,
    /// Content type tag, e.g. `text` or `photo`.
    pub kind: String,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct EvidenceBuffer {
    capacity: usize,
    ttl: chrono::Duration,
    frames: DashMap<SessionId, VecDeque<EvidenceFrame>>,
}

impl EvidenceBuffer {
    pub fn new(capacity: usize, ttl: chrono::Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
            frames: DashMap::new(),
        }
    }

    pub fn from_config(config: &MatchingConfig) -> Self {
        let hours = i64::try_from(config.evidence_ttl_hours).unwrap_or(i64::MAX / 3600);
        Self::new(config.evidence_capacity, chrono::Duration::hours(hours))
    }

    /// Appends a frame, evicting the oldest once the session is at capacity.
    pub fn record(&self, session: SessionId, frame: EvidenceFrame) {
        let mut frames = self.frames.entry(session).or_default();
        while frames.len() >= self.capacity {
            frames.pop_front();
        }
        frames.push_back(frame);
    }

    /// Unexpired frames for `session`, oldest first.
    pub fn frames(&self, session: SessionId, now: DateTime<Utc>) -> Vec<EvidenceFrame> {
        let cutoff = now - self.ttl;
        self.frames
            .get(&session)
            .map(|frames| {
                frames
                    .iter()
                    .filter(|f| f.sent_at > cutoff)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn transcript(&self, session: SessionId, now: DateTime<Utc>) -> String {
        format_transcript(&self.frames(session, now))
    }

    pub fn clear(&self, session: SessionId) {
        self.frames.remove(&session);
    }

    /// Drops expired frames and empty sessions. Returns the number of frames removed.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.ttl;
        let mut removed = 0;
        self.frames.retain(|_, frames| {
            let before = frames.len();
            frames.retain(|f| f.sent_at > cutoff);
            removed += before - frames.len();
            !frames.is_empty()
        });
        removed
    }

    pub fn session_count(&self) -> usize {
        self.frames.len()
    }
}

/// Renders frames as `[HH:MM:SS] User <id>: (<type>) <content>` lines.
pub fn format_transcript(frames: &[EvidenceFrame]) -> String {
    if frames.is_empty() {
        return EMPTY_TRANSCRIPT.to_string();
    }
    let mut out = String::new();
    for f in frames {
        let _ = writeln!(
            out,
            "[{}] User {}: ({}) {}",
            f.sent_at.format("%H:%M:%S"),
            f.sender_id,
            f.kind,
            f.text
        );
    }
    out
}
