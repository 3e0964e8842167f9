// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rolling-window rate limiter keyed by user.
//!
//! Each hit may carry the transport event id; a redelivered event inside
//! the window is admitted again without consuming another slot.

use std::collections::VecDeque;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use anonmatch_core::UserId;

#[derive(Debug)]
struct Hit {
    at: Instant,
    event_id: Option<String>,
}

/// Allows at most `limit` hits per user within any `window`.
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    hits: DashMap<UserId, VecDeque<Hit>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            hits: DashMap::new(),
        }
    }

    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    /// Records a hit and returns whether it is allowed.
    pub fn check(&self, user: UserId, event_id: Option<&str>) -> bool {
        let now = Instant::now();
        let mut hits = self.hits.entry(user).or_default();
        while hits
            .front()
            .is_some_and(|h| now.duration_since(h.at) >= self.window)
        {
            hits.pop_front();
        }

        let replayed = event_id.is_some_and(|id| {
            hits.iter().any(|h| h.event_id.as_deref() == Some(id))
        });
        if replayed {
            return true;
        }

        if hits.len() >= self.limit as usize {
            return false;
        }
        hits.push_back(Hit {
            at: now,
            event_id: event_id.map(str::to_owned),
        });
        true
    }

    /// Hits still inside the window for `user`.
    pub fn count(&self, user: UserId) -> usize {
        let now = Instant::now();
        self.hits
            .get(&user)
            .map(|hits| {
                hits.iter()
                    .filter(|h| now.duration_since(h.at) < self.window)
                    .count()
            })
            .unwrap_or(0)
    }

    pub fn reset(&self, user: UserId) {
        self.hits.remove(&user);
    }

    /// Drops users whose every hit has left the window.
    pub fn gc(&self) {
        let now = Instant::now();
        self.hits.retain(|_, hits| {
            hits.back()
                .is_some_and(|h| now.duration_since(h.at) < self.window)
        });
    }
}
