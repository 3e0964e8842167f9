// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory waiting pool.
//!
//! Entries are indexed by user id and enumerated in join order. The pool
//! does not interpret filters and has no lock of its own; the matcher owns
//! it behind its mutex.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};

use anonmatch_core::types::{QueueEntry, SearchFilter};
use anonmatch_core::UserId;

#[derive(Debug, Default)]
pub struct WaitingPool {
    entries: HashMap<UserId, QueueEntry>,
    order: BTreeSet<(DateTime<Utc>, UserId)>,
}

impl WaitingPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `entry`, replacing any existing entry for the same user.
    pub fn add(&mut self, entry: QueueEntry) -> Option<QueueEntry> {
        let previous = self.remove(entry.user_id);
        self.order.insert((entry.joined_at, entry.user_id));
        self.entries.insert(entry.user_id, entry);
        previous
    }

    pub fn remove(&mut self, user: UserId) -> Option<QueueEntry> {
        let entry = self.entries.remove(&user)?;
        self.order.remove(&(entry.joined_at, user));
        Some(entry)
    }

    pub fn get(&self, user: UserId) -> Option<&QueueEntry> {
        self.entries.get(&user)
    }

    pub fn contains(&self, user: UserId) -> bool {
        self.entries.contains_key(&user)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries oldest first; ties on join time break by user id.
    pub fn scan(&self) -> impl Iterator<Item = &QueueEntry> + '_ {
        self.order
            .iter()
            .filter_map(|(_, user)| self.entries.get(user))
    }

    /// Users who joined strictly before `ts`, oldest first.
    pub fn expire_before(&self, ts: DateTime<Utc>) -> Vec<UserId> {
        self.order
            .iter()
            .take_while(|(joined, _)| *joined < ts)
            .map(|(_, user)| *user)
            .collect()
    }

    /// Clears the user's filter and moves them to the back of the queue.
    pub fn relax(&mut self, user: UserId, now: DateTime<Utc>) -> bool {
        let Some(mut entry) = self.remove(user) else {
            return false;
        };
        entry.filter = SearchFilter::any();
        entry.joined_at = now;
        self.add(entry);
        true
    }

    /// One-based position in join order.
    pub fn position(&self, user: UserId) -> Option<usize> {
        self.order
            .iter()
            .position(|(_, u)| *u == user)
            .map(|idx| idx + 1)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anonmatch_core::types::{Department, MatchProfile};
    use chrono::Duration;

    fn entry(user: UserId, joined_at: DateTime<Utc>) -> QueueEntry {
        QueueEntry {
            user_id: user,
            filter: SearchFilter {
                department: Some(Department::Akuntansi),
                ..SearchFilter::any()
            },
            profile: MatchProfile::default(),
            joined_at,
        }
    }

    #[test]
    fn scan_yields_join_order() {
        let t = Utc::now();
        let mut pool = WaitingPool::new();
        pool.add(entry(3, t + Duration::seconds(2)));
        pool.add(entry(1, t));
        pool.add(entry(2, t + Duration::seconds(1)));
        let ids: Vec<_> = pool.scan().map(|e| e.user_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(pool.position(2), Some(2));
    }

    #[test]
    fn add_replaces_existing_entry() {
        let t = Utc::now();
        let mut pool = WaitingPool::new();
        pool.add(entry(1, t));
        pool.add(entry(2, t + Duration::seconds(1)));
        let replaced = pool.add(entry(1, t + Duration::seconds(5)));
        assert!(replaced.is_some());
        assert_eq!(pool.len(), 2);
        let ids: Vec<_> = pool.scan().map(|e| e.user_id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut pool = WaitingPool::new();
        pool.add(entry(1, Utc::now()));
        assert!(pool.remove(1).is_some());
        assert!(pool.remove(1).is_none());
        assert!(pool.is_empty());
        assert_eq!(pool.scan().count(), 0);
    }

    #[test]
    fn expire_before_is_strict() {
        let t = Utc::now();
        let mut pool = WaitingPool::new();
        pool.add(entry(1, t - Duration::seconds(90)));
        pool.add(entry(2, t - Duration::seconds(60)));
        pool.add(entry(3, t));
        assert_eq!(pool.expire_before(t - Duration::seconds(60)), vec![1]);
        assert_eq!(pool.expire_before(t + Duration::seconds(1)), vec![1, 2, 3]);
    }

    #[test]
    fn relax_clears_filter_and_requeues_at_back() {
        let t = Utc::now();
        let mut pool = WaitingPool::new();
        pool.add(entry(1, t - Duration::seconds(120)));
        pool.add(entry(2, t - Duration::seconds(10)));
        assert!(pool.relax(1, t));
        let relaxed = pool.get(1).unwrap();
        assert!(relaxed.filter.is_any());
        assert_eq!(relaxed.joined_at, t);
        assert_eq!(pool.position(1), Some(2));
        assert!(!pool.relax(42, t));
    }
}
