// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyed async mutexes in a sharded map.
//!
//! Used for the per-user dispatch lock and the per-session relay lock.
//! Entries are created on first use and dropped once nobody holds or waits
//! on them.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A map of independent mutexes, one per key.
#[derive(Debug)]
pub struct KeyedLocks<K>
where
    K: Eq + Hash,
{
    locks: DashMap<K, Arc<Mutex<()>>>,
}

impl<K> Default for KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Waits for the lock on `key`. The guard releases it on drop.
    pub async fn lock(&self, key: K) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the shard guard is released before awaiting.
        let mutex = self
            .locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        mutex.lock_owned().await
    }

    /// Returns `None` if the lock on `key` is currently held.
    pub fn try_lock(&self, key: K) -> Option<OwnedMutexGuard<()>> {
        let mutex = self
            .locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        mutex.try_lock_owned().ok()
    }

    /// Removes the entry for `key` if no guard or waiter references it.
    pub fn release(&self, key: &K) {
        self.locks.remove_if(key, |_, m| Arc::strong_count(m) == 1);
    }

    /// Removes every idle entry. Returns the number removed.
    pub fn gc(&self) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, m| Arc::strong_count(m) > 1);
        before.saturating_sub(self.locks.len())
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_is_exclusive() {
        let locks = KeyedLocks::<i64>::new();
        let guard = locks.lock(1).await;
        assert!(locks.try_lock(1).is_none());
        drop(guard);
        assert!(locks.try_lock(1).is_some());
    }

    #[tokio::test]
    async fn different_keys_do_not_contend() {
        let locks = KeyedLocks::<i64>::new();
        let _a = locks.lock(1).await;
        let b = tokio::time::timeout(Duration::from_millis(50), locks.lock(2)).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn release_keeps_held_entries() {
        let locks = KeyedLocks::<i64>::new();
        let guard = locks.lock(7).await;
        locks.release(&7);
        assert_eq!(locks.len(), 1);
        drop(guard);
        locks.release(&7);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn gc_drops_only_idle_entries() {
        let locks = KeyedLocks::<i64>::new();
        let _held = locks.lock(1).await;
        drop(locks.lock(2).await);
        drop(locks.lock(3).await);
        assert_eq!(locks.gc(), 2);
        assert_eq!(locks.len(), 1);
    }

    #[tokio::test]
    async fn waiters_are_served_in_order() {
        let locks = Arc::new(KeyedLocks::<i64>::new());
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let first = locks.lock(9).await;

        let mut handles = Vec::new();
        for i in 0..3 {
            let locks = locks.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                let _g = locks.lock(9).await;
                order.lock().unwrap().push(i);
            }));
            // Let each task enqueue on the mutex before spawning the next.
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        drop(first);
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }
}
