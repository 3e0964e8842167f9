// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Matching core for the anonmatch bot.
//!
//! Owns the waiting pool, the matcher, the session registry, the relay with
//! its moderation gate, abuse controls and the onboarding flow. Everything
//! here talks to the outside world only through the adapter traits in
//! `anonmatch-core`.

pub mod abuse;
pub mod achievements;
pub mod engine;
pub mod evidence;
pub mod locks;
pub mod matcher;
pub mod moderation;
pub mod onboarding;
pub mod pool;
pub mod rate_limit;
pub mod relay;
pub mod sessions;
pub mod sightengine;
pub mod validation;

use std::future::Future;
use std::time::Duration;

use anonmatch_core::AnonmatchError;

pub use abuse::{AbuseController, ReportResult};
pub use engine::MatchingEngine;
pub use evidence::EvidenceBuffer;
pub use locks::KeyedLocks;
pub use matcher::{is_compatible, Matcher};
pub use moderation::ModerationGate;
pub use onboarding::Onboarding;
pub use pool::WaitingPool;
pub use rate_limit::RateLimiter;
pub use relay::{Relay, Relayed};
pub use sessions::{SessionEnd, SessionRegistry};
pub use sightengine::SightengineClassifier;

/// Runs a persistence call with an upper bound.
pub(crate) async fn bounded<T, F>(timeout: Duration, fut: F) -> Result<T, AnonmatchError>
where
    F: Future<Output = Result<T, AnonmatchError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(AnonmatchError::Timeout { duration: timeout }),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use anonmatch_config::model::StorageConfig;
    use anonmatch_core::types::{Department, Gender};
    use anonmatch_core::{StorageAdapter, UserId};
    use anonmatch_storage::SqliteStorage;

    pub async fn setup_storage() -> (Arc<dyn StorageAdapter + Send + Sync>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            database_path: dir.path().join("test.db").to_string_lossy().into_owned(),
            ..StorageConfig::default()
        };
        let storage = SqliteStorage::new(config);
        storage.initialize().await.unwrap();
        (Arc::new(storage), dir)
    }

    pub async fn verified_user(
        storage: &Arc<dyn StorageAdapter + Send + Sync>,
        id: UserId,
        gender: Gender,
        department: Department,
        year: i32,
    ) {
        storage.create_user(id).await.unwrap();
        storage
            .set_verified(id, &format!("u{id}@stu.pnj.ac.id"))
            .await
            .unwrap();
        storage.set_gender(id, gender).await.unwrap();
        storage.set_entry_year(id, year).await.unwrap();
        storage.set_department(id, department).await.unwrap();
    }
}
