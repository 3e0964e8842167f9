// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a [`MatchingEngine`] over mock adapters and a temp
//! SQLite database, and builds inbound events for driving it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use anonmatch_config::model::{AnonmatchConfig, StorageConfig};
use anonmatch_core::types::{Department, Gender};
use anonmatch_core::{
    AnonmatchError, CommunityStore, ContentClassifier, InboundEvent, InboundKind, StorageAdapter,
    UserId,
};
use anonmatch_matching::MatchingEngine;
use anonmatch_storage::SqliteStorage;

use crate::mock_channel::MockChannel;
use crate::mock_classifier::MockClassifier;
use crate::mock_mailer::MockMailer;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: AnonmatchConfig,
    moderation: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            config: AnonmatchConfig::default(),
            moderation: false,
        }
    }

    /// Adjust the configuration before the engine is built.
    pub fn with_config(mut self, f: impl FnOnce(&mut AnonmatchConfig)) -> Self {
        f(&mut self.config);
        self
    }

    /// Wire the mock classifier into the moderation gate.
    pub fn with_moderation(mut self) -> Self {
        self.moderation = true;
        self
    }

    pub async fn build(self) -> Result<TestHarness, AnonmatchError> {
        let temp_dir = tempfile::TempDir::new().map_err(AnonmatchError::storage)?;
        let mut config = self.config;
        config.storage = StorageConfig {
            database_path: temp_dir.path().join("test.db").to_string_lossy().into_owned(),
            ..config.storage
        };

        let storage = SqliteStorage::new(config.storage.clone());
        storage.initialize().await?;
        let sqlite = Arc::new(storage);
        let storage: Arc<dyn StorageAdapter + Send + Sync> = sqlite.clone();
        let community: Arc<dyn CommunityStore + Send + Sync> = sqlite;

        let channel = Arc::new(MockChannel::new());
        let classifier = Arc::new(MockClassifier::new());
        let mailer = Arc::new(MockMailer::new());
        let shutdown = CancellationToken::new();

        let gate_classifier: Option<Arc<dyn ContentClassifier + Send + Sync>> =
            if self.moderation {
                Some(classifier.clone())
            } else {
                None
            };
        let engine = MatchingEngine::new(
            &config,
            storage.clone(),
            channel.clone(),
            gate_classifier,
            mailer.clone(),
            shutdown.clone(),
        );

        Ok(TestHarness {
            engine,
            channel,
            classifier,
            mailer,
            storage,
            community,
            config,
            shutdown,
            next_event: AtomicU64::new(1),
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with mock adapters and temp storage.
pub struct TestHarness {
    pub engine: MatchingEngine,
    pub channel: Arc<MockChannel>,
    pub classifier: Arc<MockClassifier>,
    pub mailer: Arc<MockMailer>,
    /// SQLite storage adapter (temp DB, cleaned up on drop).
    pub storage: Arc<dyn StorageAdapter + Send + Sync>,
    /// The same database, seen through the community tables.
    pub community: Arc<dyn CommunityStore + Send + Sync>,
    pub config: AnonmatchConfig,
    pub shutdown: CancellationToken,
    next_event: AtomicU64,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Default harness without moderation.
    pub async fn new() -> Result<Self, AnonmatchError> {
        Self::builder().build().await
    }

    /// Creates a verified user with a complete profile.
    pub async fn add_verified_user(
        &self,
        id: UserId,
        gender: Gender,
        department: Department,
        entry_year: i32,
    ) -> Result<(), AnonmatchError> {
        self.storage.create_user(id).await?;
        self.storage
            .set_verified(id, &format!("user{id}@stu.pnj.ac.id"))
            .await?;
        self.storage.set_gender(id, gender).await?;
        self.storage.set_entry_year(id, entry_year).await?;
        self.storage.set_department(id, department).await?;
        self.storage
            .assign_display_name(id, &format!("TestUser{id}"))
            .await?;
        Ok(())
    }

    /// An inbound event with a fresh event id.
    pub fn event(&self, user: UserId, kind: InboundKind) -> InboundEvent {
        let n = self.next_event.fetch_add(1, Ordering::Relaxed);
        InboundEvent {
            event_id: format!("test-evt-{n}"),
            user_id: user,
            message_id: None,
            kind,
            received_at: Utc::now(),
        }
    }

    pub fn command(&self, user: UserId, name: &str, args: &str) -> InboundEvent {
        self.event(
            user,
            InboundKind::Command {
                name: name.to_string(),
                args: args.to_string(),
            },
        )
    }

    pub fn text(&self, user: UserId, text: &str) -> InboundEvent {
        self.event(user, InboundKind::Text(text.to_string()))
    }

    pub fn callback(&self, user: UserId, data: &str) -> InboundEvent {
        let n = self.next_event.load(Ordering::Relaxed);
        self.event(
            user,
            InboundKind::Callback {
                callback_id: format!("cb-{n}"),
                data: data.to_string(),
            },
        )
    }
}
