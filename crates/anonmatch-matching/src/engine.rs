// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wires the matching components together from configuration.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use anonmatch_config::model::AnonmatchConfig;
use anonmatch_core::{
    AnonmatchError, ChannelAdapter, ContentClassifier, OtpMailer, StorageAdapter, UserId,
};
use anonmatch_resilience::{BreakerConfig, CircuitBreaker, RetryPolicy};

use crate::abuse::AbuseController;
use crate::evidence::EvidenceBuffer;
use crate::matcher::Matcher;
use crate::moderation::ModerationGate;
use crate::onboarding::Onboarding;
use crate::relay::Relay;
use crate::sessions::SessionRegistry;

/// Every matching component, sharing one storage and one evidence buffer.
#[derive(Clone)]
pub struct MatchingEngine {
    pub storage: Arc<dyn StorageAdapter + Send + Sync>,
    pub channel: Arc<dyn ChannelAdapter + Send + Sync>,
    pub evidence: Arc<EvidenceBuffer>,
    pub sessions: Arc<SessionRegistry>,
    pub matcher: Matcher,
    pub gate: Arc<ModerationGate>,
    pub relay: Arc<Relay>,
    pub abuse: Arc<AbuseController>,
    pub onboarding: Arc<Onboarding>,
    idle_threshold: Duration,
}

impl MatchingEngine {
    pub fn new(
        config: &AnonmatchConfig,
        storage: Arc<dyn StorageAdapter + Send + Sync>,
        channel: Arc<dyn ChannelAdapter + Send + Sync>,
        classifier: Option<Arc<dyn ContentClassifier + Send + Sync>>,
        mailer: Arc<dyn OtpMailer + Send + Sync>,
        shutdown: CancellationToken,
    ) -> Self {
        let timeout = Duration::from_secs(config.matching.persistence_timeout_secs);
        let evidence = Arc::new(EvidenceBuffer::from_config(&config.matching));
        let sessions = Arc::new(SessionRegistry::new(
            storage.clone(),
            evidence.clone(),
            timeout,
        ));
        let matcher = Matcher::new(
            storage.clone(),
            sessions.clone(),
            config.limits.max_search_per_minute,
            timeout,
        );

        let breaker = Arc::new(CircuitBreaker::new(
            "moderation",
            BreakerConfig::from_config(&config.resilience),
        ));
        let gate = Arc::new(ModerationGate::new(
            classifier,
            breaker,
            RetryPolicy::from_config(&config.resilience),
            shutdown.clone(),
        ));
        let relay = Arc::new(Relay::new(
            channel.clone(),
            storage.clone(),
            sessions.clone(),
            gate.clone(),
            evidence.clone(),
            shutdown,
        ));
        let abuse = Arc::new(AbuseController::new(
            storage.clone(),
            sessions.clone(),
            matcher.clone(),
            evidence.clone(),
            &config.limits,
        ));
        let onboarding = Arc::new(Onboarding::new(
            storage.clone(),
            mailer,
            config.verification.clone(),
        ));

        Self {
            storage,
            channel,
            evidence,
            sessions,
            matcher,
            gate,
            relay,
            abuse,
            onboarding,
            idle_threshold: Duration::from_secs(config.matching.idle_threshold_secs),
        }
    }

    /// Reloads the waiting pool from the persisted mirror.
    pub async fn restore(&self) -> Result<usize, AnonmatchError> {
        self.matcher.restore_from_storage().await
    }

    /// One queue-worker pass: relaxes filters of idle seekers and returns them.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<Vec<UserId>, AnonmatchError> {
        let relaxed = self.matcher.relax_idle(now, self.idle_threshold).await?;
        self.matcher.gc();
        anonmatch_prometheus::set_queue_size(self.matcher.pool_size().await);
        Ok(relaxed)
    }

    pub fn idle_threshold(&self) -> Duration {
        self.idle_threshold
    }

    /// Drops evidence past its TTL.
    pub fn sweep_evidence(&self, now: DateTime<Utc>) -> usize {
        self.evidence.sweep(now)
    }

    /// Waits for scheduled view-once deletions to settle.
    pub async fn drain(&self) {
        self.relay.drain().await;
    }
}
