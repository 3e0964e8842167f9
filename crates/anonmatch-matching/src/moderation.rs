// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Moderation gate consulted before visual media is relayed.
//!
//! The classifier call is wrapped as breaker(retry(classify)). Any failure,
//! including an open breaker, passes the media through.

use std::sync::Arc;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use anonmatch_core::types::Verdict;
use anonmatch_core::{AnonmatchError, ContentClassifier};
use anonmatch_resilience::{CircuitBreaker, RetryPolicy};

/// Per-category scores returned by the classifier, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct CategoryScores {
    #[serde(default)]
    pub sexual_activity: f64,
    #[serde(default)]
    pub sexual_display: f64,
    #[serde(default)]
    pub erotica: f64,
    #[serde(default)]
    pub weapon: f64,
    #[serde(default)]
    pub drugs: f64,
}

pub const NSFW_REASON: &str = "Konten mengandung unsur seksual atau ketelanjangan (NSFW).";
pub const WEAPON_REASON: &str = "Konten mengandung unsur senjata (WAD).";
pub const DRUGS_REASON: &str = "Konten mengandung unsur narkoba (WAD).";

impl CategoryScores {
    /// Applies the fixed category thresholds.
    pub fn verdict(&self) -> Verdict {
        let unsafe_with = |reason: &str| Verdict::Unsafe {
            reason: reason.to_string(),
        };
        if self.sexual_activity > 0.5 || self.sexual_display > 0.5 || self.erotica > 0.8 {
            return unsafe_with(NSFW_REASON);
        }
        if self.weapon > 0.8 {
            return unsafe_with(WEAPON_REASON);
        }
        if self.drugs > 0.8 {
            return unsafe_with(DRUGS_REASON);
        }
        Verdict::Safe
    }
}

/// Wraps an optional classifier with retry, a circuit breaker and fail-open.
pub struct ModerationGate {
    classifier: Option<Arc<dyn ContentClassifier + Send + Sync>>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl ModerationGate {
    pub fn new(
        classifier: Option<Arc<dyn ContentClassifier + Send + Sync>>,
        breaker: Arc<CircuitBreaker>,
        retry: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            classifier,
            breaker,
            retry,
            cancel,
        }
    }

    /// A gate that passes everything.
    pub fn disabled() -> Self {
        Self::new(
            None,
            Arc::new(CircuitBreaker::new("moderation", Default::default())),
            RetryPolicy::default(),
            CancellationToken::new(),
        )
    }

    pub fn is_enabled(&self) -> bool {
        self.classifier.as_ref().is_some_and(|c| c.is_enabled())
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Classifies the media at `url`. Never fails: errors resolve to [`Verdict::Safe`].
    pub async fn check(&self, url: &str) -> Verdict {
        let classifier = match &self.classifier {
            Some(c) if c.is_enabled() => c.clone(),
            _ => {
                anonmatch_prometheus::record_moderation_check("disabled");
                return Verdict::Safe;
            }
        };

        let result = self
            .breaker
            .call(anonmatch_resilience::retry(&self.retry, &self.cancel, || {
                let classifier = classifier.clone();
                let url = url.to_string();
                async move { classifier.classify(&url).await }
            }))
            .await;

        match result {
            Ok(Verdict::Safe) => {
                anonmatch_prometheus::record_moderation_check("safe");
                Verdict::Safe
            }
            Ok(Verdict::Unsafe { reason }) => {
                debug!(reason = %reason, "media rejected by classifier");
                anonmatch_prometheus::record_moderation_check("unsafe");
                anonmatch_prometheus::record_moderation_blocked(&reason);
                Verdict::Unsafe { reason }
            }
            Err(e) => {
                match &e {
                    AnonmatchError::CircuitOpen { name } => {
                        warn!(breaker = %name, "moderation breaker open, passing media")
                    }
                    _ => warn!(error = %e, "moderation check failed, passing media"),
                }
                anonmatch_prometheus::record_moderation_check("error");
                Verdict::Safe
            }
        }
    }
}
