// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scriptable media classifier.

use std::sync::Mutex;

use async_trait::async_trait;

use anonmatch_core::types::{AdapterType, HealthStatus, Verdict};
use anonmatch_core::{AnonmatchError, ContentClassifier, PluginAdapter};

/// Returns a fixed verdict, optionally failing the next `n` calls with a
/// transient error. Every classified URL is recorded.
pub struct MockClassifier {
    verdict: Mutex<Verdict>,
    failures: Mutex<u32>,
    calls: Mutex<Vec<String>>,
}

impl MockClassifier {
    pub fn new() -> Self {
        Self {
            verdict: Mutex::new(Verdict::Safe),
            failures: Mutex::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_verdict(&self, verdict: Verdict) {
        *lock(&self.verdict) = verdict;
    }

    pub fn fail_next(&self, n: u32) {
        *lock(&self.failures) = n;
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl PluginAdapter for MockClassifier {
    fn name(&self) -> &str {
        "mock-classifier"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Moderation
    }

    async fn health_check(&self) -> Result<HealthStatus, AnonmatchError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), AnonmatchError> {
        Ok(())
    }
}

#[async_trait]
impl ContentClassifier for MockClassifier {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn classify(&self, url: &str) -> Result<Verdict, AnonmatchError> {
        lock(&self.calls).push(url.to_string());
        {
            let mut failures = lock(&self.failures);
            if *failures > 0 {
                *failures -= 1;
                return Err(AnonmatchError::Moderation {
                    message: "mock classifier unavailable".into(),
                    source: None,
                });
            }
        }
        Ok(lock(&self.verdict).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_failures_then_verdict() {
        let c = MockClassifier::new();
        c.fail_next(1);
        let err = c.classify("https://a").await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(c.classify("https://b").await.unwrap(), Verdict::Safe);
        assert_eq!(c.calls(), vec!["https://a".to_string(), "https://b".to_string()]);
    }
}
