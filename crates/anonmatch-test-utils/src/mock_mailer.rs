// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OTP mailer that records instead of sending.

use std::sync::Mutex;

use async_trait::async_trait;

use anonmatch_core::types::{AdapterType, HealthStatus};
use anonmatch_core::{AnonmatchError, OtpMailer, PluginAdapter};

#[derive(Default)]
pub struct MockMailer {
    outbox: Mutex<Vec<(String, String)>>,
    fail: Mutex<bool>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent `(email, code)` pair.
    pub fn last_sent(&self) -> Option<(String, String)> {
        lock(&self.outbox).last().cloned()
    }

    pub fn sent_count(&self) -> usize {
        lock(&self.outbox).len()
    }

    /// Make later sends fail with a mail error.
    pub fn set_failing(&self, fail: bool) {
        *lock(&self.fail) = fail;
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl PluginAdapter for MockMailer {
    fn name(&self) -> &str {
        "mock-mailer"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Mailer
    }

    async fn health_check(&self) -> Result<HealthStatus, AnonmatchError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), AnonmatchError> {
        Ok(())
    }
}

#[async_trait]
impl OtpMailer for MockMailer {
    async fn send_otp(
        &self,
        email: &str,
        code: &str,
        _expiry_minutes: u32,
    ) -> Result<(), AnonmatchError> {
        if *lock(&self.fail) {
            return Err(AnonmatchError::Mail {
                message: "mock mailer refused".into(),
                source: None,
            });
        }
        lock(&self.outbox).push((email.to_string(), code.to_string()));
        Ok(())
    }
}
