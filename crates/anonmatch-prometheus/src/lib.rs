// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics for the anonmatch bot.
//!
//! Uses the metrics-rs facade with the Prometheus exporter. Every crate
//! records through the helpers in [`recording`]; when no recorder is
//! installed they are no-ops. The rendered text is served by the gateway's
//! `/metrics` endpoint.

pub mod recording;

use async_trait::async_trait;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use anonmatch_core::{AdapterType, AnonmatchError, HealthStatus, PluginAdapter};

pub use recording::*;

/// Buckets for sub-second handler and lock timings, stretching to the
/// two-minute handler timeout.
const DURATION_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0,
];

/// Prometheus metrics adapter.
///
/// Installs the Prometheus recorder and keeps the handle used to render the
/// text exposition format.
pub struct PrometheusAdapter {
    handle: PrometheusHandle,
}

impl PrometheusAdapter {
    /// Installs the Prometheus recorder globally. Only one recorder can be
    /// installed per process; a second call returns an error.
    pub fn new() -> Result<Self, AnonmatchError> {
        let handle = PrometheusBuilder::new()
            .set_buckets(DURATION_BUCKETS)
            .map_err(|e| AnonmatchError::Internal(format!("invalid histogram buckets: {e}")))?
            .install_recorder()
            .map_err(|e| {
                AnonmatchError::Internal(format!("failed to install Prometheus recorder: {e}"))
            })?;

        recording::register_metrics();

        tracing::info!("prometheus metrics recorder installed");

        Ok(Self { handle })
    }

    pub fn handle(&self) -> &PrometheusHandle {
        &self.handle
    }

    /// Render all collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

#[async_trait]
impl PluginAdapter for PrometheusAdapter {
    fn name(&self) -> &str {
        "prometheus"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Observability
    }

    async fn health_check(&self) -> Result<HealthStatus, AnonmatchError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), AnonmatchError> {
        Ok(())
    }
}
