// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{routing::get, Router};
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use anonmatch_config::model::GatewayConfig;
use anonmatch_core::{AnonmatchError, StorageAdapter};

use crate::handlers;

/// Reports the current waiting-pool size.
pub type QueueSizeFn = Arc<dyn Fn() -> BoxFuture<'static, usize> + Send + Sync>;

/// Shared state for the health handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
    /// Probed by `/ready`.
    pub storage: Arc<dyn StorageAdapter + Send + Sync>,
    /// Set once the dispatcher accepts updates, cleared when shutdown begins.
    pub accepting: Arc<AtomicBool>,
    /// Optional Prometheus metrics render function.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
    pub queue_size: Option<QueueSizeFn>,
}

impl GatewayState {
    pub fn new(storage: Arc<dyn StorageAdapter + Send + Sync>) -> Self {
        Self {
            start_time: std::time::Instant::now(),
            storage,
            accepting: Arc::new(AtomicBool::new(false)),
            prometheus_render: None,
            queue_size: None,
        }
    }

    pub fn with_metrics(mut self, render: Arc<dyn Fn() -> String + Send + Sync>) -> Self {
        self.prometheus_render = Some(render);
        self
    }

    pub fn with_queue_size(mut self, probe: QueueSizeFn) -> Self {
        self.queue_size = Some(probe);
        self
    }

    pub fn set_accepting(&self, accepting: bool) {
        self.accepting.store(accepting, Ordering::SeqCst);
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }
}

pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(handlers::get_health))
        .route("/ready", get(handlers::get_ready))
        .route("/metrics", get(handlers::get_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds `host:port` and serves until `shutdown` is cancelled.
pub async fn start_server(
    config: &GatewayConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), AnonmatchError> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AnonmatchError::Channel {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!(%addr, "health gateway listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| AnonmatchError::Channel {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("health gateway stopped");
    Ok(())
}
