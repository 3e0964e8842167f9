// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Health, readiness and metrics handlers.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use anonmatch_core::HealthStatus;

use crate::server::GatewayState;

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Null when no pool probe is wired.
    pub queue_size: Option<usize>,
    /// Null when storage cannot be counted.
    pub user_count: Option<i64>,
}

/// Response body for GET /ready.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    /// `ok`, `degraded` or `unavailable`.
    pub status: String,
    /// Reason the process is not ready, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ReadyResponse {
    fn new(status: &str, detail: Option<String>) -> Self {
        Self {
            status: status.to_string(),
            detail,
        }
    }
}

/// GET /health
///
/// Liveness. Always `200`; the counters are best-effort.
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    let queue_size = match &state.queue_size {
        Some(probe) => Some(probe().await),
        None => None,
    };
    let user_count = match state.storage.count_users().await {
        Ok(n) => Some(n),
        Err(e) => {
            tracing::debug!(error = %e, "health: user count unavailable");
            None
        }
    };
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        queue_size,
        user_count,
    })
}

/// GET /ready
pub async fn get_ready(State(state): State<GatewayState>) -> Response {
    if !state.is_accepting() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse::new(
                "unavailable",
                Some("not accepting updates".into()),
            )),
        )
            .into_response();
    }

    match state.storage.health_check().await {
        Ok(HealthStatus::Healthy) => {
            (StatusCode::OK, Json(ReadyResponse::new("ok", None))).into_response()
        }
        // A degraded store still serves traffic.
        Ok(HealthStatus::Degraded(reason)) => (
            StatusCode::OK,
            Json(ReadyResponse::new("degraded", Some(reason))),
        )
            .into_response(),
        Ok(HealthStatus::Unhealthy(reason)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse::new("unavailable", Some(reason))),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "readiness probe: storage check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadyResponse::new("unavailable", Some(e.to_string()))),
            )
                .into_response()
        }
    }
}

/// GET /metrics
pub async fn get_metrics(State(state): State<GatewayState>) -> Response {
    match &state.prometheus_render {
        Some(render) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}
