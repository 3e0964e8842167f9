// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP surface for process supervision.
//!
//! Serves three unauthenticated endpoints:
//! - `GET /health`: liveness with uptime, pool size and user count, always `200`
//! - `GET /ready`: `200` once the bot accepts updates and storage answers, `503` otherwise
//! - `GET /metrics`: Prometheus text exposition, `404` when metrics are disabled

pub mod handlers;
pub mod server;

pub use server::{router, start_server, GatewayState, QueueSizeFn};
