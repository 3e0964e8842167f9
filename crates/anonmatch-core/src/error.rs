// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the anonmatch bot.

use thiserror::Error;

/// A rate-limited action. Each action has its own quota window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Action {
    Search,
    Report,
    Confession,
    Reply,
    Whisper,
    Otp,
}

/// The primary error type used across all anonmatch adapter traits and core operations.
#[derive(Debug, Error)]
pub enum AnonmatchError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Channel adapter errors (send failure, wire format, transport rate limiting).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The inbound stream ended; no further updates will arrive.
    #[error("channel closed")]
    ChannelClosed,

    /// Content classifier errors (HTTP failure, unexpected response).
    #[error("moderation error: {message}")]
    Moderation {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// OTP mail delivery errors.
    #[error("mail error: {message}")]
    Mail {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The user has not completed email verification.
    #[error("user is not verified")]
    NotVerified,

    /// The user is verified but gender or department is missing.
    #[error("user profile is incomplete")]
    ProfileIncomplete,

    /// The user is banned.
    #[error("user is banned")]
    Banned,

    /// `/search` while already bound to a partner.
    #[error("user already has an active session")]
    AlreadyInSession,

    /// `/search` while already waiting in the pool.
    #[error("user is already in the waiting pool")]
    AlreadyInQueue,

    /// The action exceeded its per-window quota.
    #[error("rate limited: {action}")]
    RateLimited { action: Action },

    /// The relay target no longer has an active session.
    #[error("partner is no longer in the session")]
    PartnerGone,

    /// Malformed command or out-of-range value.
    #[error("invalid {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    /// Media suppressed by the moderation gate.
    #[error("content blocked: {reason}")]
    ModerationBlocked { reason: String },

    /// An external dependency's circuit breaker is open.
    #[error("circuit breaker [{name}] is open")]
    CircuitOpen { name: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AnonmatchError {
    /// Shorthand for an [`AnonmatchError::InvalidInput`].
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Wrap any error as a storage failure.
    pub fn storage(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage {
            source: Box::new(source),
        }
    }

    /// Returns true for I/O failures that are worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Storage { .. }
                | Self::Channel { .. }
                | Self::Moderation { .. }
                | Self::Mail { .. }
                | Self::Timeout { .. }
        )
    }

    /// Stable label for the `errors_total` metric.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Storage { .. } => "storage",
            Self::Channel { .. } => "channel",
            Self::ChannelClosed => "channel_closed",
            Self::Moderation { .. } => "moderation",
            Self::Mail { .. } => "mail",
            Self::NotVerified => "not_verified",
            Self::ProfileIncomplete => "profile_incomplete",
            Self::Banned => "banned",
            Self::AlreadyInSession => "already_in_session",
            Self::AlreadyInQueue => "already_in_queue",
            Self::RateLimited { .. } => "rate_limited",
            Self::PartnerGone => "partner_gone",
            Self::InvalidInput { .. } => "invalid_input",
            Self::ModerationBlocked { .. } => "moderation_blocked",
            Self::CircuitOpen { .. } => "circuit_open",
            Self::Timeout { .. } => "timeout",
            Self::Internal(_) => "internal",
        }
    }
}

/// Why the matcher refused a search request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Rejection {
    NotVerified,
    ProfileIncomplete,
    Banned,
    AlreadyInSession,
    AlreadyInQueue,
    RateLimited,
}

impl From<Rejection> for AnonmatchError {
    fn from(r: Rejection) -> Self {
        match r {
            Rejection::NotVerified => Self::NotVerified,
            Rejection::ProfileIncomplete => Self::ProfileIncomplete,
            Rejection::Banned => Self::Banned,
            Rejection::AlreadyInSession => Self::AlreadyInSession,
            Rejection::AlreadyInQueue => Self::AlreadyInQueue,
            Rejection::RateLimited => Self::RateLimited {
                action: Action::Search,
            },
        }
    }
}
