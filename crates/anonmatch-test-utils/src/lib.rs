// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for anonmatch integration tests.
//!
//! Provides mock adapters and a harness over a temporary SQLite database so
//! tests run without Telegram, SMTP or a classifier service.
//!
//! # Components
//!
//! - [`MockChannel`] - Mock transport with event injection and capture
//! - [`MockClassifier`] - Scriptable media classifier
//! - [`MockMailer`] - Captures OTP mails instead of sending them
//! - [`TestHarness`] - A wired [`anonmatch_matching::MatchingEngine`] over mocks

pub mod harness;
pub mod mock_channel;
pub mod mock_classifier;
pub mod mock_mailer;

pub use harness::TestHarness;
pub use mock_channel::MockChannel;
pub use mock_classifier::MockClassifier;
pub use mock_mailer::MockMailer;
