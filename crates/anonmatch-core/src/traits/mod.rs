// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! Adapters extend the [`PluginAdapter`] base trait and use `#[async_trait]`
//! so they can be held as trait objects.

pub mod adapter;
pub mod channel;
pub mod community;
pub mod mailer;
pub mod moderation;
pub mod storage;

pub use adapter::PluginAdapter;
pub use channel::ChannelAdapter;
pub use community::CommunityStore;
pub use mailer::OtpMailer;
pub use moderation::ContentClassifier;
pub use storage::{PersistedQueueEntry, StorageAdapter};
