// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The anonmatch bot: update dispatch, command routing and the community
//! features around the matching core.
//!
//! [`Dispatcher`] pulls events from a channel adapter and hands them to a
//! [`Router`] on a bounded worker pool. Handlers share a [`BotContext`].

pub mod context;
pub mod dispatcher;
pub mod handlers;
pub mod keyboards;
pub mod router;
pub mod shutdown;
pub mod texts;
pub mod workers;

pub use context::BotContext;
pub use dispatcher::Dispatcher;
pub use router::Router;
