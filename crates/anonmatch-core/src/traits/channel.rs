// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel adapter trait for the chat transport.

use async_trait::async_trait;

use crate::error::AnonmatchError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{InboundEvent, MessageId, OutboundMessage, UserId};

/// Adapter for the bidirectional chat transport.
///
/// The core never speaks the wire protocol: it consumes [`InboundEvent`]s and
/// emits [`OutboundMessage`]s through this trait.
#[async_trait]
pub trait ChannelAdapter: PluginAdapter {
    /// Establishes a connection to the messaging platform.
    async fn connect(&mut self) -> Result<(), AnonmatchError>;

    /// Sends a message through the channel.
    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, AnonmatchError>;

    /// Deletes a previously sent message from a user's chat.
    async fn delete(&self, user_id: UserId, message_id: &MessageId) -> Result<(), AnonmatchError>;

    /// Acknowledges a button press.
    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), AnonmatchError>;

    /// Resolves a media reference into a publicly fetchable URL.
    async fn media_url(&self, file_id: &str) -> Result<String, AnonmatchError>;

    /// Receives the next inbound event from the channel.
    ///
    /// Returns [`AnonmatchError::ChannelClosed`] once the stream has ended.
    async fn receive(&self) -> Result<InboundEvent, AnonmatchError>;
}
