// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock transport for deterministic testing.
//!
//! `MockChannel` implements `ChannelAdapter` with injectable inbound events
//! and captured outbound traffic for assertion in tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::Notify;

use anonmatch_core::types::{AdapterType, HealthStatus, MessageId, OutboundMessage};
use anonmatch_core::{AnonmatchError, ChannelAdapter, InboundEvent, PluginAdapter, UserId};

/// A mock transport for testing.
///
/// - **inbound**: events injected via `inject()` are returned by `receive()`,
///   which reports the channel closed once `close()` ran and the queue is empty
/// - **sent**: messages passed to `send()` are captured with sequential ids
/// - **deleted**: `(user, message)` pairs passed to `delete()`
/// - **callbacks**: answered callback ids with their toast text
pub struct MockChannel {
    inbound: Mutex<VecDeque<InboundEvent>>,
    sent: Mutex<Vec<(MessageId, OutboundMessage)>>,
    deleted: Mutex<Vec<(UserId, MessageId)>>,
    callbacks: Mutex<Vec<(String, Option<String>)>>,
    fail_sends_to: Mutex<Vec<UserId>>,
    next_id: AtomicU64,
    closed: AtomicBool,
    notify: Notify,
}

impl MockChannel {
    pub fn new() -> Self {
        Self {
            inbound: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            callbacks: Mutex::new(Vec::new()),
            fail_sends_to: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Queue an inbound event; the next `receive()` returns it.
    pub fn inject(&self, event: InboundEvent) {
        lock(&self.inbound).push_back(event);
        self.notify.notify_one();
    }

    /// End the inbound stream. Already injected events are still delivered.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// All messages that went through `send()`, in order.
    pub fn sent_messages(&self) -> Vec<OutboundMessage> {
        lock(&self.sent).iter().map(|(_, m)| m.clone()).collect()
    }

    /// Messages delivered to `user`.
    pub fn sent_to(&self, user: UserId) -> Vec<OutboundMessage> {
        lock(&self.sent)
            .iter()
            .filter(|(_, m)| m.user_id == user)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Text bodies and captions delivered to `user`.
    pub fn bodies_to(&self, user: UserId) -> Vec<String> {
        self.sent_to(user)
            .iter()
            .filter_map(|m| m.body().map(str::to_string))
            .collect()
    }

    pub fn sent_count(&self) -> usize {
        lock(&self.sent).len()
    }

    pub fn deleted_messages(&self) -> Vec<(UserId, MessageId)> {
        lock(&self.deleted).clone()
    }

    pub fn answered_callbacks(&self) -> Vec<(String, Option<String>)> {
        lock(&self.callbacks).clone()
    }

    /// Make every later `send()` to `user` fail, as if they blocked the bot.
    pub fn fail_sends_to(&self, user: UserId) {
        lock(&self.fail_sends_to).push(user);
    }

    pub fn clear_sent(&self) {
        lock(&self.sent).clear();
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl PluginAdapter for MockChannel {
    fn name(&self) -> &str {
        "mock-channel"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, AnonmatchError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), AnonmatchError> {
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for MockChannel {
    async fn connect(&mut self) -> Result<(), AnonmatchError> {
        Ok(())
    }

    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, AnonmatchError> {
        if lock(&self.fail_sends_to).contains(&msg.user_id) {
            return Err(AnonmatchError::Channel {
                message: format!("bot was blocked by user {}", msg.user_id),
                source: None,
            });
        }
        let id = MessageId(format!(
            "mock-msg-{}",
            self.next_id.fetch_add(1, Ordering::Relaxed)
        ));
        lock(&self.sent).push((id.clone(), msg));
        Ok(id)
    }

    async fn delete(&self, user_id: UserId, message_id: &MessageId) -> Result<(), AnonmatchError> {
        lock(&self.deleted).push((user_id, message_id.clone()));
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), AnonmatchError> {
        lock(&self.callbacks).push((callback_id.to_string(), text.map(str::to_string)));
        Ok(())
    }

    async fn media_url(&self, file_id: &str) -> Result<String, AnonmatchError> {
        Ok(format!("https://mock.example/files/{file_id}"))
    }

    async fn receive(&self) -> Result<InboundEvent, AnonmatchError> {
        loop {
            let notified = self.notify.notified();
            if let Some(event) = lock(&self.inbound).pop_front() {
                return Ok(event);
            }
            if self.closed.load(Ordering::SeqCst) {
                return Err(AnonmatchError::ChannelClosed);
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use anonmatch_core::InboundKind;
    use chrono::Utc;

    fn event(user: UserId, text: &str) -> InboundEvent {
        InboundEvent {
            event_id: format!("evt-{user}-{text}"),
            user_id: user,
            message_id: None,
            kind: InboundKind::Text(text.to_string()),
            received_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn receive_returns_injected_events_in_order() {
        let channel = MockChannel::new();
        channel.inject(event(1, "first"));
        channel.inject(event(1, "second"));
        assert_eq!(channel.receive().await.unwrap().kind, InboundKind::Text("first".into()));
        assert_eq!(channel.receive().await.unwrap().kind, InboundKind::Text("second".into()));
    }

    #[tokio::test]
    async fn receive_waits_for_injection() {
        let channel = Arc::new(MockChannel::new());
        let producer = channel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            producer.inject(event(2, "delayed"));
        });
        let received = tokio::time::timeout(std::time::Duration::from_secs(2), channel.receive())
            .await
            .expect("receive timed out")
            .unwrap();
        assert_eq!(received.user_id, 2);
    }

    #[tokio::test]
    async fn close_delivers_queued_events_first() {
        let channel = MockChannel::new();
        channel.inject(event(4, "last"));
        channel.close();
        assert_eq!(channel.receive().await.unwrap().user_id, 4);
        assert!(matches!(
            channel.receive().await,
            Err(AnonmatchError::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn send_assigns_sequential_ids() {
        let channel = MockChannel::new();
        let a = channel.send(OutboundMessage::text(1, "a")).await.unwrap();
        let b = channel.send(OutboundMessage::text(2, "b")).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(channel.bodies_to(2), vec!["b".to_string()]);
        assert_eq!(channel.sent_count(), 2);
        channel.clear_sent();
        assert_eq!(channel.sent_count(), 0);
    }

    #[tokio::test]
    async fn failing_recipient() {
        let channel = MockChannel::new();
        channel.fail_sends_to(3);
        assert!(channel.send(OutboundMessage::text(3, "x")).await.is_err());
        assert!(channel.sent_messages().is_empty());
    }

    #[tokio::test]
    async fn delete_and_callbacks_are_captured() {
        let channel = MockChannel::new();
        let id = channel.send(OutboundMessage::text(1, "x")).await.unwrap();
        channel.delete(1, &id).await.unwrap();
        channel.answer_callback("cb-1", Some("ok")).await.unwrap();
        assert_eq!(channel.deleted_messages(), vec![(1, id)]);
        assert_eq!(
            channel.answered_callbacks(),
            vec![("cb-1".to_string(), Some("ok".to_string()))]
        );
    }
}
