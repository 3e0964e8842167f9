// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relay of a bound user's messages to their partner.
//!
//! Delivery happens under the session lock and after re-checking that the
//! session is still active, so nothing reaches a user who already left.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use anonmatch_core::types::{MediaPayload, OutboundContent, Verdict};
use anonmatch_core::{
    AnonmatchError, ChannelAdapter, InboundKind, MessageId, OutboundMessage, SessionId,
    StorageAdapter, UserId, UserState,
};

use crate::evidence::{EvidenceBuffer, EvidenceFrame};
use crate::moderation::ModerationGate;
use crate::sessions::SessionRegistry;
use crate::validation::escape_html;

pub const STRANGER_TAG: &str = "<b>Stranger:</b>";
pub const EPHEMERAL_PHOTO_CAPTION: &str =
    "🖼️ <b>Foto Sekali Lihat</b> (Akan terhapus dalam 10 detik)";
pub const EPHEMERAL_VIDEO_CAPTION: &str =
    "📹 <b>Video Sekali Lihat</b> (Akan terhapus dalam 15 detik)";
pub const EPHEMERAL_PHOTO_TTL: Duration = Duration::from_secs(10);
pub const EPHEMERAL_VIDEO_TTL: Duration = Duration::from_secs(15);

/// Result of a successful relay.
#[derive(Debug, Clone, PartialEq)]
pub struct Relayed {
    pub session_id: SessionId,
    pub partner_id: UserId,
    pub message_id: MessageId,
}

pub struct Relay {
    channel: Arc<dyn ChannelAdapter + Send + Sync>,
    storage: Arc<dyn StorageAdapter + Send + Sync>,
    sessions: Arc<SessionRegistry>,
    gate: Arc<ModerationGate>,
    evidence: Arc<EvidenceBuffer>,
    shutdown: CancellationToken,
    deletes: TaskTracker,
}

fn tagged(text: &str) -> String {
    format!("{STRANGER_TAG} {}", escape_html(text))
}

fn caption_for(media: &MediaPayload, ephemeral_header: Option<&str>) -> Option<String> {
    let user_caption = media
        .caption
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .map(tagged);
    match (ephemeral_header, user_caption) {
        (Some(header), Some(c)) => Some(format!("{header}\n\n{c}")),
        (Some(header), None) => Some(header.to_string()),
        (None, c) => c,
    }
}

/// Builds the partner-side message and the view-once TTL, if any.
fn outbound_for(
    partner: UserId,
    kind: &InboundKind,
) -> Result<(OutboundMessage, Option<Duration>), AnonmatchError> {
    let media = |content| OutboundMessage::media(partner, content);
    let out = match kind {
        InboundKind::Text(text) => (OutboundMessage::html(partner, tagged(text)), None),
        InboundKind::Photo(m) => {
            let header = m.ephemeral.then_some(EPHEMERAL_PHOTO_CAPTION);
            let content = OutboundContent::Photo {
                file_id: m.file_id.clone(),
                caption: caption_for(m, header),
            };
            (media(content), m.ephemeral.then_some(EPHEMERAL_PHOTO_TTL))
        }
        InboundKind::Video(m) => {
            let header = m.ephemeral.then_some(EPHEMERAL_VIDEO_CAPTION);
            let content = OutboundContent::Video {
                file_id: m.file_id.clone(),
                caption: caption_for(m, header),
            };
            (media(content), m.ephemeral.then_some(EPHEMERAL_VIDEO_TTL))
        }
        InboundKind::Voice(m) => (
            media(OutboundContent::Voice {
                file_id: m.file_id.clone(),
            }),
            None,
        ),
        InboundKind::VideoNote(m) => (
            media(OutboundContent::VideoNote {
                file_id: m.file_id.clone(),
            }),
            None,
        ),
        InboundKind::Animation(m) => (
            media(OutboundContent::Animation {
                file_id: m.file_id.clone(),
            }),
            None,
        ),
        InboundKind::Sticker(m) => (
            media(OutboundContent::Sticker {
                file_id: m.file_id.clone(),
            }),
            None,
        ),
        InboundKind::Document(m) => (
            media(OutboundContent::Document {
                file_id: m.file_id.clone(),
                caption: caption_for(m, None),
            }),
            None,
        ),
        InboundKind::Command { .. } | InboundKind::Callback { .. } | InboundKind::Unsupported => {
            return Err(AnonmatchError::invalid(
                "message",
                format!("{} cannot be relayed", kind.label()),
            ));
        }
    };
    Ok(out)
}

/// Media that must pass the moderation gate before delivery.
fn moderated_media(kind: &InboundKind) -> Option<&MediaPayload> {
    match kind {
        InboundKind::Photo(m) | InboundKind::Animation(m) | InboundKind::Sticker(m) => Some(m),
        _ => None,
    }
}

/// Textual form kept in the evidence buffer.
fn evidence_text(kind: &InboundKind) -> String {
    match kind {
        InboundKind::Text(t) => t.clone(),
        InboundKind::Photo(m) => format!("Photo:{}", m.file_id),
        InboundKind::Video(m) => format!("Video:{}", m.file_id),
        InboundKind::Voice(m) => format!("Voice:{}", m.file_id),
        InboundKind::VideoNote(m) => format!("VideoNote:{}", m.file_id),
        InboundKind::Animation(m) => format!("Animation:{}", m.file_id),
        InboundKind::Sticker(m) => format!("Sticker:{}", m.file_id),
        InboundKind::Document(m) => format!("Document:{}", m.file_id),
        other => other.label().to_string(),
    }
}

impl Relay {
    pub fn new(
        channel: Arc<dyn ChannelAdapter + Send + Sync>,
        storage: Arc<dyn StorageAdapter + Send + Sync>,
        sessions: Arc<SessionRegistry>,
        gate: Arc<ModerationGate>,
        evidence: Arc<EvidenceBuffer>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            channel,
            storage,
            sessions,
            gate,
            evidence,
            shutdown,
            deletes: TaskTracker::new(),
        }
    }

    /// Forwards `kind` from `sender` to their partner.
    ///
    /// Fails with [`AnonmatchError::PartnerGone`] after healing the sender's
    /// state when no active session exists, and with
    /// [`AnonmatchError::ModerationBlocked`] when the gate rejects the media.
    pub async fn forward(
        &self,
        sender: UserId,
        kind: &InboundKind,
        now: DateTime<Utc>,
    ) -> Result<Relayed, AnonmatchError> {
        let Some(session) = self.sessions.get_active_for(sender).await? else {
            return self.heal(sender).await;
        };
        let Some(partner) = session.partner_of(sender) else {
            return self.heal(sender).await;
        };

        if let Some(m) = moderated_media(kind) {
            if self.gate.is_enabled() {
                self.moderate(sender, m).await?;
            }
        }
        let (message, ttl) = outbound_for(partner, kind)?;

        let guard = self.sessions.lock_session(session.id).await;
        let still_bound = self
            .sessions
            .get_active_for(sender)
            .await?
            .is_some_and(|s| s.id == session.id);
        if !still_bound {
            drop(guard);
            self.sessions.release_lock(session.id);
            return self.heal(sender).await;
        }

        let sent = self.channel.send(message).await;
        drop(guard);
        self.sessions.release_lock(session.id);
        let message_id = sent?;

        self.evidence.record(
            session.id,
            EvidenceFrame {
                sender_id: sender,
                kind: kind.label().to_string(),
                text: evidence_text(kind),
                sent_at: now,
            },
        );
        anonmatch_prometheus::record_message(kind.label());
        if let Some(ttl) = ttl {
            self.schedule_delete(partner, message_id.clone(), ttl);
        }
        debug!(session_id = session.id, kind = kind.label(), "relayed");

        Ok(Relayed {
            session_id: session.id,
            partner_id: partner,
            message_id,
        })
    }

    async fn moderate(&self, sender: UserId, media: &MediaPayload) -> Result<(), AnonmatchError> {
        let url = match self.channel.media_url(&media.file_id).await {
            Ok(url) => url,
            Err(e) => {
                warn!(user_id = sender, error = %e, "could not resolve media url, skipping moderation");
                return Ok(());
            }
        };
        match self.gate.check(&url).await {
            Verdict::Safe => Ok(()),
            Verdict::Unsafe { reason } => {
                debug!(user_id = sender, reason = %reason, "media blocked");
                Err(AnonmatchError::ModerationBlocked { reason })
            }
        }
    }

    async fn heal(&self, sender: UserId) -> Result<Relayed, AnonmatchError> {
        debug!(user_id = sender, "relay without active session, resetting state");
        if let Err(e) = self.storage.set_state(sender, UserState::None, "").await {
            warn!(user_id = sender, error = %e, "failed to reset state");
        }
        Err(AnonmatchError::PartnerGone)
    }

    /// Deletes the delivered message after `delay`, or right away on shutdown.
    fn schedule_delete(&self, user: UserId, message_id: MessageId, delay: Duration) {
        let channel = self.channel.clone();
        let shutdown = self.shutdown.clone();
        self.deletes.spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(delay) => {}
            }
            if let Err(e) = channel.delete(user, &message_id).await {
                warn!(user_id = user, error = %e, "failed to delete view-once message");
            }
        });
    }

    /// Waits for scheduled deletes. Call after the shutdown token fired.
    pub async fn drain(&self) {
        self.deletes.close();
        self.deletes.wait().await;
    }

    pub fn pending_deletes(&self) -> usize {
        self.deletes.len()
    }
}
