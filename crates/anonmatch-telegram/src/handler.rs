// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversion of Telegram updates into channel-agnostic [`InboundEvent`]s.
//!
//! Only private chats are served; group traffic is dropped before it reaches
//! the dispatcher.

use chrono::Utc;
use teloxide::types::{CallbackQuery, ChatKind, Message};

use anonmatch_core::types::MediaPayload;
use anonmatch_core::{InboundEvent, InboundKind, MessageId};

/// Checks whether the message is from a private (DM) chat.
pub fn is_dm(msg: &Message) -> bool {
    matches!(msg.chat.kind, ChatKind::Private(_))
}

/// Splits `/name@bot args` into a lowercase name and the trimmed argument string.
pub fn parse_command(text: &str) -> Option<(String, String)> {
    let rest = text.strip_prefix('/')?;
    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim()),
        None => (rest, ""),
    };
    let name = head.split('@').next().unwrap_or(head);
    if name.is_empty() {
        return None;
    }
    Some((name.to_lowercase(), args.to_string()))
}

fn media(file_id: &str, msg: &Message) -> MediaPayload {
    MediaPayload {
        file_id: file_id.to_string(),
        caption: msg.caption().map(str::to_string),
        ephemeral: msg.has_media_spoiler(),
    }
}

/// Maps a message to its [`InboundKind`].
///
/// Animations are checked before documents because Telegram attaches both
/// to a GIF message.
pub fn message_kind(msg: &Message) -> InboundKind {
    if let Some(text) = msg.text() {
        return match parse_command(text) {
            Some((name, args)) => InboundKind::Command { name, args },
            None => InboundKind::Text(text.to_string()),
        };
    }
    if let Some(photos) = msg.photo() {
        // Telegram provides multiple sizes; the last one is the largest.
        return match photos.last() {
            Some(largest) => InboundKind::Photo(media(&largest.file.id.0, msg)),
            None => InboundKind::Unsupported,
        };
    }
    if let Some(video) = msg.video() {
        return InboundKind::Video(media(&video.file.id.0, msg));
    }
    if let Some(animation) = msg.animation() {
        return InboundKind::Animation(media(&animation.file.id.0, msg));
    }
    if let Some(voice) = msg.voice() {
        return InboundKind::Voice(media(&voice.file.id.0, msg));
    }
    if let Some(note) = msg.video_note() {
        return InboundKind::VideoNote(media(&note.file.id.0, msg));
    }
    if let Some(sticker) = msg.sticker() {
        return InboundKind::Sticker(media(&sticker.file.id.0, msg));
    }
    if let Some(doc) = msg.document() {
        return InboundKind::Document(media(&doc.file.id.0, msg));
    }
    InboundKind::Unsupported
}

/// Converts a private-chat message. Returns `None` when there is no sender.
pub fn to_inbound_event(msg: &Message) -> Option<InboundEvent> {
    let user = msg.from.as_ref()?;
    Some(InboundEvent {
        event_id: format!("m:{}:{}", msg.chat.id.0, msg.id.0),
        user_id: i64::try_from(user.id.0).ok()?,
        message_id: Some(MessageId(msg.id.0.to_string())),
        kind: message_kind(msg),
        received_at: msg.date,
    })
}

/// Converts a button press. Presses without data are ignored.
pub fn callback_event(q: &CallbackQuery) -> Option<InboundEvent> {
    let data = q.data.clone()?;
    Some(InboundEvent {
        event_id: format!("c:{}", q.id.0),
        user_id: i64::try_from(q.from.id.0).ok()?,
        message_id: None,
        kind: InboundKind::Callback {
            callback_id: q.id.0.clone(),
            data,
        },
        received_at: Utc::now(),
    })
}
