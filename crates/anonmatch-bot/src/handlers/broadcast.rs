// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-to-many delivery: department whispers and circles.

use std::str::FromStr;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::{debug, info};

use anonmatch_core::community::Whisper;
use anonmatch_core::types::Department;
use anonmatch_core::{Action, AnonmatchError, OutboundMessage, UserId, UserState};
use anonmatch_matching::validation::{clean_text, ROOM_DESCRIPTION, ROOM_NAME, WHISPER};

use crate::context::BotContext;
use crate::{keyboards, texts};

/// Concurrent sends per fan-out.
const FANOUT_CONCURRENCY: usize = 16;

/// Sends `text` to every recipient; returns how many sends succeeded.
async fn fan_out(ctx: &BotContext, recipients: Vec<UserId>, text: String) -> usize {
    stream::iter(recipients)
        .map(|r| ctx.deliver(OutboundMessage::html(r, text.clone())))
        .buffer_unordered(FANOUT_CONCURRENCY)
        .filter(|sent| futures::future::ready(sent.is_some()))
        .count()
        .await
}

/// `/whisper`
pub async fn whisper(ctx: &BotContext, user: UserId) -> Result<(), AnonmatchError> {
    ctx.ensure_idle(user).await?;
    ctx.say_with(user, texts::WHISPER_PICK, keyboards::whisper_department())
        .await;
    Ok(())
}

pub async fn choose_whisper_department(
    ctx: &BotContext,
    user: UserId,
    code: &str,
) -> Result<(), AnonmatchError> {
    let department = Department::from_str(code)
        .map_err(|_| AnonmatchError::invalid("department", format!("unknown code {code}")))?;
    ctx.ensure_idle(user).await?;
    ctx.set_state(user, UserState::AwaitingWhisper, department.code())
        .await?;
    ctx.say(user, texts::whisper_prompt(&department.to_string()))
        .await;
    Ok(())
}

/// Stores the whisper and delivers it to the target department.
pub async fn submit_whisper(
    ctx: &BotContext,
    user: UserId,
    payload: &str,
    text: &str,
    now: DateTime<Utc>,
) -> Result<(), AnonmatchError> {
    let Ok(department) = Department::from_str(payload) else {
        ctx.set_state(user, UserState::None, "").await?;
        return Err(AnonmatchError::invalid("department", "whisper target lost"));
    };
    let content = clean_text(text, WHISPER)?;
    let recent = ctx
        .community
        .count_whispers_since(user, now - chrono::Duration::hours(1))
        .await?;
    if recent >= i64::from(ctx.config.limits.max_whispers_per_hour) {
        ctx.set_state(user, UserState::None, "").await?;
        return Err(AnonmatchError::RateLimited {
            action: Action::Whisper,
        });
    }

    ctx.community
        .create_whisper(&Whisper {
            sender_id: user,
            target_department: department,
            content: content.clone(),
            created_at: now,
        })
        .await?;
    ctx.set_state(user, UserState::None, "").await?;

    let sender_department = ctx
        .storage()
        .get_user(user)
        .await?
        .and_then(|u| u.department)
        .map(|d| d.to_string());
    let recipients = ctx.storage().department_members(department, user).await?;
    let total = recipients.len();

    let started = Instant::now();
    let delivered = fan_out(
        ctx,
        recipients,
        texts::whisper_delivery(sender_department.as_deref(), &content),
    )
    .await;
    anonmatch_prometheus::record_broadcast_duration(started.elapsed());
    info!(
        user_id = user,
        department = department.code(),
        delivered,
        total,
        "whisper delivered"
    );

    ctx.say(user, texts::whisper_sent(delivered)).await;
    Ok(())
}

/// Lowercased name with every run of other characters collapsed to `-`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// `/circles`
pub async fn circles(ctx: &BotContext, user: UserId) -> Result<(), AnonmatchError> {
    let rooms = ctx.community.list_rooms().await?;
    let text = if rooms.is_empty() {
        texts::NO_CIRCLES
    } else {
        texts::CIRCLES_HEADER
    };
    ctx.say_with(user, text, keyboards::circles(&rooms)).await;
    Ok(())
}

/// Joins the circle `slug`. A private chat is only ended after confirmation
/// (`force`).
pub async fn join_circle(
    ctx: &BotContext,
    user: UserId,
    slug: &str,
    force: bool,
    now: DateTime<Utc>,
) -> Result<(), AnonmatchError> {
    let Some(room) = ctx.community.get_room_by_slug(slug).await? else {
        ctx.say(user, texts::CIRCLE_NOT_FOUND).await;
        return Ok(());
    };

    let mut ended_chat = false;
    match ctx.state(user).await?.state {
        UserState::Searching => {
            ctx.engine.matcher.stop_search(user).await?;
        }
        UserState::InChat | UserState::AwaitingReport if !force => {
            ctx.say_with(
                user,
                texts::JOIN_ENDS_CHAT,
                keyboards::confirm(format!("circle:force:{slug}"), "circle:stay_chat"),
            )
            .await;
            return Ok(());
        }
        UserState::InChat | UserState::AwaitingReport => {
            if let Some(end) = ctx.engine.sessions.end_for_user(user, now).await? {
                ctx.announce_end(&end, user, texts::PARTNER_LEFT).await;
                ended_chat = true;
            }
        }
        _ => {}
    }

    ctx.community.join_room(room.id, user).await?;
    ctx.set_state(user, UserState::InCircle, &room.slug).await?;
    info!(user_id = user, room = %room.slug, "joined circle");
    ctx.say_with(
        user,
        texts::circle_joined(&room.name, ended_chat),
        keyboards::leave_circle(),
    )
    .await;
    Ok(())
}

/// `/leave_circle`
pub async fn leave_circle(ctx: &BotContext, user: UserId) -> Result<(), AnonmatchError> {
    let room = ctx.community.user_room(user).await?;
    ctx.community.leave_rooms(user).await?;
    if ctx.state(user).await?.state == UserState::InCircle {
        ctx.set_state(user, UserState::None, "").await?;
    }
    match room {
        Some(room) => ctx.say(user, texts::circle_left(&room.name)).await,
        None => ctx.say(user, texts::NOT_IN_CIRCLE).await,
    }
    Ok(())
}

/// Asks for the name of a new circle.
pub async fn create_circle(ctx: &BotContext, user: UserId) -> Result<(), AnonmatchError> {
    let snapshot = ctx.state(user).await?;
    if snapshot.state != UserState::InCircle {
        ctx.ensure_idle(user).await?;
    }
    ctx.set_state(user, UserState::AwaitingRoomName, "").await?;
    ctx.say(user, texts::ROOM_NAME_PROMPT).await;
    Ok(())
}

pub async fn submit_room_name(
    ctx: &BotContext,
    user: UserId,
    text: &str,
) -> Result<(), AnonmatchError> {
    let name = clean_text(text, ROOM_NAME)?;
    let slug = slugify(&name);
    if slug.is_empty() {
        return Err(AnonmatchError::invalid(
            "room_name",
            "needs at least one letter or digit",
        ));
    }
    if ctx.community.get_room_by_slug(&slug).await?.is_some() {
        ctx.say(user, texts::CIRCLE_EXISTS).await;
        return Ok(());
    }
    ctx.set_state(user, UserState::AwaitingRoomDesc, &name).await?;
    ctx.say(user, texts::room_desc_prompt(&name)).await;
    Ok(())
}

/// Creates the circle named in `payload` and moves its creator in.
pub async fn submit_room_desc(
    ctx: &BotContext,
    user: UserId,
    payload: &str,
    text: &str,
    now: DateTime<Utc>,
) -> Result<(), AnonmatchError> {
    let description = clean_text(text, ROOM_DESCRIPTION)?;
    let slug = slugify(payload);
    if slug.is_empty() {
        ctx.set_state(user, UserState::None, "").await?;
        return Err(AnonmatchError::invalid("room_name", "circle name lost"));
    }
    let room = match ctx
        .community
        .create_room(&slug, payload, &description, now)
        .await
    {
        Ok(room) => room,
        Err(e) => {
            // Someone took the slug between the two prompts.
            debug!(user_id = user, error = %e, "circle creation failed");
            ctx.set_state(user, UserState::None, "").await?;
            ctx.say(user, texts::CIRCLE_EXISTS).await;
            return Ok(());
        }
    };
    ctx.community.join_room(room.id, user).await?;
    ctx.set_state(user, UserState::InCircle, &room.slug).await?;
    info!(user_id = user, room = %room.slug, "circle created");
    ctx.say_with(user, texts::room_created(&room.name), keyboards::leave_circle())
        .await;
    Ok(())
}

/// Relays circle text to every other member under the sender's handle.
pub async fn circle_message(
    ctx: &BotContext,
    user: UserId,
    slug: &str,
    text: &str,
) -> Result<(), AnonmatchError> {
    let room = ctx.community.user_room(user).await?;
    let Some(room) = room.filter(|r| r.slug == slug) else {
        ctx.set_state(user, UserState::None, "").await?;
        ctx.say(user, texts::NOT_IN_CIRCLE).await;
        return Ok(());
    };
    let text = anonmatch_matching::validation::sanitize_text(text);
    if text.is_empty() {
        return Ok(());
    }
    let sender = ctx
        .storage()
        .get_user(user)
        .await?
        .and_then(|u| u.display_name)
        .unwrap_or_else(|| "Anonim".to_string());
    let members: Vec<UserId> = ctx
        .community
        .room_members(room.id)
        .await?
        .into_iter()
        .filter(|m| *m != user)
        .collect();
    let delivered = fan_out(
        ctx,
        members,
        texts::circle_message(&room.name, &sender, &text),
    )
    .await;
    debug!(user_id = user, room = %room.slug, delivered, "circle message relayed");
    Ok(())
}
