// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Partner search, the private chat relay and in-chat moderation actions.

use chrono::{DateTime, Utc};
use tracing::debug;

use anonmatch_core::{
    AnonmatchError, InboundEvent, MatchOutcome, SearchFilter, SessionId, UserId, UserState,
};
use anonmatch_matching::validation::parse_search_args;

use crate::context::BotContext;
use crate::{keyboards, texts};

/// `/search [filters...]`. Without arguments the filter picker is shown.
pub async fn search(ctx: &BotContext, ev: &InboundEvent, args: &str) -> Result<(), AnonmatchError> {
    let user = ev.user_id;
    if refuse_in_circle(ctx, user).await? {
        return Ok(());
    }
    if args.trim().is_empty() {
        ctx.say_with(user, texts::SEARCH_PICK_FILTER, keyboards::search())
            .await;
        return Ok(());
    }
    let filter = parse_search_args(args, ev.received_at)?;
    start_search(ctx, ev, filter).await
}

/// Runs the matcher and tells both sides about a match.
pub async fn start_search(
    ctx: &BotContext,
    ev: &InboundEvent,
    filter: SearchFilter,
) -> Result<(), AnonmatchError> {
    let user = ev.user_id;
    let outcome = ctx
        .engine
        .matcher
        .search(user, filter, Some(&ev.event_id), &ctx.cancel)
        .await?;
    match outcome {
        MatchOutcome::Matched { partner_id, .. } => {
            let me = ctx.storage().get_user(user).await?;
            let partner = ctx.storage().get_user(partner_id).await?;
            ctx.say_with(
                user,
                texts::partner_found(partner.as_ref()),
                keyboards::chat_actions(),
            )
            .await;
            ctx.say_with(
                partner_id,
                texts::partner_found(me.as_ref()),
                keyboards::chat_actions(),
            )
            .await;
            Ok(())
        }
        MatchOutcome::Enqueued { position } => {
            ctx.say_with(user, texts::enqueued(position), keyboards::cancel_search())
                .await;
            Ok(())
        }
        MatchOutcome::Rejected(rejection) => Err(rejection.into()),
    }
}

/// `/next`: ends the current chat and searches again without a filter.
pub async fn next(ctx: &BotContext, ev: &InboundEvent) -> Result<(), AnonmatchError> {
    let user = ev.user_id;
    if refuse_in_circle(ctx, user).await? {
        return Ok(());
    }
    if let Some(end) = ctx
        .engine
        .sessions
        .end_for_user(user, ev.received_at)
        .await?
    {
        ctx.announce_end(&end, user, texts::PARTNER_LEFT).await;
    }
    // Leaving the pool first turns `/next` while searching into a restart.
    ctx.engine.matcher.stop_search(user).await?;
    ctx.say(user, texts::LOOKING_AGAIN).await;
    start_search(ctx, ev, SearchFilter::any()).await
}

/// `/stop`: ends the chat or leaves the pool. Repeating it is harmless.
pub async fn stop(ctx: &BotContext, ev: &InboundEvent) -> Result<(), AnonmatchError> {
    let user = ev.user_id;
    if let Some(end) = ctx
        .engine
        .sessions
        .end_for_user(user, ev.received_at)
        .await?
    {
        ctx.announce_end(&end, user, texts::PARTNER_LEFT).await;
        ctx.say(user, texts::CHAT_STOPPED).await;
        return Ok(());
    }
    if ctx.engine.matcher.stop_search(user).await? {
        ctx.say(user, texts::SEARCH_STOPPED).await;
    } else {
        ctx.say(user, texts::NO_ACTIVE_CHAT).await;
    }
    Ok(())
}

/// Forwards an in-chat message to the partner.
pub async fn relay(ctx: &BotContext, ev: &InboundEvent) -> Result<(), AnonmatchError> {
    ctx.engine
        .relay
        .forward(ev.user_id, &ev.kind, ev.received_at)
        .await?;
    Ok(())
}

/// `/report`: asks for a reason. The partner and session ride in the payload.
pub async fn report(ctx: &BotContext, user: UserId) -> Result<(), AnonmatchError> {
    let Some(session) = ctx.engine.sessions.get_active_for(user).await? else {
        ctx.say(user, texts::REPORT_NEEDS_CHAT).await;
        return Ok(());
    };
    let Some(partner) = session.partner_of(user) else {
        ctx.say(user, texts::REPORT_NEEDS_CHAT).await;
        return Ok(());
    };
    ctx.set_state(
        user,
        UserState::AwaitingReport,
        &report_payload(partner, session.id),
    )
    .await?;
    ctx.say(user, texts::REPORT_PROMPT).await;
    Ok(())
}

fn report_payload(partner: UserId, session: SessionId) -> String {
    format!("{partner}:{session}")
}

fn parse_report_payload(payload: &str) -> Option<(UserId, Option<SessionId>)> {
    let (partner, session) = match payload.split_once(':') {
        Some((p, s)) => (p, s.parse().ok()),
        None => (payload, None),
    };
    partner.trim().parse().ok().map(|p| (p, session))
}

/// The reason text for a pending report.
pub async fn submit_report(
    ctx: &BotContext,
    user: UserId,
    payload: &str,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<(), AnonmatchError> {
    let Some((reported, session_id)) = parse_report_payload(payload) else {
        resume_after_report(ctx, user).await?;
        return Err(AnonmatchError::invalid("report", "missing report target"));
    };

    let result = match ctx
        .engine
        .abuse
        .report(user, reported, reason, session_id, now)
        .await
    {
        Ok(result) => result,
        // Let the user retype a reason that is too short or too long.
        Err(e @ AnonmatchError::InvalidInput { .. }) => return Err(e),
        Err(e) => {
            resume_after_report(ctx, user).await?;
            return Err(e);
        }
    };

    resume_after_report(ctx, user).await?;
    ctx.say(user, texts::REPORT_SENT).await;

    if result.outcome.banned {
        ctx.say(reported, texts::AUTO_BANNED).await;
        if let Some(end) = &result.ended {
            ctx.announce_end(end, reported, texts::PARTNER_DISCONNECTED)
                .await;
        }
    } else {
        ctx.say(
            reported,
            texts::report_warning(result.outcome.report_count, result.threshold),
        )
        .await;
    }
    Ok(())
}

/// Puts a reporter back in `in_chat` if their session survived, else `none`.
pub async fn resume_after_report(ctx: &BotContext, user: UserId) -> Result<(), AnonmatchError> {
    let state = if ctx.engine.sessions.get_active_for(user).await?.is_some() {
        UserState::InChat
    } else {
        UserState::None
    };
    ctx.set_state(user, state, "").await
}

/// `/block`: blocks the current partner and ends the chat.
pub async fn block(ctx: &BotContext, user: UserId, now: DateTime<Utc>) -> Result<(), AnonmatchError> {
    let Some(partner) = ctx.engine.sessions.partner_of(user).await? else {
        ctx.say(user, texts::BLOCK_NEEDS_CHAT).await;
        return Ok(());
    };
    let ended = ctx.engine.abuse.block(user, partner, now).await?;
    ctx.say(user, texts::BLOCKED).await;
    if let Some(end) = ended {
        ctx.announce_end(&end, user, texts::PARTNER_DISCONNECTED)
            .await;
    }
    Ok(())
}

/// Circles and private chats exclude each other; offers to leave the circle.
async fn refuse_in_circle(ctx: &BotContext, user: UserId) -> Result<bool, AnonmatchError> {
    let snapshot = ctx.state(user).await?;
    if snapshot.state != UserState::InCircle {
        return Ok(false);
    }
    let room = ctx.community.user_room(user).await?;
    let Some(room) = room else {
        debug!(user_id = user, "in_circle without a room, resetting state");
        ctx.set_state(user, UserState::None, "").await?;
        return Ok(false);
    };
    ctx.say_with(
        user,
        texts::leave_circle_first(&room.name),
        keyboards::confirm("circle:leave_next", "circle:stay"),
    )
    .await;
    Ok(true)
}
