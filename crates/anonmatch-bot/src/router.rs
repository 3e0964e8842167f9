// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Routes one inbound event to its handler.
//!
//! Commands dispatch by name, callbacks by their `prefix:` and free text by
//! the sender's conversational state. Handler errors are turned into a
//! short notice for the user and an `errors_total` sample.

use std::str::FromStr;

use tracing::{debug, error, warn};

use anonmatch_core::types::{Department, Gender};
use anonmatch_core::{AnonmatchError, InboundEvent, InboundKind, SearchFilter, UserId, UserState};
use anonmatch_matching::validation::{is_valid_callback_data, parse_search_args};

use crate::context::BotContext;
use crate::handlers::{broadcast, chat, confessions, onboarding};
use crate::{keyboards, texts};

/// Every command the bot answers, in help-menu order.
pub const COMMANDS: [&str; 24] = [
    "start",
    "regist",
    "search",
    "next",
    "stop",
    "confess",
    "confessions",
    "react",
    "reply",
    "view_replies",
    "poll",
    "polls",
    "vote_poll",
    "whisper",
    "circles",
    "leave_circle",
    "profile",
    "stats",
    "edit",
    "about",
    "help",
    "cancel",
    "report",
    "block",
];

/// Commands available before verification.
const UNGATED: [&str; 5] = ["start", "help", "about", "cancel", "regist"];

pub struct Router {
    ctx: BotContext,
}

impl Router {
    pub fn new(ctx: BotContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &BotContext {
        &self.ctx
    }

    /// Handles `event` to completion. Never fails; errors are reported to the user.
    pub async fn handle(&self, event: InboundEvent) {
        let user = event.user_id;
        debug!(user_id = user, kind = event.kind.label(), "routing event");
        let result = self.route(&event).await;

        if let InboundKind::Callback { callback_id, .. } = &event.kind {
            if let Err(e) = self
                .ctx
                .engine
                .channel
                .answer_callback(callback_id, None)
                .await
            {
                debug!(user_id = user, error = %e, "failed to answer callback");
            }
        }
        if let Err(e) = result {
            self.report_error(user, &e).await;
        }
    }

    async fn report_error(&self, user: UserId, err: &AnonmatchError) {
        anonmatch_prometheus::record_error(err.kind());
        match err {
            AnonmatchError::Storage { .. }
            | AnonmatchError::Internal(_)
            | AnonmatchError::Config(_) => {
                error!(user_id = user, error = %err, "handler failed")
            }
            e if e.is_transient() => warn!(user_id = user, error = %e, "handler failed"),
            e => debug!(user_id = user, error = %e, "request refused"),
        }
        if let Some(text) = texts::user_message(err) {
            self.ctx.say(user, text).await;
        }
    }

    async fn route(&self, ev: &InboundEvent) -> Result<(), AnonmatchError> {
        match &ev.kind {
            InboundKind::Command { name, args } => self.command(ev, name, args).await,
            InboundKind::Callback { data, .. } => self.callback(ev, data).await,
            InboundKind::Text(text) => self.text(ev, text).await,
            InboundKind::Unsupported => {
                self.ctx.say(ev.user_id, texts::UNSUPPORTED).await;
                Ok(())
            }
            _ => self.media(ev).await,
        }
    }

    /// Verified and not banned. The maintenance account always passes.
    async fn gate(&self, user: UserId) -> Result<(), AnonmatchError> {
        if self.ctx.is_maintenance(user) {
            self.ctx.engine.onboarding.register(user).await?;
            return Ok(());
        }
        match self.ctx.storage().get_user(user).await? {
            None => Err(AnonmatchError::NotVerified),
            Some(u) if u.banned => Err(AnonmatchError::Banned),
            Some(u) if !u.verified => Err(AnonmatchError::NotVerified),
            Some(_) => Ok(()),
        }
    }

    async fn command(&self, ev: &InboundEvent, name: &str, args: &str) -> Result<(), AnonmatchError> {
        let ctx = &self.ctx;
        let user = ev.user_id;
        let now = ev.received_at;
        let name = name.to_ascii_lowercase();

        if !COMMANDS.contains(&name.as_str()) {
            ctx.say(user, texts::UNKNOWN_COMMAND).await;
            return Ok(());
        }
        if !UNGATED.contains(&name.as_str()) {
            self.gate(user).await?;
        }

        match name.as_str() {
            "start" => onboarding::start(ctx, user).await,
            "regist" => onboarding::regist(ctx, user).await,
            "search" => chat::search(ctx, ev, args).await,
            "next" => chat::next(ctx, ev).await,
            "stop" => chat::stop(ctx, ev).await,
            "confess" => confessions::confess(ctx, user).await,
            "confessions" => confessions::list_confessions(ctx, user).await,
            "react" => confessions::react_command(ctx, user, args, now).await,
            "reply" => confessions::reply(ctx, user, args, now).await,
            "view_replies" => confessions::view_replies(ctx, user, args).await,
            "poll" => confessions::poll(ctx, user, args, now).await,
            "polls" => confessions::list_polls(ctx, user).await,
            "vote_poll" => confessions::show_poll(ctx, user, args).await,
            "whisper" => broadcast::whisper(ctx, user).await,
            "circles" => broadcast::circles(ctx, user).await,
            "leave_circle" => broadcast::leave_circle(ctx, user).await,
            "profile" => onboarding::profile(ctx, user).await,
            "stats" => onboarding::stats(ctx, user).await,
            "edit" => onboarding::edit(ctx, user).await,
            "about" => {
                ctx.say(user, texts::ABOUT).await;
                Ok(())
            }
            "help" => {
                ctx.say(user, texts::HELP).await;
                Ok(())
            }
            "cancel" => onboarding::cancel(ctx, user).await,
            "report" => chat::report(ctx, user).await,
            "block" => chat::block(ctx, user, now).await,
            _ => Ok(()),
        }
    }

    async fn text(&self, ev: &InboundEvent, text: &str) -> Result<(), AnonmatchError> {
        let ctx = &self.ctx;
        let user = ev.user_id;
        let now = ev.received_at;
        let snapshot = ctx.state(user).await?;

        if !matches!(
            snapshot.state,
            UserState::AwaitingEmail | UserState::AwaitingOtp | UserState::None
        ) {
            self.gate(user).await?;
        }

        match snapshot.state {
            UserState::AwaitingEmail => onboarding::submit_email(ctx, user, text, now).await,
            UserState::AwaitingOtp => onboarding::submit_otp(ctx, user, text, now).await,
            UserState::AwaitingGender | UserState::AwaitingYear | UserState::AwaitingDepartment => {
                onboarding::typed_answer(ctx, user, snapshot.state, text, now).await
            }
            UserState::InChat => chat::relay(ctx, ev).await,
            UserState::Searching => {
                ctx.say_with(user, texts::ALREADY_SEARCHING, keyboards::cancel_search())
                    .await;
                Ok(())
            }
            UserState::AwaitingConfession => {
                confessions::submit_confession(ctx, user, text, now).await
            }
            UserState::AwaitingReport => {
                chat::submit_report(ctx, user, &snapshot.payload, text, now).await
            }
            UserState::AwaitingWhisper => {
                broadcast::submit_whisper(ctx, user, &snapshot.payload, text, now).await
            }
            UserState::InCircle => {
                broadcast::circle_message(ctx, user, &snapshot.payload, text).await
            }
            UserState::AwaitingRoomName => broadcast::submit_room_name(ctx, user, text).await,
            UserState::AwaitingRoomDesc => {
                broadcast::submit_room_desc(ctx, user, &snapshot.payload, text, now).await
            }
            UserState::None => {
                ctx.say(user, texts::FALLBACK).await;
                Ok(())
            }
        }
    }

    /// Media is only meaningful inside a private chat.
    async fn media(&self, ev: &InboundEvent) -> Result<(), AnonmatchError> {
        let user = ev.user_id;
        if self.ctx.state(user).await?.state != UserState::InChat {
            self.ctx.say(user, texts::UNSUPPORTED).await;
            return Ok(());
        }
        self.gate(user).await?;
        chat::relay(&self.ctx, ev).await
    }

    async fn callback(&self, ev: &InboundEvent, data: &str) -> Result<(), AnonmatchError> {
        let ctx = &self.ctx;
        let user = ev.user_id;
        let now = ev.received_at;

        if !is_valid_callback_data(data) {
            warn!(user_id = user, len = data.len(), "invalid callback payload");
            return Ok(());
        }
        self.gate(user).await?;

        let (prefix, value) = data.split_once(':').unwrap_or((data, ""));
        match prefix {
            "menu" => self.menu(ev, value).await,
            "gender" => match Gender::from_str(value) {
                Ok(g) => onboarding::choose_gender(ctx, user, g).await,
                Err(_) => Err(AnonmatchError::invalid("gender", value)),
            },
            "year" => match value.parse::<i32>() {
                Ok(y) => onboarding::choose_year(ctx, user, y, now).await,
                Err(_) => Err(AnonmatchError::invalid("entry_year", value)),
            },
            "dept" => match Department::from_str(value) {
                Ok(d) => onboarding::choose_department(ctx, user, d).await,
                Err(_) => Err(AnonmatchError::invalid("department", value)),
            },
            "search" => self.search_callback(ev, value).await,
            "chat" => match value {
                "next" => chat::next(ctx, ev).await,
                "stop" => chat::stop(ctx, ev).await,
                "report" => chat::report(ctx, user).await,
                "block" => chat::block(ctx, user, now).await,
                _ => unknown(user, data),
            },
            "react" => {
                let parsed = value
                    .split_once(':')
                    .and_then(|(id, emoji)| id.parse::<i64>().ok().map(|id| (id, emoji)));
                match parsed {
                    Some((id, emoji)) => confessions::react(ctx, user, id, emoji, now).await,
                    None => unknown(user, data),
                }
            }
            "vote" => {
                let parsed = value.split_once(':').and_then(|(p, o)| {
                    Some((p.parse::<i64>().ok()?, o.parse::<i64>().ok()?))
                });
                match parsed {
                    Some((poll, option)) => confessions::vote(ctx, user, poll, option).await,
                    None => unknown(user, data),
                }
            }
            "whisper" => broadcast::choose_whisper_department(ctx, user, value).await,
            "circle" => self.circle_callback(ev, value).await,
            _ => unknown(user, data),
        }
    }

    async fn menu(&self, ev: &InboundEvent, item: &str) -> Result<(), AnonmatchError> {
        let ctx = &self.ctx;
        let user = ev.user_id;
        match item {
            "main" => {
                onboarding::main_menu(ctx, user).await;
                Ok(())
            }
            "search" => chat::search(ctx, ev, "").await,
            "confess" => confessions::confess(ctx, user).await,
            "whisper" => broadcast::whisper(ctx, user).await,
            "confessions" => confessions::list_confessions(ctx, user).await,
            "polls" => confessions::list_polls(ctx, user).await,
            "circles" => broadcast::circles(ctx, user).await,
            "profile" => onboarding::profile(ctx, user).await,
            "stats" => onboarding::stats(ctx, user).await,
            "edit" => onboarding::edit(ctx, user).await,
            "help" => {
                ctx.say(user, texts::HELP).await;
                Ok(())
            }
            _ => unknown(user, item),
        }
    }

    async fn search_callback(&self, ev: &InboundEvent, value: &str) -> Result<(), AnonmatchError> {
        let ctx = &self.ctx;
        let user = ev.user_id;
        let filter = match value.split_once(':') {
            None => match value {
                "any" => SearchFilter::any(),
                "by_gender" => {
                    ctx.say_with(user, texts::SEARCH_PICK_GENDER, keyboards::search_gender())
                        .await;
                    return Ok(());
                }
                "by_dept" => {
                    ctx.say_with(
                        user,
                        texts::SEARCH_PICK_DEPARTMENT,
                        keyboards::search_department(),
                    )
                    .await;
                    return Ok(());
                }
                "by_year" => {
                    ctx.say_with(
                        user,
                        texts::SEARCH_PICK_YEAR,
                        keyboards::search_year(ev.received_at),
                    )
                    .await;
                    return Ok(());
                }
                "cancel" => {
                    if ctx.engine.matcher.stop_search(user).await? {
                        ctx.say(user, texts::SEARCH_STOPPED).await;
                    }
                    return Ok(());
                }
                _ => return unknown(user, value),
            },
            Some(("gender", g)) => SearchFilter {
                gender: Some(
                    Gender::from_str(g).map_err(|_| AnonmatchError::invalid("gender", g))?,
                ),
                ..SearchFilter::any()
            },
            Some(("dept", d)) => SearchFilter {
                department: Some(
                    Department::from_str(d).map_err(|_| AnonmatchError::invalid("department", d))?,
                ),
                ..SearchFilter::any()
            },
            Some(("year", y)) => parse_search_args(y, ev.received_at)?,
            Some(_) => return unknown(user, value),
        };
        // Same refusal as the command while inside a circle.
        if ctx.state(user).await?.state == UserState::InCircle {
            return chat::search(ctx, ev, "").await;
        }
        chat::start_search(ctx, ev, filter).await
    }

    async fn circle_callback(&self, ev: &InboundEvent, value: &str) -> Result<(), AnonmatchError> {
        let ctx = &self.ctx;
        let user = ev.user_id;
        let now = ev.received_at;
        match value.split_once(':') {
            Some(("join", slug)) => broadcast::join_circle(ctx, user, slug, false, now).await,
            Some(("force", slug)) => broadcast::join_circle(ctx, user, slug, true, now).await,
            Some(_) => unknown(user, value),
            None => match value {
                "create" => broadcast::create_circle(ctx, user).await,
                "leave" => broadcast::leave_circle(ctx, user).await,
                "leave_next" => {
                    broadcast::leave_circle(ctx, user).await?;
                    chat::start_search(ctx, ev, SearchFilter::any()).await
                }
                "stay" => {
                    ctx.say(user, texts::STAY_IN_CIRCLE).await;
                    Ok(())
                }
                "stay_chat" => {
                    ctx.say(user, texts::STAY_IN_CHAT).await;
                    Ok(())
                }
                _ => unknown(user, value),
            },
        }
    }
}

fn unknown(user: UserId, data: &str) -> Result<(), AnonmatchError> {
    debug!(user_id = user, data, "unknown callback");
    Ok(())
}
