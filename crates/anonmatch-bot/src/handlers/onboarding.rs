// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registration, email verification, profile steps and profile views.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use tracing::debug;

use anonmatch_core::types::{Department, Gender};
use anonmatch_core::{AnonmatchError, UserId, UserState};
use anonmatch_matching::onboarding::EDIT_PAYLOAD;
use anonmatch_matching::validation::normalize_email;

use crate::context::BotContext;
use crate::{keyboards, texts};

/// `/start`: registers the user and resumes wherever onboarding stopped.
pub async fn start(ctx: &BotContext, user: UserId) -> Result<(), AnonmatchError> {
    let account = ctx.engine.onboarding.register(user).await?;
    if account.banned {
        return Err(AnonmatchError::Banned);
    }
    if !account.verified && !ctx.is_maintenance(user) {
        ctx.say(user, texts::WELCOME).await;
        ctx.engine.onboarding.begin_registration(user).await?;
        ctx.say(user, texts::ASK_EMAIL).await;
        return Ok(());
    }
    if !account.is_profile_complete() {
        ctx.set_state(user, UserState::AwaitingGender, "").await?;
        ctx.say_with(user, texts::VERIFIED, keyboards::gender()).await;
        return Ok(());
    }
    main_menu(ctx, user).await;
    Ok(())
}

pub async fn main_menu(ctx: &BotContext, user: UserId) {
    ctx.say_with(user, texts::MAIN_MENU, keyboards::main_menu())
        .await;
}

/// `/regist`: asks for the campus email unless already verified.
pub async fn regist(ctx: &BotContext, user: UserId) -> Result<(), AnonmatchError> {
    let account = ctx.engine.onboarding.register(user).await?;
    if account.banned {
        return Err(AnonmatchError::Banned);
    }
    if account.verified {
        ctx.say(user, texts::ALREADY_VERIFIED).await;
        return Ok(());
    }
    ctx.engine.onboarding.begin_registration(user).await?;
    ctx.say(user, texts::ASK_EMAIL).await;
    Ok(())
}

pub async fn submit_email(
    ctx: &BotContext,
    user: UserId,
    text: &str,
    now: DateTime<Utc>,
) -> Result<(), AnonmatchError> {
    let email = normalize_email(text)?;
    ctx.engine
        .onboarding
        .initiate_verification(user, &email, now)
        .await?;
    ctx.say(
        user,
        texts::otp_sent(&email, ctx.config.verification.otp_expiry_minutes),
    )
    .await;
    Ok(())
}

pub async fn submit_otp(
    ctx: &BotContext,
    user: UserId,
    text: &str,
    now: DateTime<Utc>,
) -> Result<(), AnonmatchError> {
    if ctx.engine.onboarding.verify_otp(user, text, now).await? {
        ctx.say_with(user, texts::VERIFIED, keyboards::gender()).await;
    } else {
        ctx.say(user, texts::OTP_INVALID).await;
    }
    Ok(())
}

/// Profile steps also accept typed answers; anything unreadable re-shows the keyboard.
pub async fn typed_answer(
    ctx: &BotContext,
    user: UserId,
    state: UserState,
    text: &str,
    now: DateTime<Utc>,
) -> Result<(), AnonmatchError> {
    let text = text.trim();
    match state {
        UserState::AwaitingGender => match Gender::from_str(text) {
            Ok(g) => choose_gender(ctx, user, g).await,
            Err(_) => {
                ctx.say_with(user, texts::VERIFIED, keyboards::gender()).await;
                Ok(())
            }
        },
        UserState::AwaitingYear => match text.parse::<i32>() {
            Ok(year) => choose_year(ctx, user, year, now).await,
            Err(_) => {
                ctx.say_with(user, texts::ASK_YEAR, keyboards::entry_year(now))
                    .await;
                Ok(())
            }
        },
        UserState::AwaitingDepartment => match Department::from_str(text) {
            Ok(d) => choose_department(ctx, user, d).await,
            Err(_) => {
                ctx.say_with(user, texts::ASK_DEPARTMENT, keyboards::department())
                    .await;
                Ok(())
            }
        },
        _ => Ok(()),
    }
}

pub async fn choose_gender(
    ctx: &BotContext,
    user: UserId,
    gender: Gender,
) -> Result<(), AnonmatchError> {
    if !in_step(ctx, user, UserState::AwaitingGender).await? {
        return Ok(());
    }
    ctx.engine.onboarding.set_gender(user, gender).await?;
    ctx.say_with(user, texts::ASK_YEAR, keyboards::entry_year(Utc::now()))
        .await;
    Ok(())
}

pub async fn choose_year(
    ctx: &BotContext,
    user: UserId,
    year: i32,
    now: DateTime<Utc>,
) -> Result<(), AnonmatchError> {
    if !in_step(ctx, user, UserState::AwaitingYear).await? {
        return Ok(());
    }
    ctx.engine.onboarding.set_entry_year(user, year, now).await?;
    ctx.say_with(user, texts::ASK_DEPARTMENT, keyboards::department())
        .await;
    Ok(())
}

pub async fn choose_department(
    ctx: &BotContext,
    user: UserId,
    department: Department,
) -> Result<(), AnonmatchError> {
    if !in_step(ctx, user, UserState::AwaitingDepartment).await? {
        return Ok(());
    }
    match ctx.engine.onboarding.set_department(user, department).await? {
        Some(name) => {
            ctx.say_with(user, texts::profile_completed(&name), keyboards::main_menu())
                .await
        }
        None => {
            ctx.say_with(user, texts::PROFILE_UPDATED, keyboards::main_menu())
                .await
        }
    }
    Ok(())
}

/// Buttons from an old prompt are ignored once the user moved on.
async fn in_step(ctx: &BotContext, user: UserId, expected: UserState) -> Result<bool, AnonmatchError> {
    let current = ctx.state(user).await?.state;
    if current != expected {
        debug!(user_id = user, state = %current, expected = %expected, "stale profile button");
    }
    Ok(current == expected)
}

/// `/edit`: walks the profile steps again.
pub async fn edit(ctx: &BotContext, user: UserId) -> Result<(), AnonmatchError> {
    ctx.ensure_idle(user).await?;
    ctx.engine.onboarding.begin_edit(user).await?;
    ctx.say_with(user, texts::EDIT_PROFILE, keyboards::gender())
        .await;
    Ok(())
}

pub async fn profile(ctx: &BotContext, user: UserId) -> Result<(), AnonmatchError> {
    let Some(account) = ctx.storage().get_user(user).await? else {
        ctx.say(user, texts::NOT_REGISTERED).await;
        return Ok(());
    };
    let earned = ctx.storage().list_achievements(user).await?;
    ctx.say_with(user, texts::profile(&account, &earned), keyboards::back_to_menu())
        .await;
    Ok(())
}

pub async fn stats(ctx: &BotContext, user: UserId) -> Result<(), AnonmatchError> {
    let Some(account) = ctx.storage().get_user(user).await? else {
        ctx.say(user, texts::NOT_REGISTERED).await;
        return Ok(());
    };
    let confessions = ctx.community.count_confessions_by(user).await?;
    let users = ctx.storage().count_users().await?;
    let active = ctx.storage().count_active_sessions().await?;
    ctx.say_with(
        user,
        texts::stats(&account, confessions, users, active),
        keyboards::back_to_menu(),
    )
    .await;
    Ok(())
}

/// `/cancel`: abandons whatever prompt the user is in.
pub async fn cancel(ctx: &BotContext, user: UserId) -> Result<(), AnonmatchError> {
    let snapshot = ctx.state(user).await?;
    let what = match snapshot.state {
        UserState::AwaitingEmail | UserState::AwaitingOtp => "Verifikasi email",
        UserState::AwaitingGender | UserState::AwaitingYear | UserState::AwaitingDepartment => {
            if snapshot.payload == EDIT_PAYLOAD {
                "Edit profil"
            } else {
                "Pengisian profil"
            }
        }
        UserState::AwaitingConfession => "Confession",
        UserState::AwaitingWhisper => "Whisper",
        UserState::AwaitingRoomName | UserState::AwaitingRoomDesc => "Pembuatan circle",
        UserState::AwaitingReport => {
            crate::handlers::chat::resume_after_report(ctx, user).await?;
            ctx.say(user, texts::cancelled("Laporan")).await;
            return Ok(());
        }
        UserState::Searching => {
            ctx.engine.matcher.stop_search(user).await?;
            ctx.say(user, texts::SEARCH_STOPPED).await;
            return Ok(());
        }
        UserState::None | UserState::InChat | UserState::InCircle => {
            ctx.say(user, texts::NOTHING_TO_CANCEL).await;
            return Ok(());
        }
    };
    ctx.set_state(user, UserState::None, "").await?;
    ctx.say(user, texts::cancelled(what)).await;
    Ok(())
}
