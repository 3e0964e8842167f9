// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Confessions, replies, reactions and polls.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use anonmatch_core::{Action, AnonmatchError, UserId, UserState};
use anonmatch_matching::achievements::{POPULAR_AUTHOR, POPULAR_AUTHOR_REACTIONS};
use anonmatch_matching::validation::{
    clean_text, CONFESSION, POLL_OPTION, POLL_QUESTION, REPLY,
};

use crate::context::BotContext;
use crate::{keyboards, texts};

const LATEST_CONFESSIONS: usize = 10;
const LATEST_POLLS: usize = 5;
const MIN_POLL_OPTIONS: usize = 2;
const MAX_POLL_OPTIONS: usize = 10;
const MAX_EMOJI_CHARS: usize = 8;
const REPLY_KARMA: i64 = 1;
const POLL_KARMA: i64 = 3;

/// `/confess`
pub async fn confess(ctx: &BotContext, user: UserId) -> Result<(), AnonmatchError> {
    ctx.ensure_idle(user).await?;
    ctx.set_state(user, UserState::AwaitingConfession, "").await?;
    ctx.say(user, texts::CONFESS_PROMPT).await;
    Ok(())
}

pub async fn submit_confession(
    ctx: &BotContext,
    user: UserId,
    text: &str,
    now: DateTime<Utc>,
) -> Result<(), AnonmatchError> {
    let content = clean_text(text, CONFESSION)?;
    let recent = ctx
        .community
        .count_confessions_since(user, now - chrono::Duration::hours(1))
        .await?;
    if recent >= i64::from(ctx.config.limits.max_confessions_per_hour) {
        ctx.set_state(user, UserState::None, "").await?;
        return Err(AnonmatchError::RateLimited {
            action: Action::Confession,
        });
    }
    let department = ctx
        .storage()
        .get_user(user)
        .await?
        .and_then(|u| u.department);
    let confession = ctx
        .community
        .create_confession(user, &content, department, now)
        .await?;
    ctx.set_state(user, UserState::None, "").await?;
    info!(user_id = user, confession_id = confession.id, "confession posted");
    ctx.say(user, texts::confession_sent(confession.id)).await;
    Ok(())
}

/// `/confessions`: the latest confessions, each with reaction buttons.
pub async fn list_confessions(ctx: &BotContext, user: UserId) -> Result<(), AnonmatchError> {
    let latest = ctx.community.latest_confessions(LATEST_CONFESSIONS).await?;
    if latest.is_empty() {
        ctx.say(user, texts::NO_CONFESSIONS).await;
        return Ok(());
    }
    for confession in latest {
        let counts = ctx.community.reaction_counts(confession.id).await?;
        ctx.say_with(
            user,
            texts::confession_card(&confession),
            keyboards::reactions(confession.id, &counts),
        )
        .await;
    }
    Ok(())
}

/// `/react <id> <emoji>`
pub async fn react_command(
    ctx: &BotContext,
    user: UserId,
    args: &str,
    now: DateTime<Utc>,
) -> Result<(), AnonmatchError> {
    let mut parts = args.split_whitespace();
    let id = parts.next().and_then(|s| s.parse::<i64>().ok());
    let emoji = parts.next();
    match (id, emoji) {
        (Some(id), Some(emoji)) if is_emoji_token(emoji) => react(ctx, user, id, emoji, now).await,
        _ => {
            ctx.say(user, texts::REACT_USAGE).await;
            Ok(())
        }
    }
}

fn is_emoji_token(token: &str) -> bool {
    let n = token.chars().count();
    n > 0 && n <= MAX_EMOJI_CHARS && !token.chars().any(char::is_alphanumeric)
}

/// Upserts the user's reaction; the author earns the popularity badge once
/// a confession collects enough reactions.
pub async fn react(
    ctx: &BotContext,
    user: UserId,
    confession_id: i64,
    emoji: &str,
    now: DateTime<Utc>,
) -> Result<(), AnonmatchError> {
    let Some(confession) = ctx.community.get_confession(confession_id).await? else {
        ctx.say(user, texts::CONFESSION_NOT_FOUND).await;
        return Ok(());
    };
    ctx.community
        .react_to_confession(confession_id, user, emoji)
        .await?;
    let counts = ctx.community.reaction_counts(confession_id).await?;
    let total: i64 = counts.iter().map(|(_, n)| n).sum();

    if total >= POPULAR_AUTHOR_REACTIONS && confession.author_id != user {
        match ctx
            .storage()
            .award_achievement(confession.author_id, POPULAR_AUTHOR, now)
            .await
        {
            Ok(true) => {
                ctx.notify_achievements(&[(confession.author_id, POPULAR_AUTHOR)])
                    .await
            }
            Ok(false) => {}
            Err(e) => warn!(user_id = confession.author_id, error = %e, "failed to award achievement"),
        }
    }
    ctx.say_with(
        user,
        texts::reacted(emoji, confession_id),
        keyboards::reactions(confession_id, &counts),
    )
    .await;
    Ok(())
}

/// `/reply <id> <text>`: the author gets a karma point and a notice.
pub async fn reply(
    ctx: &BotContext,
    user: UserId,
    args: &str,
    now: DateTime<Utc>,
) -> Result<(), AnonmatchError> {
    let parsed = args
        .trim()
        .split_once(char::is_whitespace)
        .and_then(|(id, text)| id.parse::<i64>().ok().map(|id| (id, text)));
    let Some((confession_id, text)) = parsed else {
        ctx.say(user, texts::REPLY_USAGE).await;
        return Ok(());
    };
    let content = clean_text(text, REPLY)?;

    let recent = ctx
        .community
        .count_replies_since(user, now - chrono::Duration::hours(1))
        .await?;
    if recent >= i64::from(ctx.config.limits.max_replies_per_hour) {
        return Err(AnonmatchError::RateLimited {
            action: Action::Reply,
        });
    }
    let Some(confession) = ctx.community.get_confession(confession_id).await? else {
        ctx.say(user, texts::CONFESSION_NOT_FOUND).await;
        return Ok(());
    };
    ctx.community
        .create_reply(confession_id, user, &content, now)
        .await?;

    if confession.author_id != user {
        ctx.add_karma(confession.author_id, REPLY_KARMA, now).await;
        ctx.say(
            confession.author_id,
            format!(
                "💬 Confession #{confession_id} kamu mendapat balasan baru!\n\
                 Lihat dengan /view_replies {confession_id}"
            ),
        )
        .await;
    }
    ctx.say(user, texts::replied(confession_id)).await;
    Ok(())
}

/// `/view_replies <id>`
pub async fn view_replies(ctx: &BotContext, user: UserId, args: &str) -> Result<(), AnonmatchError> {
    let Ok(confession_id) = args.trim().parse::<i64>() else {
        ctx.say(user, texts::VIEW_REPLIES_USAGE).await;
        return Ok(());
    };
    if ctx.community.get_confession(confession_id).await?.is_none() {
        ctx.say(user, texts::CONFESSION_NOT_FOUND).await;
        return Ok(());
    }
    let replies = ctx.community.list_replies(confession_id).await?;
    ctx.say(user, texts::replies(confession_id, &replies)).await;
    Ok(())
}

/// Splits `question | option | option ...` and validates every part.
fn parse_poll(args: &str) -> Result<(String, Vec<String>), AnonmatchError> {
    let mut parts = args.split('|').map(str::trim);
    let question = parts.next().unwrap_or_default();
    let options: Vec<&str> = parts.filter(|p| !p.is_empty()).collect();
    if question.is_empty() || !(MIN_POLL_OPTIONS..=MAX_POLL_OPTIONS).contains(&options.len()) {
        return Err(AnonmatchError::invalid(
            "poll",
            "needs a question and 2 to 10 options",
        ));
    }
    let question = clean_text(question, POLL_QUESTION)?;
    let options = options
        .into_iter()
        .map(|o| clean_text(o, POLL_OPTION))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((question, options))
}

/// `/poll q | a | b`
pub async fn poll(
    ctx: &BotContext,
    user: UserId,
    args: &str,
    now: DateTime<Utc>,
) -> Result<(), AnonmatchError> {
    if args.trim().is_empty() {
        ctx.say(user, texts::POLL_USAGE).await;
        return Ok(());
    }
    let (question, options) = parse_poll(args)?;
    let poll = ctx
        .community
        .create_poll(user, &question, &options, now)
        .await?;
    info!(user_id = user, poll_id = poll.id, options = options.len(), "poll created");
    ctx.add_karma(user, POLL_KARMA, now).await;
    ctx.say_with(user, texts::poll_created(poll.id), keyboards::poll_vote(&poll))
        .await;
    Ok(())
}

/// `/polls`
pub async fn list_polls(ctx: &BotContext, user: UserId) -> Result<(), AnonmatchError> {
    let polls = ctx.community.latest_polls(LATEST_POLLS).await?;
    if polls.is_empty() {
        ctx.say(user, texts::NO_POLLS).await;
        return Ok(());
    }
    for poll in polls {
        ctx.say_with(user, texts::poll_card(&poll), keyboards::poll_vote(&poll))
            .await;
    }
    Ok(())
}

/// `/vote_poll <id>`: shows the options as buttons.
pub async fn show_poll(ctx: &BotContext, user: UserId, args: &str) -> Result<(), AnonmatchError> {
    let Ok(poll_id) = args.trim().parse::<i64>() else {
        ctx.say(user, texts::VOTE_POLL_USAGE).await;
        return Ok(());
    };
    match ctx.community.get_poll(poll_id).await? {
        Some(poll) => {
            ctx.say_with(user, texts::poll_card(&poll), keyboards::poll_vote(&poll))
                .await
        }
        None => ctx.say(user, texts::POLL_NOT_FOUND).await,
    }
    Ok(())
}

/// A vote button. One vote per user and poll.
pub async fn vote(
    ctx: &BotContext,
    user: UserId,
    poll_id: i64,
    option_id: i64,
) -> Result<(), AnonmatchError> {
    let valid = ctx
        .community
        .get_poll(poll_id)
        .await?
        .is_some_and(|p| p.options.iter().any(|o| o.id == option_id));
    if !valid {
        ctx.say(user, texts::POLL_NOT_FOUND).await;
        return Ok(());
    }
    if !ctx.community.vote_poll(poll_id, option_id, user).await? {
        ctx.say(user, texts::ALREADY_VOTED).await;
        return Ok(());
    }
    ctx.say(user, texts::VOTE_RECORDED).await;
    if let Some(poll) = ctx.community.get_poll(poll_id).await? {
        ctx.say_with(user, texts::poll_card(&poll), keyboards::poll_vote(&poll))
            .await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_parsing_needs_two_options() {
        let (q, opts) = parse_poll("Makan siang di mana? | Kantin | Warteg").unwrap();
        assert_eq!(q, "Makan siang di mana?");
        assert_eq!(opts, vec!["Kantin", "Warteg"]);

        let err = parse_poll("Makan siang di mana? | Kantin").unwrap_err();
        assert!(matches!(err, AnonmatchError::InvalidInput { ref field, .. } if field == "poll"));

        let many = format!("Pilih satu dong | {}", vec!["x"; 11].join(" | "));
        assert!(parse_poll(&many).is_err());
    }

    #[test]
    fn poll_parsing_validates_lengths() {
        let err = parse_poll("Hm? | a | b").unwrap_err();
        assert!(matches!(err, AnonmatchError::InvalidInput { ref field, .. } if field == "poll_question"));
        let long = "o".repeat(101);
        let err = parse_poll(&format!("Pertanyaan panjang | a | {long}")).unwrap_err();
        assert!(matches!(err, AnonmatchError::InvalidInput { ref field, .. } if field == "poll_option"));
    }

    #[test]
    fn emoji_tokens_reject_words() {
        assert!(is_emoji_token("🔥"));
        assert!(is_emoji_token("❤️"));
        assert!(!is_emoji_token("fire"));
        assert!(!is_emoji_token(""));
    }
}
