// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared handler context.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use anonmatch_config::model::AnonmatchConfig;
use anonmatch_core::types::{Keyboard, StateSnapshot};
use anonmatch_core::{
    AnonmatchError, CommunityStore, MessageId, OutboundMessage, StorageAdapter, UserId, UserState,
};
use anonmatch_matching::achievements::{KARMA_MASTER, KARMA_MASTER_THRESHOLD};
use anonmatch_matching::{MatchingEngine, SessionEnd};

use crate::texts;

/// Everything a handler needs. Cheap to clone.
#[derive(Clone)]
pub struct BotContext {
    pub engine: MatchingEngine,
    pub community: Arc<dyn CommunityStore + Send + Sync>,
    pub config: Arc<AnonmatchConfig>,
    /// Fired on shutdown; searches started after it return early.
    pub cancel: CancellationToken,
}

impl BotContext {
    pub fn new(
        engine: MatchingEngine,
        community: Arc<dyn CommunityStore + Send + Sync>,
        config: Arc<AnonmatchConfig>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            engine,
            community,
            config,
            cancel,
        }
    }

    pub fn storage(&self) -> &Arc<dyn StorageAdapter + Send + Sync> {
        &self.engine.storage
    }

    /// Sends `msg`. A failed send is logged and reported as `None`; the
    /// recipient may have blocked the bot.
    pub async fn deliver(&self, msg: OutboundMessage) -> Option<MessageId> {
        let user = msg.user_id;
        match self.engine.channel.send(msg).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(user_id = user, error = %e, "failed to send message");
                None
            }
        }
    }

    pub async fn say(&self, user: UserId, text: impl Into<String>) {
        self.deliver(OutboundMessage::html(user, text)).await;
    }

    pub async fn say_with(&self, user: UserId, text: impl Into<String>, keyboard: Keyboard) {
        self.deliver(OutboundMessage::html(user, text).with_keyboard(keyboard))
            .await;
    }

    pub async fn state(&self, user: UserId) -> Result<StateSnapshot, AnonmatchError> {
        self.storage().get_state(user).await
    }

    pub async fn set_state(
        &self,
        user: UserId,
        state: UserState,
        payload: &str,
    ) -> Result<(), AnonmatchError> {
        self.storage().set_state(user, state, payload).await
    }

    /// Refuses to start a side flow while the user is chatting, searching
    /// or inside a circle.
    pub async fn ensure_idle(&self, user: UserId) -> Result<StateSnapshot, AnonmatchError> {
        let snapshot = self.state(user).await?;
        match snapshot.state {
            UserState::InChat | UserState::AwaitingReport => Err(AnonmatchError::AlreadyInSession),
            UserState::Searching => Err(AnonmatchError::AlreadyInQueue),
            UserState::InCircle => Err(AnonmatchError::invalid(
                "circle",
                "leave the circle first",
            )),
            _ => Ok(snapshot),
        }
    }

    /// Announces freshly earned achievements to their owners.
    pub async fn notify_achievements(&self, awarded: &[(UserId, &'static str)]) {
        for (user, key) in awarded {
            if let Some(text) = texts::achievement_unlocked(key) {
                self.say(*user, text).await;
            }
        }
    }

    /// Tells the other side of an ended session that `by` left.
    pub async fn announce_end(&self, end: &SessionEnd, by: UserId, notice: &str) {
        if let Some(partner) = end.partner_of(by) {
            self.say(partner, notice).await;
        }
        self.notify_achievements(&end.awarded).await;
    }

    /// Adds karma and awards the karma achievement when the total crosses it.
    pub async fn add_karma(&self, user: UserId, delta: i64, now: DateTime<Utc>) {
        let karma = match self.storage().increment_karma(user, delta).await {
            Ok(karma) => karma,
            Err(e) => {
                warn!(user_id = user, error = %e, "failed to add karma");
                return;
            }
        };
        debug!(user_id = user, delta, karma, "karma added");
        if karma < KARMA_MASTER_THRESHOLD {
            return;
        }
        match self.storage().award_achievement(user, KARMA_MASTER, now).await {
            Ok(true) => self.notify_achievements(&[(user, KARMA_MASTER)]).await,
            Ok(false) => {}
            Err(e) => warn!(user_id = user, error = %e, "failed to award achievement"),
        }
    }

    pub fn is_maintenance(&self, user: UserId) -> bool {
        let id = self.config.bot.maintenance_account_id;
        id != 0 && id == user
    }
}
