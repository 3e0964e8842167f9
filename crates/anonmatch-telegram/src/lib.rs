// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram channel adapter for the anonmatch bot.
//!
//! Implements [`ChannelAdapter`] for the Telegram Bot API via teloxide:
//! long polling for private messages and button presses, HTML delivery with
//! inline keyboards, view-once spoilers and message deletion.

pub mod handler;
pub mod split;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    CallbackQueryId, ChatId, FileId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile,
    ParseMode,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use anonmatch_config::model::BotConfig;
use anonmatch_core::types::{AdapterType, Formatting, HealthStatus, Keyboard, OutboundContent};
use anonmatch_core::{
    AnonmatchError, ChannelAdapter, InboundEvent, MessageId, OutboundMessage, PluginAdapter,
    UserId,
};

/// Capacity of the buffer between the poller and [`ChannelAdapter::receive`].
const INBOUND_BUFFER: usize = 256;

/// Telegram channel adapter implementing [`ChannelAdapter`].
pub struct TelegramChannel {
    bot: Bot,
    token: String,
    inbound_rx: tokio::sync::Mutex<mpsc::Receiver<InboundEvent>>,
    inbound_tx: mpsc::Sender<InboundEvent>,
    polling_handle: Option<tokio::task::JoinHandle<()>>,
}

impl TelegramChannel {
    /// Requires `bot.token` to be set.
    pub fn new(config: &BotConfig) -> Result<Self, AnonmatchError> {
        let token = config
            .token()
            .ok_or_else(|| AnonmatchError::Config("bot.token is required for Telegram".into()))?
            .to_string();
        let bot = Bot::new(&token);
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_BUFFER);
        Ok(Self {
            bot,
            token,
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
            inbound_tx,
            polling_handle: None,
        })
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }
}

fn channel_err(action: &str, e: teloxide::RequestError) -> AnonmatchError {
    AnonmatchError::Channel {
        message: format!("failed to {action}: {e}"),
        source: Some(Box::new(e)),
    }
}

fn parse_message_id(id: &MessageId) -> Result<teloxide::types::MessageId, AnonmatchError> {
    id.0.parse::<i32>()
        .map(teloxide::types::MessageId)
        .map_err(|e| AnonmatchError::Channel {
            message: format!("invalid message id {:?}: {e}", id.0),
            source: None,
        })
}

fn markup(keyboard: &Keyboard) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(keyboard.rows.iter().map(|row| {
        row.iter()
            .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.data.clone()))
            .collect::<Vec<_>>()
    }))
}

fn file(id: &str) -> InputFile {
    InputFile::file_id(FileId(id.to_string()))
}

#[async_trait]
impl PluginAdapter for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, AnonmatchError> {
        match self.bot.get_me().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(format!(
                "Telegram bot unreachable: {e}"
            ))),
        }
    }

    async fn shutdown(&self) -> Result<(), AnonmatchError> {
        debug!("Telegram channel shutting down");
        if let Some(handle) = &self.polling_handle {
            handle.abort();
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for TelegramChannel {
    async fn connect(&mut self) -> Result<(), AnonmatchError> {
        if self.polling_handle.is_some() {
            return Ok(());
        }

        let bot = self.bot.clone();
        let msg_tx = self.inbound_tx.clone();
        let cb_tx = self.inbound_tx.clone();
        info!("starting Telegram long polling");

        let handle = tokio::spawn(async move {
            let messages = Update::filter_message().endpoint(move |msg: Message| {
                let tx = msg_tx.clone();
                async move {
                    if !handler::is_dm(&msg) {
                        debug!(chat_id = msg.chat.id.0, "ignoring non-DM message");
                        return respond(());
                    }
                    match handler::to_inbound_event(&msg) {
                        Some(event) => {
                            if tx.send(event).await.is_err() {
                                warn!("inbound channel closed, dropping message");
                            }
                        }
                        None => debug!(msg_id = msg.id.0, "ignoring message without sender"),
                    }
                    respond(())
                }
            });
            let callbacks = Update::filter_callback_query().endpoint(move |q: CallbackQuery| {
                let tx = cb_tx.clone();
                async move {
                    if let Some(event) = handler::callback_event(&q) {
                        if tx.send(event).await.is_err() {
                            warn!("inbound channel closed, dropping callback");
                        }
                    }
                    respond(())
                }
            });

            Dispatcher::builder(bot, dptree::entry().branch(messages).branch(callbacks))
                .default_handler(|_| async {})
                .build()
                .dispatch()
                .await;
        });

        self.polling_handle = Some(handle);
        Ok(())
    }

    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, AnonmatchError> {
        let chat = ChatId(msg.user_id);
        let html = msg.formatting == Formatting::Html;
        let keyboard = msg.keyboard.as_ref().map(markup);

        let sent = match &msg.content {
            OutboundContent::Text(text) => {
                let parts = split::chunks(text, split::MAX_MESSAGE_LEN);
                let last = parts.len().saturating_sub(1);
                let mut sent = None;
                for (i, part) in parts.into_iter().enumerate() {
                    let mut req = self.bot.send_message(chat, part);
                    if html {
                        req = req.parse_mode(ParseMode::Html);
                    }
                    if i == last {
                        if let Some(k) = keyboard.clone() {
                            req = req.reply_markup(k);
                        }
                    }
                    sent = Some(req.await.map_err(|e| channel_err("send message", e))?);
                }
                sent.ok_or_else(|| AnonmatchError::Channel {
                    message: "empty message".into(),
                    source: None,
                })?
            }
            OutboundContent::Photo { file_id, caption } => {
                let mut req = self.bot.send_photo(chat, file(file_id));
                if let Some(c) = caption {
                    req = req.caption(c.clone()).parse_mode(ParseMode::Html);
                }
                if let Some(k) = keyboard {
                    req = req.reply_markup(k);
                }
                req.await.map_err(|e| channel_err("send photo", e))?
            }
            OutboundContent::Video { file_id, caption } => {
                let mut req = self.bot.send_video(chat, file(file_id));
                if let Some(c) = caption {
                    req = req.caption(c.clone()).parse_mode(ParseMode::Html);
                }
                req.await.map_err(|e| channel_err("send video", e))?
            }
            OutboundContent::Voice { file_id } => self
                .bot
                .send_voice(chat, file(file_id))
                .await
                .map_err(|e| channel_err("send voice", e))?,
            OutboundContent::VideoNote { file_id } => self
                .bot
                .send_video_note(chat, file(file_id))
                .await
                .map_err(|e| channel_err("send video note", e))?,
            OutboundContent::Animation { file_id } => self
                .bot
                .send_animation(chat, file(file_id))
                .await
                .map_err(|e| channel_err("send animation", e))?,
            OutboundContent::Sticker { file_id } => self
                .bot
                .send_sticker(chat, file(file_id))
                .await
                .map_err(|e| channel_err("send sticker", e))?,
            OutboundContent::Document { file_id, caption } => {
                let mut req = self.bot.send_document(chat, file(file_id));
                if let Some(c) = caption {
                    req = req.caption(c.clone()).parse_mode(ParseMode::Html);
                }
                req.await.map_err(|e| channel_err("send document", e))?
            }
        };

        Ok(MessageId(sent.id.0.to_string()))
    }

    async fn delete(&self, user_id: UserId, message_id: &MessageId) -> Result<(), AnonmatchError> {
        let id = parse_message_id(message_id)?;
        self.bot
            .delete_message(ChatId(user_id), id)
            .await
            .map_err(|e| channel_err("delete message", e))?;
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), AnonmatchError> {
        let mut req = self
            .bot
            .answer_callback_query(CallbackQueryId(callback_id.to_string()));
        if let Some(t) = text {
            req = req.text(t);
        }
        req.await.map_err(|e| channel_err("answer callback", e))?;
        Ok(())
    }

    async fn media_url(&self, file_id: &str) -> Result<String, AnonmatchError> {
        let f = self
            .bot
            .get_file(FileId(file_id.to_string()))
            .await
            .map_err(|e| channel_err("resolve file", e))?;
        Ok(format!(
            "https://api.telegram.org/file/bot{}/{}",
            self.token, f.path
        ))
    }

    async fn receive(&self) -> Result<InboundEvent, AnonmatchError> {
        let mut rx = self.inbound_rx.lock().await;
        rx.recv().await.ok_or(AnonmatchError::ChannelClosed)
    }
}
