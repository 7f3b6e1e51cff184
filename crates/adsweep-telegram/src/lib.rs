//! Telegram adapter (teloxide).
//!
//! This crate implements the `adsweep-core` MessagingPort over the Telegram Bot API
//! and feeds incoming updates to the core moderator.

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{ChatMemberKind, InlineKeyboardButton, InlineKeyboardMarkup},
};

pub mod handlers;
pub mod router;

use adsweep_core::{
    domain::{BotIdentity, ChatId, MessageId, MessageRef, UserId},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{ChatMemberStatus, InlineKeyboard, SendOptions},
    },
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    fn tg_user(user_id: UserId) -> teloxide::types::UserId {
        teloxide::types::UserId(user_id.0 as u64)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::Transport(format!("telegram error: {e}"))
    }
}

/// One button per row.
fn inline_markup(keyboard: InlineKeyboard) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = keyboard
        .buttons
        .into_iter()
        .map(|b| vec![InlineKeyboardButton::callback(b.label, b.callback_data)])
        .collect();
    InlineKeyboardMarkup::new(rows)
}

/// Only administrators carry `can_delete_messages`; owners and everyone else map to
/// "flag absent".
fn member_status(kind: &ChatMemberKind) -> ChatMemberStatus {
    match kind {
        ChatMemberKind::Administrator(admin) => ChatMemberStatus {
            can_delete_messages: Some(admin.can_delete_messages),
        },
        _ => ChatMemberStatus::default(),
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    async fn get_me(&self) -> Result<BotIdentity> {
        let me = self.bot.get_me().await.map_err(Self::map_err)?;
        let username = me
            .user
            .username
            .clone()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::Transport("bot account has no username".to_string()))?;
        Ok(BotIdentity {
            id: UserId(me.user.id.0 as i64),
            username,
        })
    }

    async fn get_chat_member(&self, chat_id: ChatId, user_id: UserId) -> Result<ChatMemberStatus> {
        let member = self
            .bot
            .get_chat_member(Self::tg_chat(chat_id), Self::tg_user(user_id))
            .await
            .map_err(|e| Error::PermissionQuery(format!("telegram error: {e}")))?;
        Ok(member_status(&member.kind))
    }

    async fn send_text(&self, chat_id: ChatId, text: &str, opts: SendOptions) -> Result<MessageRef> {
        let mut req = self.bot.send_message(Self::tg_chat(chat_id), text.to_string());
        if let Some(reply_to) = opts.reply_to {
            req = req.reply_to_message_id(Self::tg_msg_id(reply_to));
        }
        if let Some(keyboard) = opts.keyboard {
            req = req.reply_markup(inline_markup(keyboard));
        }
        let msg = req.await.map_err(Self::map_err)?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        self.bot
            .delete_message(Self::tg_chat(msg.chat_id), Self::tg_msg_id(msg.message_id))
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn answer_callback_query(&self, callback_id: &str) -> Result<()> {
        self.bot
            .answer_callback_query(callback_id.to_string())
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }
}
