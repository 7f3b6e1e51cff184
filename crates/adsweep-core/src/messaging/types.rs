use crate::domain::{ChatId, MessageId, MessageRef, UserId};

/// Incoming text message, already stripped of Telegram specifics.
#[derive(Clone, Debug)]
pub struct TextMessage {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub text: String,
    pub entities: Vec<MessageEntity>,
    pub sender: Option<Sender>,
}

impl TextMessage {
    /// Text covered by `entity`, or `None` if the range falls outside the message.
    pub fn entity_text(&self, entity: &MessageEntity) -> Option<String> {
        utf16_slice(&self.text, entity.offset, entity.length)
    }
}

#[derive(Clone, Debug)]
pub struct Sender {
    pub user_id: UserId,
    pub username: Option<String>,
}

/// An annotated span of message text.
///
/// Offsets and lengths are in UTF-16 code units, as delivered by the Bot API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEntity {
    pub kind: EntityKind,
    pub offset: usize,
    pub length: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityKind {
    /// `@username`
    Mention,
    Other,
}

/// A button press on a message we sent earlier.
#[derive(Clone, Debug)]
pub struct CallbackQuery {
    pub callback_id: String,
    pub data: String,
    /// The message carrying the keyboard, if Telegram still delivers it.
    pub prompt: Option<MessageRef>,
    /// The message the prompt was a reply to.
    pub replied_to: Option<MessageRef>,
    pub from: Option<Sender>,
}

impl CallbackQuery {
    pub fn chat_id(&self) -> Option<ChatId> {
        self.prompt.map(|m| m.chat_id)
    }
}

/// The bot's own membership record in a chat.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChatMemberStatus {
    /// Only administrators carry this flag; `None` for every other status.
    pub can_delete_messages: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct SendOptions {
    pub reply_to: Option<MessageId>,
    pub keyboard: Option<InlineKeyboard>,
}

impl SendOptions {
    pub fn reply_to(message_id: MessageId) -> Self {
        Self {
            reply_to: Some(message_id),
            keyboard: None,
        }
    }

    pub fn with_keyboard(mut self, keyboard: InlineKeyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

/// Inline keyboard (buttons) used for callbacks like `delete_ad`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineKeyboard {
    pub buttons: Vec<InlineButton>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub callback_data: String,
}

impl InlineKeyboard {
    pub fn single(label: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            buttons: vec![InlineButton {
                label: label.into(),
                callback_data: callback_data.into(),
            }],
        }
    }
}

fn utf16_slice(text: &str, offset: usize, length: usize) -> Option<String> {
    let units: Vec<u16> = text.encode_utf16().collect();
    let end = offset.checked_add(length)?;
    let span = units.get(offset..end)?;
    String::from_utf16(span).ok()
}
