use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{MessageEntityKind, User},
};

use adsweep_core::{
    domain::{ChatId, MessageId, UserId},
    messaging::types::{EntityKind, MessageEntity, Sender, TextMessage},
};

use crate::router::AppState;

pub async fn handle_text(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = to_text_message(&msg) else {
        return Ok(());
    };
    state.moderator.handle_text(&text).await;
    Ok(())
}

pub(crate) fn sender(user: &User) -> Sender {
    Sender {
        user_id: UserId(user.id.0 as i64),
        username: user.username.clone(),
    }
}

fn to_text_message(msg: &Message) -> Option<TextMessage> {
    let text = msg.text()?.to_string();
    let entities = msg
        .entities()
        .unwrap_or(&[])
        .iter()
        .map(|e| MessageEntity {
            kind: match e.kind {
                MessageEntityKind::Mention => EntityKind::Mention,
                _ => EntityKind::Other,
            },
            offset: e.offset,
            length: e.length,
        })
        .collect();

    Some(TextMessage {
        chat_id: ChatId(msg.chat.id.0),
        message_id: MessageId(msg.id.0),
        text,
        entities,
        sender: msg.from().map(sender),
    })
}
