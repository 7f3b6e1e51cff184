use std::sync::Arc;

use teloxide::prelude::*;

use adsweep_core::{
    domain::{ChatId, MessageId, MessageRef},
    messaging::types,
};

use crate::handlers::text::sender;
use crate::router::AppState;

pub async fn handle_callback(q: CallbackQuery, state: Arc<AppState>) -> ResponseResult<()> {
    state.moderator.handle_callback(&to_callback(&q)).await;
    Ok(())
}

fn message_ref(msg: &Message) -> MessageRef {
    MessageRef {
        chat_id: ChatId(msg.chat.id.0),
        message_id: MessageId(msg.id.0),
    }
}

fn to_callback(q: &CallbackQuery) -> types::CallbackQuery {
    types::CallbackQuery {
        callback_id: q.id.clone(),
        data: q.data.clone().unwrap_or_default(),
        prompt: q.message.as_ref().map(message_ref),
        replied_to: q
            .message
            .as_ref()
            .and_then(|m| m.reply_to_message())
            .map(message_ref),
        from: Some(sender(&q.from)),
    }
}
