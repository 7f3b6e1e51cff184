//! Telegram update handlers.
//!
//! Each handler converts the teloxide payload into a core type and hands it to the
//! moderator. Handlers never return errors: failures are logged inside the core.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message},
};

use crate::router::AppState;

mod callback;
mod text;

pub async fn handle_callback(q: CallbackQuery, state: Arc<AppState>) -> ResponseResult<()> {
    callback::handle_callback(q, state).await
}

/// Only plain text is classified; captions, media and service messages are skipped
/// by `text::handle_text`.
pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    text::handle_text(msg, state).await
}
