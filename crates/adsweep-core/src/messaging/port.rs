use async_trait::async_trait;

use crate::{
    domain::{BotIdentity, ChatId, MessageRef, UserId},
    messaging::types::{ChatMemberStatus, SendOptions},
    Result,
};

/// Outbound side of the messenger.
///
/// Implementations map platform failures into `Error::Transport`, except
/// `get_chat_member` which reports `Error::PermissionQuery`.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn get_me(&self) -> Result<BotIdentity>;

    async fn get_chat_member(&self, chat_id: ChatId, user_id: UserId) -> Result<ChatMemberStatus>;

    async fn send_text(&self, chat_id: ChatId, text: &str, opts: SendOptions)
        -> Result<MessageRef>;

    async fn delete_message(&self, msg: MessageRef) -> Result<()>;

    async fn answer_callback_query(&self, callback_id: &str) -> Result<()>;
}
