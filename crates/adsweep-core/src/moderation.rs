//! Per-update moderation decisions.
//!
//! Text messages in whitelisted chats go through the classifier; flagged ones get a
//! threaded "delete?" prompt (or a notice that the bot lacks rights). Otherwise, a
//! message addressed to the bot gets a status report. A press on the prompt button
//! re-checks rights and removes both the flagged message and the prompt.

use std::sync::Arc;

use crate::{
    authorization::AuthorizationList,
    classifier::Classifier,
    config::MentionMatch,
    domain::{BotIdentity, ChatId},
    messaging::{
        port::MessagingPort,
        types::{CallbackQuery, EntityKind, InlineKeyboard, SendOptions, TextMessage},
    },
    permissions::PermissionCache,
    Result,
};

pub const DELETE_AD_ACTION: &str = "delete_ad";
pub const DELETE_PROMPT_TEXT: &str = "Удалить это сообщение?";
pub const DELETE_BUTTON_LABEL: &str = "Удалить";
pub const NO_DELETE_RIGHTS_TEXT: &str = "У меня нет прав на удаление сообщений";

pub fn status_report(chat_id: ChatId, can_delete: bool, whitelisted: bool) -> String {
    format!(
        "ID группы: {chat_id}\nМогу удалить сообщения: {}\nГруппа в вайтлисте: {}",
        yes_no(can_delete),
        yes_no(whitelisted)
    )
}

fn yes_no(v: bool) -> &'static str {
    if v {
        "Да"
    } else {
        "Нет"
    }
}

/// What happened to an incoming text message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextOutcome {
    DeletePrompted,
    NoDeleteRights,
    StatusReported,
    Ignored,
    /// Sending the reply failed; already logged.
    Failed,
}

/// What happened to a button press. The query is acknowledged in every case.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackOutcome {
    Deleted,
    NotPermitted,
    NothingToDelete,
    /// Not a `delete_ad` press.
    Ignored,
    /// A delete call failed; already logged.
    Failed,
}

pub struct Moderator {
    messenger: Arc<dyn MessagingPort>,
    classifier: Classifier,
    permissions: PermissionCache,
    whitelist: AuthorizationList,
    bot: BotIdentity,
    mention_match: MentionMatch,
}

impl Moderator {
    pub fn new(
        messenger: Arc<dyn MessagingPort>,
        classifier: Classifier,
        permissions: PermissionCache,
        whitelist: AuthorizationList,
        bot: BotIdentity,
        mention_match: MentionMatch,
    ) -> Self {
        Self {
            messenger,
            classifier,
            permissions,
            whitelist,
            bot,
            mention_match,
        }
    }

    /// Never fails: errors are logged and reported as [`TextOutcome::Failed`].
    pub async fn handle_text(&self, msg: &TextMessage) -> TextOutcome {
        match self.try_handle_text(msg).await {
            Ok(outcome) => {
                tracing::debug!(
                    chat_id = msg.chat_id.0,
                    message_id = msg.message_id.0,
                    ?outcome,
                    "text handled"
                );
                outcome
            }
            Err(e) => {
                tracing::warn!(
                    chat_id = msg.chat_id.0,
                    message_id = msg.message_id.0,
                    error = %e,
                    "error processing message"
                );
                TextOutcome::Failed
            }
        }
    }

    async fn try_handle_text(&self, msg: &TextMessage) -> Result<TextOutcome> {
        let chat_id = msg.chat_id;
        let reply = SendOptions::reply_to(msg.message_id);

        if self.whitelist.contains(chat_id)
            && self.classifier.is_advertisement(chat_id, &msg.text).await
        {
            if self.permissions.can_delete(chat_id, false).await {
                let keyboard = InlineKeyboard::single(DELETE_BUTTON_LABEL, DELETE_AD_ACTION);
                self.messenger
                    .send_text(chat_id, DELETE_PROMPT_TEXT, reply.with_keyboard(keyboard))
                    .await?;
                tracing::info!(
                    chat_id = chat_id.0,
                    message_id = msg.message_id.0,
                    sender = ?msg.sender.as_ref().and_then(|s| s.username.as_deref()),
                    "advertisement flagged, deletion offered"
                );
                return Ok(TextOutcome::DeletePrompted);
            }

            self.messenger
                .send_text(chat_id, NO_DELETE_RIGHTS_TEXT, reply)
                .await?;
            tracing::info!(chat_id = chat_id.0, "advertisement flagged, no delete rights");
            return Ok(TextOutcome::NoDeleteRights);
        }

        if !self.mentions_bot(msg) {
            return Ok(TextOutcome::Ignored);
        }

        let can_delete = self.permissions.can_delete(chat_id, true).await;
        let whitelisted = self.whitelist.contains(chat_id);
        self.messenger
            .send_text(chat_id, &status_report(chat_id, can_delete, whitelisted), reply)
            .await?;
        Ok(TextOutcome::StatusReported)
    }

    fn mentions_bot(&self, msg: &TextMessage) -> bool {
        let username = self.bot.username.as_str();
        if username.is_empty() {
            return false;
        }

        let mut mentions = msg.entities.iter().filter(|e| e.kind == EntityKind::Mention);
        match self.mention_match {
            // Substring test on the whole text: `@botname_fan` also matches `botname`.
            MentionMatch::Loose => mentions.next().is_some() && msg.text.contains(username),
            MentionMatch::Exact => mentions.any(|e| {
                msg.entity_text(e)
                    .as_deref()
                    .and_then(|t| t.strip_prefix('@'))
                    .is_some_and(|name| name.eq_ignore_ascii_case(username))
            }),
        }
    }

    /// Handle a button press. The query is always acknowledged, best-effort.
    pub async fn handle_callback(&self, q: &CallbackQuery) -> CallbackOutcome {
        let outcome = if q.data == DELETE_AD_ACTION {
            match self.try_delete(q).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!(
                        chat_id = ?q.chat_id().map(|c| c.0),
                        error = %e,
                        "error in delete_ad action"
                    );
                    CallbackOutcome::Failed
                }
            }
        } else {
            CallbackOutcome::Ignored
        };

        if let Err(e) = self.messenger.answer_callback_query(&q.callback_id).await {
            tracing::warn!(callback_id = %q.callback_id, error = %e, "failed to answer callback query");
        }
        outcome
    }

    async fn try_delete(&self, q: &CallbackQuery) -> Result<CallbackOutcome> {
        let Some(chat_id) = q.chat_id() else {
            return Ok(CallbackOutcome::NothingToDelete);
        };

        if !self.permissions.can_delete(chat_id, true).await {
            return Ok(CallbackOutcome::NotPermitted);
        }

        let (Some(original), Some(prompt)) = (q.replied_to, q.prompt) else {
            return Ok(CallbackOutcome::NothingToDelete);
        };

        self.messenger.delete_message(original).await?;
        self.messenger.delete_message(prompt).await?;
        tracing::info!(
            chat_id = chat_id.0,
            message_id = original.message_id.0,
            by = ?q.from.as_ref().map(|s| s.user_id.0),
            "advertisement deleted"
        );
        Ok(CallbackOutcome::Deleted)
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Mutex, time::Duration};

    use async_trait::async_trait;

    use super::*;
    use crate::{
        classifier::CompletionClient,
        domain::{MessageId, MessageRef, UserId},
        errors::Error,
        messaging::types::{ChatMemberStatus, MessageEntity, Sender},
    };

    const AUTHORIZED: ChatId = ChatId(-1001);
    const STRANGER: ChatId = ChatId(-2002);
    const BOT_ID: UserId = UserId(999);

    #[derive(Clone, Copy)]
    enum Rights {
        CanDelete,
        CannotDelete,
        QueryFails,
    }

    struct FakeMessenger {
        rights: Mutex<Rights>,
        fail_sends: bool,
        fail_deletes: bool,
        member_queries: Mutex<usize>,
        sent: Mutex<Vec<(ChatId, String, SendOptions)>>,
        deleted: Mutex<Vec<MessageRef>>,
        answered: Mutex<Vec<String>>,
    }

    impl FakeMessenger {
        fn new(rights: Rights) -> Self {
            Self {
                rights: Mutex::new(rights),
                fail_sends: false,
                fail_deletes: false,
                member_queries: Mutex::new(0),
                sent: Mutex::new(Vec::new()),
                deleted: Mutex::new(Vec::new()),
                answered: Mutex::new(Vec::new()),
            }
        }

        fn set_rights(&self, rights: Rights) {
            *self.rights.lock().unwrap() = rights;
        }

        fn sent(&self) -> Vec<(ChatId, String, SendOptions)> {
            self.sent.lock().unwrap().clone()
        }

        fn deleted(&self) -> Vec<MessageRef> {
            self.deleted.lock().unwrap().clone()
        }

        fn answered(&self) -> Vec<String> {
            self.answered.lock().unwrap().clone()
        }

        fn member_queries(&self) -> usize {
            *self.member_queries.lock().unwrap()
        }
    }

    #[async_trait]
    impl MessagingPort for FakeMessenger {
        async fn get_me(&self) -> Result<BotIdentity> {
            Ok(bot())
        }

        async fn get_chat_member(&self, _chat_id: ChatId, user_id: UserId) -> Result<ChatMemberStatus> {
            assert_eq!(user_id, BOT_ID);
            *self.member_queries.lock().unwrap() += 1;
            match *self.rights.lock().unwrap() {
                Rights::CanDelete => Ok(ChatMemberStatus {
                    can_delete_messages: Some(true),
                }),
                Rights::CannotDelete => Ok(ChatMemberStatus {
                    can_delete_messages: None,
                }),
                Rights::QueryFails => Err(Error::PermissionQuery("chat not found".to_string())),
            }
        }

        async fn send_text(&self, chat_id: ChatId, text: &str, opts: SendOptions) -> Result<MessageRef> {
            if self.fail_sends {
                return Err(Error::Transport("message thread not found".to_string()));
            }
            let mut sent = self.sent.lock().unwrap();
            sent.push((chat_id, text.to_string(), opts));
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(1000 + sent.len() as i32),
            })
        }

        async fn delete_message(&self, msg: MessageRef) -> Result<()> {
            if self.fail_deletes {
                return Err(Error::Transport("message can't be deleted".to_string()));
            }
            self.deleted.lock().unwrap().push(msg);
            Ok(())
        }

        async fn answer_callback_query(&self, callback_id: &str) -> Result<()> {
            self.answered.lock().unwrap().push(callback_id.to_string());
            Ok(())
        }
    }

    struct FakeOracle {
        reply: std::result::Result<String, String>,
        calls: Mutex<usize>,
    }

    impl FakeOracle {
        fn says(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                calls: Mutex::new(0),
            })
        }

        fn down() -> Arc<Self> {
            Arc::new(Self {
                reply: Err("connection refused".to_string()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl CompletionClient for FakeOracle {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            *self.calls.lock().unwrap() += 1;
            self.reply.clone().map_err(Error::Oracle)
        }
    }

    fn bot() -> BotIdentity {
        BotIdentity {
            id: BOT_ID,
            username: "sweeper_bot".to_string(),
        }
    }

    fn moderator(
        messenger: Arc<FakeMessenger>,
        oracle: Arc<FakeOracle>,
        mention_match: MentionMatch,
    ) -> Moderator {
        let permissions =
            PermissionCache::new(messenger.clone(), BOT_ID, Duration::from_secs(15 * 60));
        Moderator::new(
            messenger,
            Classifier::new(oracle),
            permissions,
            AuthorizationList::parse_csv(&AUTHORIZED.0.to_string()),
            bot(),
            mention_match,
        )
    }

    fn text(chat_id: ChatId, text: &str) -> TextMessage {
        TextMessage {
            chat_id,
            message_id: MessageId(55),
            text: text.to_string(),
            entities: Vec::new(),
            sender: Some(Sender {
                user_id: UserId(1),
                username: Some("seller".to_string()),
            }),
        }
    }

    /// Message whose entities mark every `@word` as a mention.
    fn mentioning(chat_id: ChatId, body: &str) -> TextMessage {
        let mut msg = text(chat_id, body);
        let mut offset = 0;
        for word in body.split(' ') {
            let len = word.encode_utf16().count();
            if word.starts_with('@') {
                msg.entities.push(MessageEntity {
                    kind: EntityKind::Mention,
                    offset,
                    length: len,
                });
            }
            offset += len + 1;
        }
        msg
    }

    fn delete_press(replied_to: Option<MessageRef>) -> CallbackQuery {
        CallbackQuery {
            callback_id: "cb-1".to_string(),
            data: DELETE_AD_ACTION.to_string(),
            prompt: Some(MessageRef {
                chat_id: AUTHORIZED,
                message_id: MessageId(56),
            }),
            replied_to,
            from: None,
        }
    }

    fn original() -> MessageRef {
        MessageRef {
            chat_id: AUTHORIZED,
            message_id: MessageId(55),
        }
    }

    #[tokio::test]
    async fn flagged_ad_gets_single_delete_prompt() {
        let messenger = Arc::new(FakeMessenger::new(Rights::CanDelete));
        let oracle = FakeOracle::says("Yes, this is an advertisement for watches.");
        let m = moderator(messenger.clone(), oracle.clone(), MentionMatch::Loose);

        let msg = mentioning(AUTHORIZED, "Buy cheap watches now! @sweeper_bot");
        assert_eq!(m.handle_text(&msg).await, TextOutcome::DeletePrompted);

        let sent = messenger.sent();
        assert_eq!(sent.len(), 1, "no status report alongside the prompt");
        let (chat, body, opts) = &sent[0];
        assert_eq!(*chat, AUTHORIZED);
        assert_eq!(body, DELETE_PROMPT_TEXT);
        assert_eq!(opts.reply_to, Some(MessageId(55)));
        let keyboard = opts.keyboard.as_ref().unwrap();
        assert_eq!(keyboard.buttons.len(), 1);
        assert_eq!(keyboard.buttons[0].callback_data, DELETE_AD_ACTION);
        assert_eq!(oracle.calls(), 1);
    }

    #[tokio::test]
    async fn flagged_ad_without_rights_gets_notice() {
        let messenger = Arc::new(FakeMessenger::new(Rights::CannotDelete));
        let m = moderator(
            messenger.clone(),
            FakeOracle::says("Yes, job offer."),
            MentionMatch::Loose,
        );

        assert_eq!(
            m.handle_text(&text(AUTHORIZED, "Hiring remote workers")).await,
            TextOutcome::NoDeleteRights
        );
        let sent = messenger.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, NO_DELETE_RIGHTS_TEXT);
        assert_eq!(sent[0].2.reply_to, Some(MessageId(55)));
        assert!(sent[0].2.keyboard.is_none());
    }

    #[tokio::test]
    async fn prompt_path_uses_cached_permission() {
        let messenger = Arc::new(FakeMessenger::new(Rights::CanDelete));
        let m = moderator(messenger.clone(), FakeOracle::says("Yes, ad."), MentionMatch::Loose);

        m.handle_text(&text(AUTHORIZED, "ad one")).await;
        m.handle_text(&text(AUTHORIZED, "ad two")).await;
        assert_eq!(messenger.member_queries(), 1);
        assert_eq!(messenger.sent().len(), 2);
    }

    #[tokio::test]
    async fn oracle_failure_never_prompts() {
        let messenger = Arc::new(FakeMessenger::new(Rights::CanDelete));
        let m = moderator(messenger.clone(), FakeOracle::down(), MentionMatch::Loose);

        assert_eq!(
            m.handle_text(&text(AUTHORIZED, "Buy cheap watches now!")).await,
            TextOutcome::Ignored
        );
        assert!(messenger.sent().is_empty());
        assert_eq!(messenger.member_queries(), 0);
    }

    #[tokio::test]
    async fn unauthorized_chat_is_not_classified() {
        let messenger = Arc::new(FakeMessenger::new(Rights::CanDelete));
        let oracle = FakeOracle::says("Yes, ad.");
        let m = moderator(messenger.clone(), oracle.clone(), MentionMatch::Loose);

        assert_eq!(
            m.handle_text(&text(STRANGER, "Buy cheap watches now!")).await,
            TextOutcome::Ignored
        );
        assert_eq!(oracle.calls(), 0);
        assert!(messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn mention_in_unauthorized_chat_reports_status() {
        let messenger = Arc::new(FakeMessenger::new(Rights::CannotDelete));
        let oracle = FakeOracle::says("Yes, ad.");
        let m = moderator(messenger.clone(), oracle.clone(), MentionMatch::Loose);

        let msg = mentioning(STRANGER, "@sweeper_bot are you alive?");
        assert_eq!(m.handle_text(&msg).await, TextOutcome::StatusReported);

        let sent = messenger.sent();
        assert_eq!(sent.len(), 1);
        let (chat, body, opts) = &sent[0];
        assert_eq!(*chat, STRANGER);
        assert!(body.contains("ID группы: -2002"));
        assert!(body.contains("Могу удалить сообщения: Нет"));
        assert!(body.contains("Группа в вайтлисте: Нет"));
        assert_eq!(opts.reply_to, Some(MessageId(55)));
        assert_eq!(oracle.calls(), 0);
    }

    #[tokio::test]
    async fn status_report_forces_permission_refresh() {
        let messenger = Arc::new(FakeMessenger::new(Rights::CannotDelete));
        let m = moderator(messenger.clone(), FakeOracle::says("No, greeting."), MentionMatch::Loose);

        let msg = mentioning(AUTHORIZED, "hi @sweeper_bot");
        assert_eq!(m.handle_text(&msg).await, TextOutcome::StatusReported);

        messenger.set_rights(Rights::CanDelete);
        assert_eq!(m.handle_text(&msg).await, TextOutcome::StatusReported);

        let sent = messenger.sent();
        assert_eq!(messenger.member_queries(), 2);
        assert!(sent[0].1.contains("Могу удалить сообщения: Нет"));
        assert!(sent[1].1.contains("Могу удалить сообщения: Да"));
        assert!(sent[1].1.contains("Группа в вайтлисте: Да"));
    }

    #[tokio::test]
    async fn status_report_with_failed_permission_query_says_no() {
        let messenger = Arc::new(FakeMessenger::new(Rights::QueryFails));
        let m = moderator(messenger.clone(), FakeOracle::says("No."), MentionMatch::Loose);

        let msg = mentioning(STRANGER, "@sweeper_bot status");
        assert_eq!(m.handle_text(&msg).await, TextOutcome::StatusReported);
        assert!(messenger.sent()[0].1.contains("Могу удалить сообщения: Нет"));
    }

    #[tokio::test]
    async fn plain_message_is_ignored() {
        let messenger = Arc::new(FakeMessenger::new(Rights::CanDelete));
        let m = moderator(messenger.clone(), FakeOracle::says("No, chat."), MentionMatch::Loose);

        // Handle in the text but no mention entity.
        assert_eq!(
            m.handle_text(&text(STRANGER, "sweeper_bot is nice")).await,
            TextOutcome::Ignored
        );
        assert!(messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn loose_matching_accepts_similar_handles() {
        let messenger = Arc::new(FakeMessenger::new(Rights::CanDelete));
        let m = moderator(messenger.clone(), FakeOracle::says("No."), MentionMatch::Loose);

        let msg = mentioning(STRANGER, "ask @sweeper_bot_fan");
        assert_eq!(m.handle_text(&msg).await, TextOutcome::StatusReported);
    }

    #[tokio::test]
    async fn exact_matching_requires_the_bot_handle() {
        let messenger = Arc::new(FakeMessenger::new(Rights::CanDelete));
        let m = moderator(messenger.clone(), FakeOracle::says("No."), MentionMatch::Exact);

        let similar = mentioning(STRANGER, "ask @sweeper_bot_fan");
        assert_eq!(m.handle_text(&similar).await, TextOutcome::Ignored);

        let exact = mentioning(STRANGER, "ask @Sweeper_Bot please");
        assert_eq!(m.handle_text(&exact).await, TextOutcome::StatusReported);
        assert_eq!(messenger.sent().len(), 1);
    }

    #[tokio::test]
    async fn send_failure_is_suppressed() {
        let mut messenger = FakeMessenger::new(Rights::CanDelete);
        messenger.fail_sends = true;
        let messenger = Arc::new(messenger);
        let m = moderator(messenger.clone(), FakeOracle::says("Yes, ad."), MentionMatch::Loose);

        assert_eq!(
            m.handle_text(&text(AUTHORIZED, "Buy now")).await,
            TextOutcome::Failed
        );
    }

    #[tokio::test]
    async fn delete_press_removes_original_and_prompt() {
        let messenger = Arc::new(FakeMessenger::new(Rights::CanDelete));
        let m = moderator(messenger.clone(), FakeOracle::says("No."), MentionMatch::Loose);

        let q = delete_press(Some(original()));
        assert_eq!(m.handle_callback(&q).await, CallbackOutcome::Deleted);
        assert_eq!(messenger.deleted(), vec![original(), q.prompt.unwrap()]);
        assert_eq!(messenger.answered(), vec!["cb-1".to_string()]);
        assert_eq!(messenger.member_queries(), 1);
    }

    #[tokio::test]
    async fn delete_press_rechecks_even_with_cached_rights() {
        let messenger = Arc::new(FakeMessenger::new(Rights::CanDelete));
        let m = moderator(messenger.clone(), FakeOracle::says("Yes, ad."), MentionMatch::Loose);

        m.handle_text(&text(AUTHORIZED, "Buy now")).await;
        messenger.set_rights(Rights::CannotDelete);

        let q = delete_press(Some(original()));
        assert_eq!(m.handle_callback(&q).await, CallbackOutcome::NotPermitted);
        assert!(messenger.deleted().is_empty());
        assert_eq!(messenger.answered().len(), 1);
        assert_eq!(messenger.member_queries(), 2);
    }

    #[tokio::test]
    async fn delete_press_without_rights_only_acknowledges() {
        let messenger = Arc::new(FakeMessenger::new(Rights::QueryFails));
        let m = moderator(messenger.clone(), FakeOracle::says("No."), MentionMatch::Loose);

        let q = delete_press(Some(original()));
        assert_eq!(m.handle_callback(&q).await, CallbackOutcome::NotPermitted);
        assert!(messenger.deleted().is_empty());
        assert_eq!(messenger.answered(), vec!["cb-1".to_string()]);
    }

    #[tokio::test]
    async fn delete_press_without_original_only_acknowledges() {
        let messenger = Arc::new(FakeMessenger::new(Rights::CanDelete));
        let m = moderator(messenger.clone(), FakeOracle::says("No."), MentionMatch::Loose);

        assert_eq!(
            m.handle_callback(&delete_press(None)).await,
            CallbackOutcome::NothingToDelete
        );
        assert!(messenger.deleted().is_empty());
        assert_eq!(messenger.answered().len(), 1);
    }

    #[tokio::test]
    async fn delete_failure_still_acknowledges() {
        let mut messenger = FakeMessenger::new(Rights::CanDelete);
        messenger.fail_deletes = true;
        let messenger = Arc::new(messenger);
        let m = moderator(messenger.clone(), FakeOracle::says("No."), MentionMatch::Loose);

        assert_eq!(
            m.handle_callback(&delete_press(Some(original()))).await,
            CallbackOutcome::Failed
        );
        assert_eq!(messenger.answered().len(), 1);
    }

    #[tokio::test]
    async fn other_buttons_are_acknowledged_and_ignored() {
        let messenger = Arc::new(FakeMessenger::new(Rights::CanDelete));
        let m = moderator(messenger.clone(), FakeOracle::says("No."), MentionMatch::Loose);

        let mut q = delete_press(Some(original()));
        q.data = "something_else".to_string();
        assert_eq!(m.handle_callback(&q).await, CallbackOutcome::Ignored);
        assert!(messenger.deleted().is_empty());
        assert_eq!(messenger.member_queries(), 0);
        assert_eq!(messenger.answered().len(), 1);
    }

    #[test]
    fn status_report_wording() {
        assert_eq!(
            status_report(ChatId(-5), true, false),
            "ID группы: -5\nМогу удалить сообщения: Да\nГруппа в вайтлисте: Нет"
        );
    }
}
