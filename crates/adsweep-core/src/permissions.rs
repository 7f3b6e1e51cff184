//! Cached answer to "may the bot delete messages in this chat?".
//!
//! Entries expire after a fixed window (15 minutes by default) and are overwritten on
//! every successful refresh. Failed lookups write nothing and answer `false`.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::sync::Mutex;

use crate::{
    domain::{ChatId, UserId},
    errors::FailClosed,
    messaging::port::MessagingPort,
    Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Entry {
    can_delete: bool,
    observed_at: Instant,
}

pub struct PermissionCache {
    messenger: Arc<dyn MessagingPort>,
    bot_id: UserId,
    ttl: Duration,
    entries: Mutex<HashMap<ChatId, Entry>>,
}

impl PermissionCache {
    pub fn new(messenger: Arc<dyn MessagingPort>, bot_id: UserId, ttl: Duration) -> Self {
        Self {
            messenger,
            bot_id,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn can_delete(&self, chat_id: ChatId, force_refresh: bool) -> bool {
        self.check_at(chat_id, force_refresh, Instant::now()).await
    }

    pub async fn check_at(&self, chat_id: ChatId, force_refresh: bool, now: Instant) -> bool {
        if !force_refresh {
            if let Some(hit) = self.cached(chat_id, now).await {
                return hit;
            }
        }

        // The lock is not held across the query; concurrent refreshes for the same
        // chat both write a valid answer and the last one wins.
        self.refresh(chat_id, now)
            .await
            .or_fail_closed("get_chat_member", Some(chat_id))
    }

    async fn cached(&self, chat_id: ChatId, now: Instant) -> Option<bool> {
        let entries = self.entries.lock().await;
        let entry = entries.get(&chat_id)?;
        if now.saturating_duration_since(entry.observed_at) <= self.ttl {
            Some(entry.can_delete)
        } else {
            None
        }
    }

    async fn refresh(&self, chat_id: ChatId, now: Instant) -> Result<bool> {
        let status = self.messenger.get_chat_member(chat_id, self.bot_id).await?;
        let can_delete = status.can_delete_messages.unwrap_or(false);

        let mut entries = self.entries.lock().await;
        let observed_at = match entries.get(&chat_id) {
            Some(prev) if prev.observed_at > now => prev.observed_at,
            _ => now,
        };
        entries.insert(
            chat_id,
            Entry {
                can_delete,
                observed_at,
            },
        );
        tracing::debug!(chat_id = chat_id.0, can_delete, "refreshed delete permission");
        Ok(can_delete)
    }

    #[cfg(test)]
    async fn entry(&self, chat_id: ChatId) -> Option<Entry> {
        self.entries.lock().await.get(&chat_id).copied()
    }
}
