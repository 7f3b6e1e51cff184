use std::{convert::Infallible, sync::Arc};

use anyhow::Context;
use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use adsweep_core::{
    classifier::{Classifier, CompletionClient},
    config::Config,
    messaging::port::MessagingPort,
    moderation::Moderator,
    permissions::PermissionCache,
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub moderator: Arc<Moderator>,
}

/// Every update gets its own task, including updates from the same chat: a slow
/// classification must not hold back later messages or `delete_ad` presses.
fn concurrent_updates(_: &Update) -> Option<Infallible> {
    None
}

/// Resolve the bot identity, wire the moderator and poll until Ctrl-C.
pub async fn run_polling(
    cfg: Arc<Config>,
    completion: Arc<dyn CompletionClient>,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());
    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));

    let me = messenger
        .get_me()
        .await
        .context("failed to resolve bot identity")?;
    tracing::info!(
        username = %me.username,
        whitelisted_chats = cfg.whitelist.len(),
        mention_match = ?cfg.mention_match,
        "adsweep started"
    );

    let permissions = PermissionCache::new(messenger.clone(), me.id, cfg.permission_cache_ttl);
    let moderator = Moderator::new(
        messenger,
        Classifier::new(completion),
        permissions,
        cfg.whitelist.clone(),
        me,
        cfg.mention_match,
    );

    let state = Arc::new(AppState {
        moderator: Arc::new(moderator),
    });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .distribution_function(concurrent_updates)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
