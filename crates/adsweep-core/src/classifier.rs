use std::sync::Arc;

use async_trait::async_trait;

use crate::{domain::ChatId, errors::FailClosed, Result};

/// Affirmative answer prefix. The model is expected to reply "Yes, ..." / "No, ...".
pub const AFFIRMATIVE_PREFIX: &str = "Yes, ";

/// Single-turn, zero-temperature chat completion backend.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send one user message and return the content of the first choice.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

pub fn build_prompt(text: &str) -> String {
    format!("Is the following message a sort of any commercial (ad or job offer)?. Message text: {text}")
}

/// `true` only for content that, once trimmed, starts with [`AFFIRMATIVE_PREFIX`].
pub fn verdict_from_reply(content: &str) -> bool {
    content.trim().starts_with(AFFIRMATIVE_PREFIX)
}

/// Advertisement detector.
///
/// Every call is a fresh request: no retries, no caching. Errors are logged and
/// treated as "not an advertisement".
#[derive(Clone)]
pub struct Classifier {
    client: Arc<dyn CompletionClient>,
}

impl Classifier {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    pub async fn is_advertisement(&self, chat_id: ChatId, text: &str) -> bool {
        self.classify(text)
            .await
            .or_fail_closed("classify", Some(chat_id))
    }

    async fn classify(&self, text: &str) -> Result<bool> {
        let content = self.client.complete(&build_prompt(text)).await?;
        let verdict = verdict_from_reply(&content);
        tracing::debug!(
            verdict,
            reply = %content.chars().take(80).collect::<String>(),
            "classification reply"
        );
        Ok(verdict)
    }
}
