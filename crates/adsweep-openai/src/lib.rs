//! OpenAI adapter (advertisement classification).
//!
//! Uses the `chat/completions` endpoint with a single user message at temperature 0.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use adsweep_core::{classifier::CompletionClient, errors::Error, Result};

#[derive(Clone, Debug)]
pub struct OpenAiClient {
    api_key: String,
    url: String,
    model: String,
    http: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    /// No timeout is configured beyond reqwest's defaults.
    pub fn new(
        api_key: impl Into<String>,
        url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            url: url.into(),
            model: model.into(),
            http: reqwest::Client::new(),
        }
    }

    fn request_body<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            temperature: 0.0,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
        }
    }
}

/// First choice's content; a missing `content` reads as empty.
fn first_choice_content(body: &str) -> Result<String> {
    let parsed: ChatResponse = serde_json::from_str(body)?;
    parsed
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content.unwrap_or_default())
        .ok_or_else(|| Error::Oracle("openai response has no choices".to_string()))
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let resp = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| Error::Oracle(format!("openai request error: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::Oracle(format!("openai read error: {e}")))?;

        if !status.is_success() {
            return Err(Error::Oracle(format!(
                "openai completion failed: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        first_choice_content(&body).map_err(|e| match e {
            Error::Json(e) => Error::Oracle(format!("openai json error: {e}")),
            other => other,
        })
    }
}
