use std::{env, str::FromStr, time::Duration};

use crate::{authorization::AuthorizationList, errors::Error, Result};

pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_PERMISSION_CACHE_TTL: Duration = Duration::from_secs(15 * 60);

/// How a message is recognised as addressed to the bot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MentionMatch {
    /// Any `mention` entity plus the bot username anywhere in the raw text.
    #[default]
    Loose,
    /// A `mention` entity whose referenced text is exactly `@username`.
    Exact,
}

impl FromStr for MentionMatch {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "loose" => Ok(Self::Loose),
            "exact" => Ok(Self::Exact),
            other => Err(Error::Config(format!(
                "MENTION_MATCH must be `loose` or `exact`, got `{other}`"
            ))),
        }
    }
}

/// Typed, process-wide configuration. Read once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_bot_token: String,
    pub openai_api_key: String,
    pub openai_url: String,
    pub openai_model: String,
    pub whitelist: AuthorizationList,
    pub permission_cache_ttl: Duration,
    pub mention_match: MentionMatch,
}

impl Config {
    /// Load from the environment, after pulling in `.env` if one exists.
    ///
    /// Variables already present in the environment take precedence over `.env`.
    pub fn load() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                return Err(Error::Config(format!("failed to read .env: {e}")));
            }
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (the environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let first = |keys: &[&str]| keys.iter().find_map(|&k| lookup(k).and_then(non_empty));

        let telegram_bot_token = first(&["TELEGRAM_TOKEN", "TELEGRAM_BOT_TOKEN"])
            .ok_or_else(|| {
                Error::Config("TELEGRAM_TOKEN environment variable is required".to_string())
            })?;
        let openai_api_key = first(&["OPENAI_TOKEN", "OPENAI_API_KEY"]).ok_or_else(|| {
            Error::Config("OPENAI_TOKEN environment variable is required".to_string())
        })?;

        let openai_url = first(&["OPENAI_URL"]).unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string());
        let openai_model =
            first(&["OPENAI_MODEL"]).unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());

        let whitelist = AuthorizationList::parse_csv(&lookup("WHITELIST").unwrap_or_default());

        let permission_cache_ttl = match first(&["PERMISSION_CACHE_TTL_SECS"]) {
            Some(raw) => Duration::from_secs(raw.trim().parse::<u64>().map_err(|_| {
                Error::Config(format!(
                    "PERMISSION_CACHE_TTL_SECS must be a number of seconds, got `{raw}`"
                ))
            })?),
            None => DEFAULT_PERMISSION_CACHE_TTL,
        };

        let mention_match = first(&["MENTION_MATCH"])
            .map(|s| s.parse::<MentionMatch>())
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            telegram_bot_token,
            openai_api_key,
            openai_url,
            openai_model,
            whitelist,
            permission_cache_ttl,
            mention_match,
        })
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
