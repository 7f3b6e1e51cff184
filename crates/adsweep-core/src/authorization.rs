use std::collections::HashSet;

use crate::domain::ChatId;

/// Chats in which moderation prompts may be sent (`WHITELIST`).
///
/// Entries are kept as normalized strings and chat ids are compared by their
/// decimal representation: `"-100123"`, `" -100123 "` and `"-0100123"` all match
/// `ChatId(-100123)`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthorizationList {
    entries: HashSet<String>,
}

impl AuthorizationList {
    pub fn parse_csv(raw: &str) -> Self {
        raw.split(',').collect()
    }

    pub fn contains(&self, chat_id: ChatId) -> bool {
        self.entries.contains(&chat_id.0.to_string())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for AuthorizationList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let entries = iter
            .into_iter()
            .filter_map(|s| normalize(s.as_ref()))
            .collect();
        Self { entries }
    }
}

fn normalize(entry: &str) -> Option<String> {
    let entry = entry.trim();
    if entry.is_empty() {
        return None;
    }
    Some(match entry.parse::<i64>() {
        Ok(n) => n.to_string(),
        Err(_) => entry.to_string(),
    })
}
