use crate::domain::ChatId;

/// Core error type.
///
/// Adapter crates map their specific errors into this type. At runtime none of these
/// reach the user: call sites downgrade them through [`FailClosed`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("classification error: {0}")]
    Oracle(String),

    #[error("permission query failed: {0}")]
    PermissionQuery(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Downgrade a fallible yes/no answer to `false`, logging the failure.
///
/// Used for both capability checks and advertisement verdicts: an error never
/// grants deletion rights and never flags a message.
pub trait FailClosed {
    fn or_fail_closed(self, operation: &str, chat_id: Option<ChatId>) -> bool;
}

impl FailClosed for Result<bool> {
    fn or_fail_closed(self, operation: &str, chat_id: Option<ChatId>) -> bool {
        match self {
            Ok(v) => v,
            Err(e) => {
                match chat_id {
                    Some(chat) => tracing::warn!(chat_id = chat.0, operation, error = %e, "failing closed"),
                    None => tracing::warn!(operation, error = %e, "failing closed"),
                }
                false
            }
        }
    }
}
