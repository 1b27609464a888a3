use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who authored a [`Message`].
///
/// Older records used `"bot"` for assistant replies; it is still accepted on
/// input and normalised to [`Sender::Assistant`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    #[strum(to_string = "user")]
    User,
    #[serde(alias = "bot")]
    #[strum(to_string = "assistant", serialize = "bot")]
    Assistant,
}

impl Sender {
    /// Role name used by OpenAI-compatible chat completion APIs.
    pub fn role(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Assistant => "assistant",
        }
    }
}

/// A conversation owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    pub title: String,
    /// Instruction sent as the `system` turn in plain mode.
    pub system_message: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    /// Set whenever the title or system message is rewritten.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A single persisted chat turn. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub content: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
}

/// A message that has not been stored yet; the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub chat_id: String,
    pub content: String,
    pub sender: Sender,
    pub user_id: String,
}

impl NewMessage {
    pub fn user(chat_id: impl Into<String>, user_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            content: content.into(),
            sender: Sender::User,
            user_id: user_id.into(),
        }
    }

    pub fn assistant(chat_id: impl Into<String>, user_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            content: content.into(),
            sender: Sender::Assistant,
            user_id: user_id.into(),
        }
    }
}

/// Selects which chats a listing or subscription sees.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatFilter {
    /// Restrict to chats owned by this user. `None` matches every chat.
    pub user_id: Option<String>,
}

impl ChatFilter {
    pub fn owned_by(user_id: impl Into<String>) -> Self {
        Self { user_id: Some(user_id.into()) }
    }
}
