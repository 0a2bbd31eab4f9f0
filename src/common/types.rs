use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Identifier as the server sends it: a JSON integer or a JSON string.
///
/// The wire representation is kept so ids echoed back in outbound
/// events match what the server handed out.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Int(i64),
    Text(String),
}

impl fmt::Display for RawId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawId::Int(value) => write!(f, "{value}"),
            RawId::Text(value) => f.write_str(value),
        }
    }
}

impl FromStr for RawId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(match s.parse::<i64>() {
            Ok(value) => RawId::Int(value),
            Err(_) => RawId::Text(s.to_string()),
        })
    }
}

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub RawId);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = std::convert::Infallible;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse().map($name)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                $name(RawId::Int(value))
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                $name(RawId::Text(value.to_string()))
            }
        }
    };
}

id_type!(
    /// Chat identifier.
    ChatId
);
id_type!(
    /// User identifier.
    UserId
);
id_type!(MessageId);

/// Preview of the newest message in a chat, as listed by `GET /chats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default = "default_kind", rename = "type")]
    pub kind: String,
}

/// Snapshot of a chat visible to the current user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub member_count: Option<u32>,
    #[serde(default)]
    pub last_message: Option<LastMessage>,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Chat {
    pub fn display_name<'a>(&'a self, placeholder: &'a str) -> &'a str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => placeholder,
        }
    }

    pub fn preview<'a>(&'a self, placeholder: &'a str) -> &'a str {
        self.last_message
            .as_ref()
            .and_then(|last| last.content.as_deref())
            .unwrap_or(placeholder)
    }

    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.last_message.as_ref().and_then(|last| last.timestamp)
    }
}

/// Message as it appears on the wire.
///
/// History pages omit `chat_id`; live `new_message` events carry it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessagePayload {
    pub id: MessageId,
    #[serde(default)]
    pub chat_id: Option<ChatId>,
    pub user_id: UserId,
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_kind", rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl MessagePayload {
    /// Binds the payload to a chat, preferring the chat id it carries.
    pub fn into_message(self, fallback_chat: &ChatId) -> Message {
        let chat_id = self.chat_id.unwrap_or_else(|| fallback_chat.clone());
        Message {
            id: self.id,
            chat_id,
            sender: self.user_id,
            content: self.content,
            kind: self.kind,
            attachment: self.file_path,
            timestamp: self.timestamp,
        }
    }
}

/// Domain model of one chat message held by the timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub sender: UserId,
    pub content: String,
    pub kind: String,
    pub attachment: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Start/stop signal for a user composing a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingSignal {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub is_typing: bool,
    pub generated_at: DateTime<Utc>,
}

impl TypingSignal {
    pub fn new(chat_id: ChatId, user_id: UserId, is_typing: bool) -> Self {
        Self {
            chat_id,
            user_id,
            is_typing,
            generated_at: Utc::now(),
        }
    }
}

/// The user this client acts for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientContext {
    pub user_id: UserId,
}

impl ClientContext {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }

    pub fn is_self(&self, user_id: &UserId) -> bool {
        &self.user_id == user_id
    }
}

fn default_kind() -> String {
    "text".to_string()
}

/// Accepts RFC 3339 and naive ISO-8601 timestamps; naive ones are UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp `{raw}`")))
}

fn deserialize_optional_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw {
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp `{raw}`"))),
        None => Ok(None),
    }
}
