use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::common::{ChatId, TypingSignal, UserId};

pub const JOIN_CHAT: &str = "join_chat";
pub const SEND_MESSAGE: &str = "send_message";
pub const TYPING: &str = "typing";

pub const NEW_MESSAGE: &str = "new_message";
pub const USER_TYPING: &str = "user_typing";
pub const ERROR: &str = "error";
pub const JOIN_SUCCESS: &str = "join_success";
pub const CONNECTED: &str = "connected";

/// One realtime event on the wire: `{"event": name, "data": payload}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Frame {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

/// Events this client sends to the server.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    JoinChat {
        chat_id: ChatId,
        user_id: UserId,
    },
    SendMessage {
        chat_id: ChatId,
        user_id: UserId,
        content: String,
        kind: String,
    },
    Typing(TypingSignal),
}

impl Outbound {
    pub fn event(&self) -> &'static str {
        match self {
            Outbound::JoinChat { .. } => JOIN_CHAT,
            Outbound::SendMessage { .. } => SEND_MESSAGE,
            Outbound::Typing(_) => TYPING,
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            Outbound::JoinChat { chat_id, user_id } => json!({
                "chat_id": chat_id,
                "user_id": user_id,
            }),
            Outbound::SendMessage {
                chat_id,
                user_id,
                content,
                kind,
            } => json!({
                "chat_id": chat_id,
                "user_id": user_id,
                "content": content,
                "type": kind,
            }),
            Outbound::Typing(signal) => json!({
                "chat_id": signal.chat_id,
                "user_id": signal.user_id,
                "is_typing": signal.is_typing,
            }),
        }
    }
}

/// Payload of `user_typing`. The server may omit `chat_id`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TypingPayload {
    #[serde(default)]
    pub chat_id: Option<ChatId>,
    pub user_id: UserId,
    #[serde(default)]
    pub is_typing: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub message: String,
}
