use thiserror::Error;

use crate::common::ChatId;

/// Which remote collection a failed fetch was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Directory,
    History,
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resource::Directory => f.write_str("chats"),
            Resource::History => f.write_str("messages"),
        }
    }
}

/// Errors surfaced to the host. None of them are fatal to the client loop.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    #[error("failed to load {resource}: {reason}")]
    LoadFailed { resource: Resource, reason: String },
    #[error("chat {chat_id} is not in the directory")]
    NotFound { chat_id: ChatId },
    #[error("`{event}` dropped: session is not connected")]
    SendDropped { event: String },
    #[error("server error: {message}")]
    TransportError { message: String },
}

impl ClientError {
    pub fn load_failed(resource: Resource, reason: impl ToString) -> Self {
        ClientError::LoadFailed {
            resource,
            reason: reason.to_string(),
        }
    }
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;
