use crate::error::ClientError;
use crate::network::SessionState;

use super::types::{Chat, ChatId, Message, UserId};

/// Notifications the chat client loop publishes to the host front-end.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    SessionChanged(SessionState),
    DirectoryLoaded(Vec<Chat>),
    /// The active chat changed; the timeline is empty until history arrives.
    ChatSelected(Chat),
    /// Full timeline replacement, oldest first.
    TimelineReplaced { chat_id: ChatId, messages: Vec<Message> },
    MessageAppended(Message),
    TypingChanged {
        chat_id: ChatId,
        visible: bool,
        typists: Vec<UserId>,
    },
    Failed(ClientError),
}
