use super::types::ChatId;

/// Commands the host front-end sends to the chat client loop.
#[derive(Debug, Clone)]
pub enum ClientCommand {
    /// Re-fetch the chat directory for the current user.
    ReloadDirectory,
    /// Make a chat active: join it and load its history.
    SelectChat(ChatId),
    /// The user edited the composer of the active chat.
    Typing,
    SendMessage(String),
    /// (Re)open the realtime session.
    Connect,
    Disconnect,
}
