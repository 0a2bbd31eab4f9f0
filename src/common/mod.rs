pub mod commands;
pub mod events;
pub mod types;

pub use commands::ClientCommand;
pub use events::ClientEvent;
pub use types::{Chat, ChatId, ClientContext, LastMessage, Message, MessageId, TypingSignal, UserId};
