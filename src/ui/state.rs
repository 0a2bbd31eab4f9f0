use crate::common::{Chat, ClientContext, ClientEvent, Message};
use crate::network::SessionState;

use super::components::sidebar::Placeholders;
use super::components::{chat_area, sidebar};

/// Local view of the client, rebuilt from the events the loop publishes.
pub struct AppState {
    pub context: ClientContext,
    pub placeholders: Placeholders,
    pub session: SessionState,
    pub chats: Vec<Chat>,
    pub active: Option<Chat>,
    pub messages: Vec<Message>,
    pub typing_visible: bool,
}

impl AppState {
    pub fn new(context: ClientContext, placeholders: Placeholders) -> Self {
        Self {
            context,
            placeholders,
            session: SessionState::Disconnected,
            chats: Vec::new(),
            active: None,
            messages: Vec::new(),
            typing_visible: false,
        }
    }

    /// Folds an event into the view and returns the lines to print.
    pub fn apply(&mut self, event: ClientEvent) -> Vec<String> {
        match event {
            ClientEvent::SessionChanged(state) => {
                self.session = state;
                vec![format!("Session {}", session_label(state))]
            }
            ClientEvent::DirectoryLoaded(chats) => {
                self.chats = chats;
                self.sidebar()
            }
            ClientEvent::ChatSelected(chat) => {
                let header = format!("== {} ==", chat.display_name(&self.placeholders.chat_name));
                self.active = Some(chat);
                self.messages.clear();
                self.typing_visible = false;
                vec![header]
            }
            ClientEvent::TimelineReplaced { chat_id, messages } => {
                if self.active.as_ref().map(|chat| &chat.id) != Some(&chat_id) {
                    return Vec::new();
                }
                self.messages = messages;
                if self.messages.is_empty() {
                    return vec!["No messages yet".to_string()];
                }
                chat_area::render(&self.messages, &self.context)
            }
            ClientEvent::MessageAppended(message) => {
                let line = chat_area::line(&message, &self.context);
                self.messages.push(message);
                vec![line]
            }
            ClientEvent::TypingChanged { chat_id, visible, .. } => {
                let is_active = self.active.as_ref().map(|chat| &chat.id) == Some(&chat_id);
                if !is_active || visible == self.typing_visible {
                    return Vec::new();
                }
                self.typing_visible = visible;
                if visible {
                    vec!["Someone is typing...".to_string()]
                } else {
                    Vec::new()
                }
            }
            ClientEvent::Failed(err) => vec![format!("Error: {err}")],
        }
    }

    pub fn sidebar(&self) -> Vec<String> {
        sidebar::render(&self.chats, &self.placeholders)
    }
}

fn session_label(state: SessionState) -> &'static str {
    match state {
        SessionState::Disconnected => "disconnected",
        SessionState::Connecting => "connecting...",
        SessionState::Connected => "connected",
    }
}
