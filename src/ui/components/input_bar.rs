use crate::common::ChatId;

/// What a line typed at the prompt asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiAction {
    ListChats,
    Open(ChatId),
    Quit,
    /// Composer text for the active chat, already trimmed.
    Send(String),
    Invalid(String),
}

pub fn parse(input: &str) -> Option<UiAction> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    let action = match input.split_once(char::is_whitespace) {
        _ if input == "/chats" => UiAction::ListChats,
        _ if input == "/quit" => UiAction::Quit,
        _ if input == "/open" => UiAction::Invalid("Usage: /open <chat id>".to_string()),
        Some(("/open", id)) => {
            let Ok(chat_id) = id.parse::<ChatId>();
            UiAction::Open(chat_id)
        }
        _ => UiAction::Send(input.to_string()),
    };
    Some(action)
}
