use chrono::{DateTime, Local, Utc};

use crate::common::Chat;

/// Fallback texts for chats the server sent without a name or last message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholders {
    pub chat_name: String,
    pub preview: String,
}

impl Default for Placeholders {
    fn default() -> Self {
        Self {
            chat_name: "Unnamed Chat".to_string(),
            preview: "No messages".to_string(),
        }
    }
}

/// `HH:MM` in local time, empty when there is no timestamp.
pub fn format_time(timestamp: Option<DateTime<Utc>>) -> String {
    timestamp
        .map(|ts| ts.with_timezone(&Local).format("%H:%M").to_string())
        .unwrap_or_default()
}

/// `name | preview | HH:MM`
pub fn line(chat: &Chat, placeholders: &Placeholders) -> String {
    format!(
        "{} | {} | {}",
        chat.display_name(&placeholders.chat_name),
        chat.preview(&placeholders.preview),
        format_time(chat.last_activity())
    )
}

pub fn render(chats: &[Chat], placeholders: &Placeholders) -> Vec<String> {
    if chats.is_empty() {
        return vec!["No chats yet".to_string()];
    }

    let mut lines = vec!["Chats:".to_string()];
    lines.extend(
        chats
            .iter()
            .map(|chat| format!("{:>6}  {}", chat.id, line(chat, placeholders))),
    );
    lines
}
