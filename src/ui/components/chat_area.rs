use crate::common::{ClientContext, Message};

use super::sidebar::format_time;

pub const ATTACHMENT_MARKER: &str = "📎 Attachment";

pub fn line(message: &Message, context: &ClientContext) -> String {
    let author = if context.is_self(&message.sender) {
        "You"
    } else {
        "User"
    };
    let mut line = format!(
        "[{}] {author}: {}",
        format_time(Some(message.timestamp)),
        message.content
    );
    if message.attachment.is_some() {
        line.push(' ');
        line.push_str(ATTACHMENT_MARKER);
    }
    line
}

pub fn render(messages: &[Message], context: &ClientContext) -> Vec<String> {
    messages.iter().map(|message| line(message, context)).collect()
}
