use serde::{Deserialize, Serialize};

use crate::common::{ChatId, Message};
use crate::error::Result;
use crate::network::ChatApi;

/// What happens to a history fetch that was overtaken by a newer selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaleHistoryPolicy {
    /// Let it finish and ignore its response.
    Discard,
    /// Also abort the in-flight fetch task.
    Abort,
}

/// Ticket for one history fetch. Only the newest ticket may fill the timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    pub chat_id: ChatId,
    generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryApply {
    Applied(usize),
    Stale,
}

/// Ordered messages of the active chat, oldest first.
#[derive(Debug, Default)]
pub struct MessageTimeline {
    active: Option<ChatId>,
    generation: u64,
    messages: Vec<Message>,
}

impl MessageTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `chat_id` active and empties the timeline until its history lands.
    pub fn begin_load(&mut self, chat_id: ChatId) -> HistoryRequest {
        self.generation += 1;
        self.active = Some(chat_id.clone());
        self.messages.clear();
        HistoryRequest {
            chat_id,
            generation: self.generation,
        }
    }

    pub fn is_current(&self, request: &HistoryRequest) -> bool {
        request.generation == self.generation && self.active.as_ref() == Some(&request.chat_id)
    }

    /// Applies a history page (server order, newest first) if `request` is
    /// still the newest one; errors of stale requests are swallowed.
    pub fn complete_load(
        &mut self,
        request: HistoryRequest,
        result: Result<Vec<Message>>,
    ) -> Result<HistoryApply> {
        if !self.is_current(&request) {
            log::debug!(
                "Discarding stale history for chat {} (generation {})",
                request.chat_id,
                request.generation
            );
            return Ok(HistoryApply::Stale);
        }

        let mut messages = result?;
        messages.reverse();
        self.messages = messages;
        log::debug!(
            "Timeline for chat {} holds {} messages",
            request.chat_id,
            self.messages.len()
        );
        Ok(HistoryApply::Applied(self.messages.len()))
    }

    /// Sequential form of `begin_load` + fetch + `complete_load`.
    pub async fn load_history(&mut self, api: &dyn ChatApi, chat_id: ChatId) -> Result<&[Message]> {
        let request = self.begin_load(chat_id);
        let result = api.fetch_messages(&request.chat_id).await;
        self.complete_load(request, result)?;
        Ok(&self.messages)
    }

    /// Appends a live message if it belongs to the active chat.
    pub fn append(&mut self, message: Message) -> bool {
        if self.active.as_ref() != Some(&message.chat_id) {
            log::debug!(
                "Dropping message {} for inactive chat {}",
                message.id,
                message.chat_id
            );
            return false;
        }
        self.messages.push(message);
        true
    }

    pub fn active_chat(&self) -> Option<&ChatId> {
        self.active.as_ref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
