use crate::common::{Chat, ChatId, UserId};
use crate::error::{ClientError, Result};
use crate::network::ChatApi;

/// Chats visible to the current user, as of the last successful load.
#[derive(Debug, Default)]
pub struct ChatDirectory {
    chats: Vec<Chat>,
    selected: Option<ChatId>,
}

impl ChatDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetches the directory and replaces it wholesale. On failure the
    /// previous directory is left untouched.
    pub async fn load(&mut self, api: &dyn ChatApi, user_id: &UserId) -> Result<&[Chat]> {
        match api.fetch_chats(user_id).await {
            Ok(chats) => {
                log::info!("Loaded {} chats for user {user_id}", chats.len());
                self.replace(chats);
                Ok(&self.chats)
            }
            Err(err) => {
                log::warn!("Directory load for user {user_id} failed: {err}");
                Err(err)
            }
        }
    }

    pub fn replace(&mut self, chats: Vec<Chat>) {
        self.chats = chats;
        if let Some(selected) = &self.selected {
            if !self.chats.iter().any(|chat| &chat.id == selected) {
                log::debug!("Selected chat {selected} left the directory");
                self.selected = None;
            }
        }
    }

    pub fn select(&mut self, chat_id: &ChatId) -> Result<&Chat> {
        let Some(chat) = self.chats.iter().find(|chat| &chat.id == chat_id) else {
            return Err(ClientError::NotFound {
                chat_id: chat_id.clone(),
            });
        };
        self.selected = Some(chat.id.clone());
        Ok(chat)
    }

    pub fn get(&self, chat_id: &ChatId) -> Option<&Chat> {
        self.chats.iter().find(|chat| &chat.id == chat_id)
    }

    pub fn selected(&self) -> Option<&Chat> {
        self.selected.as_ref().and_then(|id| self.get(id))
    }

    pub fn chats(&self) -> &[Chat] {
        &self.chats
    }

    pub fn len(&self) -> usize {
        self.chats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }
}
