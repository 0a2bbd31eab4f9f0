use async_trait::async_trait;
use serde::Deserialize;

use crate::common::types::MessagePayload;
use crate::common::{Chat, ChatId, Message, UserId};
use crate::error::{ClientError, Resource, Result};

/// The two HTTP reads the chat client depends on.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// `GET /chats?user_id=`; the whole list or `LoadFailed`.
    async fn fetch_chats(&self, user_id: &UserId) -> Result<Vec<Chat>>;

    /// `GET /chats/{id}/messages`, in server order (newest first).
    async fn fetch_messages(&self, chat_id: &ChatId) -> Result<Vec<Message>>;
}

#[derive(Debug, Deserialize)]
struct ChatsResponse {
    chats: Vec<Chat>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    messages: Vec<MessagePayload>,
}

pub struct HttpChatApi {
    http: reqwest::Client,
    base_url: String,
    per_page: u32,
}

impl HttpChatApi {
    pub fn new(http: reqwest::Client, base_url: &str, per_page: u32) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            per_page,
        }
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn fetch_chats(&self, user_id: &UserId) -> Result<Vec<Chat>> {
        let failed = |err: reqwest::Error| ClientError::load_failed(Resource::Directory, err);
        let user_id = user_id.to_string();

        let response: ChatsResponse = self
            .http
            .get(format!("{}/chats", self.base_url))
            .query(&[("user_id", user_id.as_str())])
            .send()
            .await
            .map_err(failed)?
            .error_for_status()
            .map_err(failed)?
            .json()
            .await
            .map_err(failed)?;

        log::debug!("Fetched {} chats for user {user_id}", response.chats.len());
        Ok(response.chats)
    }

    async fn fetch_messages(&self, chat_id: &ChatId) -> Result<Vec<Message>> {
        let failed = |err: reqwest::Error| ClientError::load_failed(Resource::History, err);

        let response: MessagesResponse = self
            .http
            .get(format!("{}/chats/{chat_id}/messages", self.base_url))
            .query(&[("page", 1), ("per_page", self.per_page)])
            .send()
            .await
            .map_err(failed)?
            .error_for_status()
            .map_err(failed)?
            .json()
            .await
            .map_err(failed)?;

        Ok(response
            .messages
            .into_iter()
            .map(|payload| payload.into_message(chat_id))
            .collect())
    }
}
