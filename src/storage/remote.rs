use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use super::traits::ConversationStore;
use super::types::StoreError;
use crate::config::{endpoint, CONVERSATIONS_PATH};
use crate::models::{Conversation, ConversationPatch, Message};

/// Backend-proxied store talking to the conversation REST endpoints.
pub struct RemoteStore {
    client: Client,
    base_url: url::Url,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(alias = "error", alias = "message")]
    detail: String,
}

impl RemoteStore {
    pub fn new(base_url: url::Url, timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::NetworkError(e.to_string()))?;
        Ok(Self { client, base_url })
    }

    fn conversations_url(&self) -> String {
        endpoint(&self.base_url, CONVERSATIONS_PATH)
    }

    fn conversation_url(&self, id: &str) -> String {
        format!("{}/{}", self.conversations_url(), id)
    }

    fn messages_url(&self, conversation_id: &str) -> String {
        format!("{}/messages", self.conversation_url(conversation_id))
    }

    async fn send(&self, req: RequestBuilder, what: &str) -> Result<reqwest::Response, StoreError> {
        let response = req
            .send()
            .await
            .map_err(|e| StoreError::NetworkError(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(what.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::RequestFailed {
                status: status.as_u16(),
                message: parse_error_message(&body),
            });
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        what: &str,
    ) -> Result<T, StoreError> {
        let response = self.send(req, what).await?;
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::NetworkError(e.to_string()))?;
        Ok(serde_json::from_str(&body)?)
    }
}

fn parse_error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.detail,
        Err(_) if body.trim().is_empty() => "Request failed".to_string(),
        Err(_) => body.trim().chars().take(200).collect(),
    }
}

#[async_trait]
impl ConversationStore for RemoteStore {
    async fn list_conversations(&self) -> Result<Vec<Conversation>, StoreError> {
        let mut conversations: Vec<Conversation> = self
            .send_json(self.client.get(self.conversations_url()), "conversations")
            .await?;
        crate::models::conversation::sort_conversations(&mut conversations);
        Ok(conversations)
    }

    async fn create_conversation(&self, title: &str) -> Result<Conversation, StoreError> {
        let req = self
            .client
            .post(self.conversations_url())
            .json(&json!({ "title": crate::models::conversation::truncate_title(title) }));
        self.send_json(req, "conversations").await
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, StoreError> {
        match self
            .send_json(self.client.get(self.conversation_url(id)), id)
            .await
        {
            Ok(conversation) => Ok(Some(conversation)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn update_conversation(
        &self,
        id: &str,
        patch: &ConversationPatch,
    ) -> Result<Conversation, StoreError> {
        let req = self.client.patch(self.conversation_url(id)).json(patch);
        self.send_json(req, id).await
    }

    async fn delete_conversation(&self, id: &str) -> Result<(), StoreError> {
        self.send(self.client.delete(self.conversation_url(id)), id)
            .await?;
        Ok(())
    }

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, StoreError> {
        self.send_json(
            self.client.get(self.messages_url(conversation_id)),
            conversation_id,
        )
        .await
    }

    async fn add_message(&self, message: &Message) -> Result<Message, StoreError> {
        let req = self
            .client
            .post(self.messages_url(&message.conversation_id))
            .json(message);
        let response = self.send(req, &message.conversation_id).await?;
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::NetworkError(e.to_string()))?;

        // Some backends answer with an empty body or just an id.
        match serde_json::from_str::<Message>(&body) {
            Ok(saved) => Ok(saved),
            Err(_) => Ok(message.clone()),
        }
    }

    async fn update_message(&self, message: &Message) -> Result<(), StoreError> {
        let url = format!(
            "{}/{}",
            self.messages_url(&message.conversation_id),
            message.id
        );
        self.send(self.client.put(url).json(message), &message.id)
            .await?;
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        for conversation in self.list_conversations().await? {
            self.delete_conversation(&conversation.id).await?;
        }
        Ok(())
    }
}
