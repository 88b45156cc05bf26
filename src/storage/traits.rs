use async_trait::async_trait;

use super::types::StoreError;
use crate::models::{Conversation, ConversationPatch, Message};

/// Persistence for conversations and their messages.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn list_conversations(&self) -> Result<Vec<Conversation>, StoreError>;

    async fn create_conversation(&self, title: &str) -> Result<Conversation, StoreError>;

    async fn update_conversation(
        &self,
        id: &str,
        patch: &ConversationPatch,
    ) -> Result<Conversation, StoreError>;

    async fn delete_conversation(&self, id: &str) -> Result<(), StoreError>;

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, StoreError>;

    /// Persist a new message. The returned record carries the id the store assigned.
    async fn add_message(&self, message: &Message) -> Result<Message, StoreError>;

    async fn update_message(&self, message: &Message) -> Result<(), StoreError>;

    async fn clear_all(&self) -> Result<(), StoreError>;

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, StoreError> {
        Ok(self
            .list_conversations()
            .await?
            .into_iter()
            .find(|c| c.id == id))
    }
}
