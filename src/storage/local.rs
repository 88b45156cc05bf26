use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

use super::traits::ConversationStore;
use super::types::StoreError;
use crate::models::conversation::sort_conversations;
use crate::models::{Conversation, ConversationPatch, Message};
use crate::services::database::Database;

pub const CONVERSATIONS_KEY: &str = "finchat:conversations";
pub const MESSAGES_KEY_PREFIX: &str = "finchat:messages:";

pub fn messages_key(conversation_id: &str) -> String {
    format!("{}{}", MESSAGES_KEY_PREFIX, conversation_id)
}

/// Local-only store: the conversation list and each conversation's messages
/// are JSON documents under fixed key prefixes.
pub struct LocalStore {
    db: Database,
    // Serializes read-modify-write cycles on the JSON documents.
    write_lock: Mutex<()>,
}

impl LocalStore {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            write_lock: Mutex::new(()),
        }
    }

    async fn read_json<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T, StoreError> {
        match self.db.get(key).await? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(T::default()),
        }
    }

    async fn write_json<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string(value)?;
        self.db.set(key, &json).await?;
        Ok(())
    }

    async fn load_conversations(&self) -> Result<Vec<Conversation>, StoreError> {
        self.read_json(CONVERSATIONS_KEY).await
    }

    /// Apply `f` to the stored conversation `id` and write the list back.
    async fn modify_conversation<F>(&self, id: &str, f: F) -> Result<Conversation, StoreError>
    where
        F: FnOnce(&mut Conversation) + Send,
    {
        let mut conversations = self.load_conversations().await?;
        let conversation = conversations
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("conversation {}", id)))?;
        f(conversation);
        let updated = conversation.clone();
        self.write_json(CONVERSATIONS_KEY, &conversations).await?;
        Ok(updated)
    }
}

#[async_trait]
impl ConversationStore for LocalStore {
    async fn list_conversations(&self) -> Result<Vec<Conversation>, StoreError> {
        let mut conversations = self.load_conversations().await?;
        sort_conversations(&mut conversations);
        Ok(conversations)
    }

    async fn create_conversation(&self, title: &str) -> Result<Conversation, StoreError> {
        let _guard = self.write_lock.lock().await;
        let conversation = Conversation::new(uuid::Uuid::new_v4().to_string(), title);
        let mut conversations = self.load_conversations().await?;
        conversations.push(conversation.clone());
        self.write_json(CONVERSATIONS_KEY, &conversations).await?;
        Ok(conversation)
    }

    async fn update_conversation(
        &self,
        id: &str,
        patch: &ConversationPatch,
    ) -> Result<Conversation, StoreError> {
        let _guard = self.write_lock.lock().await;
        self.modify_conversation(id, |c| patch.apply(c)).await
    }

    async fn delete_conversation(&self, id: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut conversations = self.load_conversations().await?;
        let before = conversations.len();
        conversations.retain(|c| c.id != id);
        if conversations.len() == before {
            return Err(StoreError::NotFound(format!("conversation {}", id)));
        }
        self.write_json(CONVERSATIONS_KEY, &conversations).await?;
        self.db.remove(&messages_key(id)).await?;
        Ok(())
    }

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, StoreError> {
        self.read_json(&messages_key(conversation_id)).await
    }

    async fn add_message(&self, message: &Message) -> Result<Message, StoreError> {
        let _guard = self.write_lock.lock().await;
        let key = messages_key(&message.conversation_id);
        let mut messages: Vec<Message> = self.read_json(&key).await?;
        messages.push(message.clone());
        let count = messages.len() as u32;

        self.modify_conversation(&message.conversation_id, |c| {
            c.message_count = count;
            c.updated_at = Utc::now();
        })
        .await?;
        self.write_json(&key, &messages).await?;
        Ok(message.clone())
    }

    async fn update_message(&self, message: &Message) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let key = messages_key(&message.conversation_id);
        let mut messages: Vec<Message> = self.read_json(&key).await?;
        let slot = messages
            .iter_mut()
            .find(|m| m.id == message.id)
            .ok_or_else(|| StoreError::NotFound(format!("message {}", message.id)))?;
        *slot = message.clone();
        self.write_json(&key, &messages).await
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.db.remove_prefix(MESSAGES_KEY_PREFIX).await?;
        self.db.remove(CONVERSATIONS_KEY).await?;
        Ok(())
    }
}
