use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::Utc;

use crate::models::conversation::{sort_conversations, truncate_title, TEMP_ID_PREFIX};
use crate::models::{Conversation, ConversationPatch, Message};
use crate::storage::ConversationStore;

fn temp_id() -> String {
    format!("{}{}", TEMP_ID_PREFIX, uuid::Uuid::new_v4())
}

/// In-memory conversation list and the current conversation's messages,
/// kept in step with a [`ConversationStore`].
///
/// Updates, pins and deletes change memory first and then persist; creates
/// ask the store for an id first. Persistence failures are logged and the
/// in-memory state stands. Records the store refused get a `temp-` id and
/// are not persisted afterwards.
pub struct ConversationManager {
    store: Arc<dyn ConversationStore>,
    conversations: Vec<Conversation>,
    current_id: Option<String>,
    messages: Vec<Message>,
}

impl ConversationManager {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self {
            store,
            conversations: Vec::new(),
            current_id: None,
            messages: Vec::new(),
        }
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn current_id(&self) -> Option<&str> {
        self.current_id.as_deref()
    }

    pub fn current(&self) -> Option<&Conversation> {
        let id = self.current_id.as_deref()?;
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Fetch the conversation list and select the first conversation, if any.
    pub async fn load(&mut self) {
        match self.store.list_conversations().await {
            Ok(conversations) => self.conversations = conversations,
            Err(e) => {
                tracing::error!("Failed to load conversations: {}", e);
                self.conversations.clear();
            }
        }
        sort_conversations(&mut self.conversations);

        match self.conversations.first().map(|c| c.id.clone()) {
            Some(id) => self.select(id).await,
            None => self.clear_current(),
        }
    }

    /// Reload the list from the store, keeping the current selection when it still exists.
    pub async fn refresh(&mut self) {
        let current = self.current_id.clone();
        match self.store.list_conversations().await {
            Ok(conversations) => {
                // Conversations that only exist locally survive a refresh.
                let temporary: Vec<Conversation> = self
                    .conversations
                    .drain(..)
                    .filter(|c| c.is_temporary())
                    .collect();
                self.conversations = conversations;
                self.conversations.extend(temporary);
                sort_conversations(&mut self.conversations);
            }
            Err(e) => tracing::error!("Failed to refresh conversations: {}", e),
        }
        if let Some(id) = current {
            if !self.conversations.iter().any(|c| c.id == id) {
                self.select_next_available().await;
            }
        }
    }

    pub async fn create_conversation(&mut self, title: Option<&str>) -> Conversation {
        let title = truncate_title(title.unwrap_or_default());
        let conversation = match self.store.create_conversation(&title).await {
            Ok(conversation) => conversation,
            Err(e) => {
                tracing::warn!("Failed to create conversation, keeping it local: {}", e);
                Conversation::new(temp_id(), &title)
            }
        };

        self.conversations.push(conversation.clone());
        sort_conversations(&mut self.conversations);
        self.current_id = Some(conversation.id.clone());
        self.messages.clear();
        conversation
    }

    pub async fn switch_conversation(&mut self, id: &str) -> Result<()> {
        if !self.conversations.iter().any(|c| c.id == id) {
            // May have been created by another client since the last listing.
            match self.store.get_conversation(id).await {
                Ok(Some(conversation)) => {
                    self.conversations.push(conversation);
                    sort_conversations(&mut self.conversations);
                }
                Ok(None) => return Err(anyhow!("Conversation not found: {}", id)),
                Err(e) => {
                    tracing::error!("Failed to fetch conversation {}: {}", id, e);
                    return Err(anyhow!("Conversation not found: {}", id));
                }
            }
        }
        self.select(id.to_string()).await;
        Ok(())
    }

    /// Remove a conversation. Deleting the current one moves to the next
    /// available conversation, or clears state when none remain.
    pub async fn delete_conversation(&mut self, id: &str) -> Result<()> {
        let before = self.conversations.len();
        self.conversations.retain(|c| c.id != id);
        if self.conversations.len() == before {
            return Err(anyhow!("Conversation not found: {}", id));
        }

        if self.current_id.as_deref() == Some(id) {
            self.select_next_available().await;
        }

        if !id.starts_with(TEMP_ID_PREFIX) {
            if let Err(e) = self.store.delete_conversation(id).await {
                tracing::error!("Failed to delete conversation {}: {}", id, e);
            }
        }
        Ok(())
    }

    pub async fn update_conversation(&mut self, id: &str, patch: ConversationPatch) -> Result<()> {
        let conversation = self
            .conversations
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| anyhow!("Conversation not found: {}", id))?;
        patch.apply(conversation);
        let temporary = conversation.is_temporary();
        sort_conversations(&mut self.conversations);

        if !temporary {
            if let Err(e) = self.store.update_conversation(id, &patch).await {
                tracing::error!("Failed to update conversation {}: {}", id, e);
            }
        }
        Ok(())
    }

    /// Append a message to the current conversation, creating one titled
    /// after the message when none is active. Returns the stored record.
    pub async fn add_message(&mut self, mut message: Message) -> Message {
        let conversation_id = match &self.current_id {
            Some(id) => id.clone(),
            None => self.create_conversation(Some(&message.content)).await.id,
        };
        message.conversation_id = conversation_id.clone();

        let temporary = conversation_id.starts_with(TEMP_ID_PREFIX);
        if !temporary {
            match self.store.add_message(&message).await {
                Ok(saved) => message.id = saved.id,
                Err(e) => {
                    tracing::warn!("Failed to save message, keeping it local: {}", e);
                    message.id = temp_id();
                }
            }
        }

        self.messages.push(message.clone());
        if let Some(conversation) = self
            .conversations
            .iter_mut()
            .find(|c| c.id == conversation_id)
        {
            conversation.message_count = conversation.message_count.saturating_add(1);
            conversation.updated_at = Utc::now();
        }
        sort_conversations(&mut self.conversations);
        message
    }

    /// Replace a message in memory only. Used for every stream frame.
    pub fn patch_message(&mut self, message: &Message) -> bool {
        match self.messages.iter_mut().find(|m| m.id == message.id) {
            Some(slot) => {
                *slot = message.clone();
                true
            }
            None => false,
        }
    }

    /// Replace a message in memory and persist it.
    pub async fn update_message(&mut self, message: &Message) -> Result<()> {
        if !self.patch_message(message) {
            return Err(anyhow!("Message not found: {}", message.id));
        }
        if message.id.starts_with(TEMP_ID_PREFIX)
            || message.conversation_id.starts_with(TEMP_ID_PREFIX)
        {
            tracing::debug!("Message {} is local only; not persisting", message.id);
            return Ok(());
        }
        if let Err(e) = self.store.update_message(message).await {
            tracing::error!("Failed to update message {}: {}", message.id, e);
        }
        Ok(())
    }

    pub async fn clear_all(&mut self) {
        if let Err(e) = self.store.clear_all().await {
            tracing::error!("Failed to clear conversations: {}", e);
        }
        self.conversations.clear();
        self.clear_current();
    }

    async fn select(&mut self, id: String) {
        self.messages = if id.starts_with(TEMP_ID_PREFIX) {
            Vec::new()
        } else {
            match self.store.list_messages(&id).await {
                Ok(messages) => messages,
                Err(e) => {
                    tracing::error!("Failed to load messages for {}: {}", id, e);
                    Vec::new()
                }
            }
        };
        self.current_id = Some(id);
    }

    async fn select_next_available(&mut self) {
        match self.conversations.first().map(|c| c.id.clone()) {
            Some(next) => self.select(next).await,
            None => self.clear_current(),
        }
    }

    fn clear_current(&mut self) {
        self.current_id = None;
        self.messages.clear();
    }
}
