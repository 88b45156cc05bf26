use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::payload::{ChartPayload, Evidence, TablePayload};

pub const STREAM_ERROR_MESSAGE: &str =
    "Sorry, something went wrong while getting the answer. Please try again.";
pub const STOPPED_MESSAGE: &str = "Generation stopped.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[serde(alias = "assistant")]
    Bot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(alias = "conversationId")]
    pub conversation_id: String,
    pub role: Role,
    #[serde(default, alias = "answer")]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart: Option<ChartPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<TablePayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Vec<Evidence>>,
    #[serde(default, alias = "isStreaming")]
    pub is_streaming: bool,
    #[serde(default, alias = "isThinking")]
    pub is_thinking: bool,
    #[serde(default, alias = "isError")]
    pub is_error: bool,
    #[serde(alias = "timestamp", alias = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn user(conversation_id: &str, content: &str) -> Self {
        Self::new(conversation_id, Role::User, content.to_string())
    }

    /// Bot record created before any content arrives.
    pub fn placeholder(conversation_id: &str) -> Self {
        let mut msg = Self::new(conversation_id, Role::Bot, String::new());
        msg.is_streaming = true;
        msg.is_thinking = true;
        msg
    }

    fn new(conversation_id: &str, role: Role, content: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            role,
            content,
            chart: None,
            table: None,
            evidence: None,
            is_streaming: false,
            is_thinking: false,
            is_error: false,
            created_at: Utc::now(),
        }
    }

    /// Rewrite this message into the terminal error state.
    pub fn fail(&mut self, text: &str) {
        self.content = text.to_string();
        self.is_error = true;
        self.is_streaming = false;
        self.is_thinking = false;
    }

    pub fn finish(&mut self) {
        self.is_streaming = false;
        self.is_thinking = false;
    }

    /// Whether this message belongs in the history sent back to the backend.
    pub fn is_history_turn(&self) -> bool {
        !self.is_error && !self.is_streaming && !self.content.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_flags() {
        let msg = Message::placeholder("c1");
        assert_eq!(msg.role, Role::Bot);
        assert!(msg.is_streaming);
        assert!(msg.is_thinking);
        assert!(msg.content.is_empty());
        assert!(!msg.is_history_turn());
    }

    #[test]
    fn test_fail_clears_streaming() {
        let mut msg = Message::placeholder("c1");
        msg.fail(STREAM_ERROR_MESSAGE);
        assert!(msg.is_error);
        assert!(!msg.is_streaming);
        assert!(!msg.is_thinking);
        assert_eq!(msg.content, STREAM_ERROR_MESSAGE);
        assert!(!msg.is_history_turn());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Bot).unwrap(), "\"bot\"");
        assert_eq!(serde_json::from_str::<Role>("\"assistant\"").unwrap(), Role::Bot);
    }
}
