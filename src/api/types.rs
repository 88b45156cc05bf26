use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{ChartPayload, Evidence, Message, Role, TablePayload};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request failed: HTTP {status}: {message}")]
    RequestFailed { status: u16, message: String },

    #[error("Stream error: {0}")]
    StreamError(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

/// Body of the chat endpoint request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub message: String,
    pub conversation_history: Vec<HistoryEntry>,
}

impl ChatRequest {
    pub fn new(message: &str, history: &[Message]) -> Self {
        Self {
            message: message.to_string(),
            conversation_history: history
                .iter()
                .filter(|m| m.is_history_turn())
                .map(|m| HistoryEntry {
                    role: m.role,
                    content: m.content.clone(),
                })
                .collect(),
        }
    }
}

/// One parsed `data:` event from the chat stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Full answer so far; replaces what was accumulated.
    Text(String),
    Table(TablePayload),
    Chart(ChartPayload),
    Evidence(Vec<Evidence>),
    Thinking(Option<String>),
    /// Failure reported by the server inside the stream.
    Error(String),
    Done,
}

impl Frame {
    pub fn carries_content(&self) -> bool {
        matches!(
            self,
            Frame::Text(_) | Frame::Table(_) | Frame::Chart(_) | Frame::Evidence(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Frame(Frame),
    Failed(String),
}
