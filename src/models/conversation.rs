use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_TITLE_CHARS: usize = 50;
pub const DEFAULT_TITLE: &str = "New Chat";
pub const TEMP_ID_PREFIX: &str = "temp-";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    #[serde(alias = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(alias = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, alias = "isPinned")]
    pub is_pinned: bool,
    #[serde(default, alias = "messageCount")]
    pub message_count: u32,
}

impl Conversation {
    pub fn new(id: String, title: &str) -> Self {
        let now = Utc::now();
        Self {
            id,
            title: truncate_title(title),
            created_at: now,
            updated_at: now,
            is_pinned: false,
            message_count: 0,
        }
    }

    /// Whether this conversation only exists locally because the store rejected it.
    pub fn is_temporary(&self) -> bool {
        self.id.starts_with(TEMP_ID_PREFIX)
    }
}

/// Partial update applied by rename and pin operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", alias = "isPinned")]
    pub is_pinned: Option<bool>,
}

impl ConversationPatch {
    pub fn apply(&self, conversation: &mut Conversation) {
        if let Some(title) = &self.title {
            conversation.title = truncate_title(title);
        }
        if let Some(pinned) = self.is_pinned {
            conversation.is_pinned = pinned;
        }
        conversation.updated_at = Utc::now();
    }
}

/// Truncate text to a short title for conversations.
pub fn truncate_title(text: &str) -> String {
    let first_line = text.trim().lines().next().unwrap_or_default().trim();
    if first_line.is_empty() {
        return DEFAULT_TITLE.to_string();
    }
    if first_line.chars().count() > MAX_TITLE_CHARS {
        let head: String = first_line.chars().take(MAX_TITLE_CHARS - 3).collect();
        format!("{}...", head)
    } else {
        first_line.to_string()
    }
}

/// Order used everywhere a conversation list is shown: pinned first, newest first.
pub fn sort_conversations(conversations: &mut [Conversation]) {
    conversations.sort_by(|a, b| {
        b.is_pinned
            .cmp(&a.is_pinned)
            .then_with(|| b.updated_at.cmp(&a.updated_at))
    });
}
