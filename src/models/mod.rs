pub mod conversation;
pub mod message;
pub mod payload;

pub use conversation::{Conversation, ConversationPatch};
pub use message::{Message, Role};
pub use payload::{ChartPayload, ChartSeries, Evidence, TablePayload};
