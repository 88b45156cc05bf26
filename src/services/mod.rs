pub mod chat;
pub mod conversation;
pub mod database;
pub mod export;
pub mod settings;
pub mod tables;
pub mod typing;

pub use chat::ChatPipeline;
pub use conversation::ConversationManager;
pub use database::Database;
pub use settings::{AppSettings, SettingsService};
