pub mod chart_view;
pub mod markdown;
pub mod message_view;
pub mod sidebar;
pub mod table_view;
pub mod terminal;
pub mod theme;

pub use message_view::render_message;
pub use sidebar::render_conversation_list;
pub use table_view::TableLayout;
pub use terminal::TerminalView;
pub use theme::Theme;
