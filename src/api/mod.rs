pub mod client;
#[cfg(test)]
pub(crate) mod mock_server;
pub mod stream;
pub mod types;

pub use client::{ChatBackend, ChatClient};
pub use types::{ChatRequest, Frame, StreamEvent};
