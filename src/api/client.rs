use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::mpsc;

use super::stream::parse_frame_stream;
use super::types::{ApiError, ChatRequest, StreamEvent};
use crate::config::{endpoint, CHAT_PATH};

/// Source of streamed answers.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send the request and forward every stream event to `tx`. An `Err`
    /// means the request never produced a readable body.
    async fn stream_chat(
        &self,
        request: ChatRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ApiError>;
}

pub struct ChatClient {
    client: Client,
    chat_url: String,
}

impl ChatClient {
    pub fn new(base_url: &url::Url, connect_timeout: Duration) -> Result<Self, ApiError> {
        // No overall timeout: answers stream for as long as the backend needs.
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| ApiError::NetworkError(e.to_string()))?;
        Ok(Self {
            client,
            chat_url: endpoint(base_url, CHAT_PATH),
        })
    }

    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }
}

#[async_trait]
impl ChatBackend for ChatClient {
    async fn stream_chat(
        &self,
        request: ChatRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ApiError> {
        tracing::debug!(
            "POST {} ({} history turns)",
            self.chat_url,
            request.conversation_history.len()
        );

        let response = self
            .client
            .post(&self.chat_url)
            .header("accept", "text/event-stream")
            .json(&request)
            .send()
            .await
            .map_err(|e| ApiError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::RequestFailed {
                status: status.as_u16(),
                message: body.trim().chars().take(200).collect(),
            });
        }

        parse_frame_stream(response.bytes_stream(), tx).await;

        Ok(())
    }
}
