use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] anyhow::Error),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request failed: HTTP {status}: {message}")]
    RequestFailed { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid data: {0}")]
    InvalidData(#[from] serde_json::Error),
}
