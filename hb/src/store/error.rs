//! Store error types

use std::time::Duration;
use thiserror::Error;

use crate::domain::TaskId;

/// Errors from remote store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failure reported by the store, shown to the user verbatim
    #[error("{0}")]
    Remote(String),

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Task not found: {0}")]
    NotFound(TaskId),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Check if this is a timeout, ours or the HTTP client's
    pub fn is_timeout(&self) -> bool {
        match self {
            StoreError::Timeout(_) => true,
            StoreError::Network(e) => e.is_timeout(),
            _ => false,
        }
    }
}
