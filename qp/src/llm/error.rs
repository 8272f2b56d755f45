//! LLM error types

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during LLM operations
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Rate limited by the provider")]
    RateLimited,

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No LLM credential configured")]
    NotConfigured,
}

impl LlmError {
    /// True when the remote call never produced a usable reply
    ///
    /// Transport failures are recoverable with the offline fallback; a reply
    /// that arrived but could not be read is reported as malformed instead.
    pub fn is_transport(&self) -> bool {
        match self {
            LlmError::RateLimited => true,
            LlmError::ApiError { .. } => true,
            LlmError::Network(_) => true,
            LlmError::Timeout(_) => true,
            LlmError::NotConfigured => true,
            LlmError::InvalidResponse(_) => false,
            LlmError::Json(_) => false,
        }
    }
}
