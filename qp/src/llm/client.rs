//! LlmClient trait definition

use async_trait::async_trait;

use super::{CompletionRequest, CompletionResponse, LlmError};

/// Stateless LLM client - each call is independent
///
/// No conversation state is kept between calls. A failed call is reported
/// once; callers decide whether to fall back.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a single completion request and wait for the full reply
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}
