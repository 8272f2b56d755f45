//! LLM access for Question Plus
//!
//! [`LlmGateway`] is what the pipeline uses; [`LlmClient`] is the
//! provider seam behind it.

mod anthropic;
pub mod client;
mod error;
mod gateway;
mod types;

pub use anthropic::AnthropicClient;
pub use client::LlmClient;
pub use error::LlmError;
pub use gateway::{GatewayOutput, LlmGateway, extract_json_object};
pub use types::{CompletionRequest, CompletionResponse, Message, Role, StopReason, TokenUsage};
