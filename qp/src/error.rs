//! Pipeline error types

use historystore::HistoryError;
use thiserror::Error;

use crate::llm::LlmError;
use crate::options::SchemaError;
use crate::session::Ticket;

/// Errors surfaced by the analysis/generation pipeline and the session
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Question is empty")]
    EmptyQuestion,

    #[error("LLM transport error: {0}")]
    Transport(#[source] LlmError),

    #[error("Malformed analysis: {0}")]
    MalformedAnalysis(String),

    #[error("Invalid option schema: {0}")]
    InvalidSchema(#[from] SchemaError),

    #[error("Prompt generation failed: {0}")]
    GenerationFailed(#[source] LlmError),

    #[error("Cannot {action} while in {state}")]
    InvalidTransition { state: &'static str, action: &'static str },

    #[error("Busy: a request is already in flight ({state})")]
    Busy { state: &'static str },

    #[error("Stale response for {ticket}, current epoch is {current}")]
    StaleResponse { ticket: Ticket, current: u64 },

    #[error("Template error: {0}")]
    Template(String),

    #[error("History error: {0}")]
    History(#[from] HistoryError),
}

impl PipelineError {
    /// Errors recovered by substituting the offline fallback analysis
    pub fn is_recoverable_analysis(&self) -> bool {
        matches!(self, PipelineError::Transport(_) | PipelineError::MalformedAnalysis(_))
    }
}

impl From<LlmError> for PipelineError {
    fn from(err: LlmError) -> Self {
        if err.is_transport() {
            PipelineError::Transport(err)
        } else {
            PipelineError::MalformedAnalysis(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_llm_error_classification() {
        let err: PipelineError = LlmError::Timeout(Duration::from_secs(1)).into();
        assert!(matches!(err, PipelineError::Transport(_)));
        assert!(err.is_recoverable_analysis());

        let err: PipelineError = LlmError::InvalidResponse("no JSON object in reply".to_string()).into();
        assert!(matches!(err, PipelineError::MalformedAnalysis(_)));
        assert!(err.is_recoverable_analysis());
    }

    #[test]
    fn test_generation_and_schema_errors_are_not_recoverable() {
        assert!(!PipelineError::GenerationFailed(LlmError::NotConfigured).is_recoverable_analysis());
        assert!(!PipelineError::InvalidSchema(SchemaError::Empty).is_recoverable_analysis());
        assert!(!PipelineError::EmptyQuestion.is_recoverable_analysis());
    }
}
