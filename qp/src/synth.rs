//! Prompt synthesis

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::analysis::AnalysisResult;
use crate::error::PipelineError;
use crate::fallback;
use crate::llm::LlmGateway;
use crate::prompts::PromptLoader;

#[derive(Serialize)]
struct OptimizeContext<'a> {
    question: &'a str,
    question_type: &'a str,
    persona: &'a str,
    method: &'a str,
    key_points: String,
    context: &'a str,
    fragments: &'a [String],
}

/// Builds the optimization prompt and returns the model's finished prompt
pub struct PromptSynthesizer {
    gateway: Arc<LlmGateway>,
    prompts: Arc<PromptLoader>,
}

impl PromptSynthesizer {
    pub fn new(gateway: Arc<LlmGateway>, prompts: Arc<PromptLoader>) -> Self {
        Self { gateway, prompts }
    }

    /// Render the outbound optimization prompt without sending it
    pub fn render(&self, question: &str, analysis: &AnalysisResult, fragments: &[String]) -> Result<String, PipelineError> {
        self.prompts
            .render(
                "optimize",
                &OptimizeContext {
                    question,
                    question_type: &analysis.question_type,
                    persona: &analysis.persona,
                    method: &analysis.method,
                    key_points: analysis.key_points.join(", "),
                    context: &analysis.context,
                    fragments,
                },
            )
            .map_err(|e| PipelineError::Template(e.to_string()))
    }

    /// Produce the optimized prompt
    ///
    /// The model's reply is returned unmodified. Offline gateways use the
    /// deterministic generator. Any gateway failure is `GenerationFailed`.
    pub async fn synthesize(
        &self,
        question: &str,
        analysis: &AnalysisResult,
        fragments: &[String],
    ) -> Result<String, PipelineError> {
        debug!(fragment_count = fragments.len(), "PromptSynthesizer::synthesize: called");
        if self.gateway.is_offline() {
            info!("Offline: generating prompt locally");
            return Ok(fallback::fallback_prompt(question, analysis, fragments));
        }

        let prompt = self.render(question, analysis, fragments)?;
        let output = self
            .gateway
            .invoke(&prompt, None)
            .await
            .map_err(PipelineError::GenerationFailed)?;

        let text = output.into_text();
        info!(prompt_len = text.len(), "Optimized prompt generated");
        Ok(text)
    }
}
