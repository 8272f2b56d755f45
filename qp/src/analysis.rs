//! Question analysis
//!
//! Asks the model for a semantic profile of the question (persona, method,
//! key points) and, in detailed mode, a tailored option schema.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::config::AnalysisConfig;
use crate::error::PipelineError;
use crate::fallback;
use crate::llm::{GatewayOutput, LlmError, LlmGateway};
use crate::options::{OptionSchema, keys};
use crate::prompts::PromptLoader;

static ACADEMIC_TERMS: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)レポート|課題|論文|提出|授業|大学|卒論|\b(?:report|assignment|thesis|essay|homework|submission|course|university|college|professor|seminar)s?\b",
    )
    .ok()
});

/// True if the question reads like schoolwork
pub fn detect_academic(question: &str) -> bool {
    ACADEMIC_TERMS.as_ref().is_some_and(|re| re.is_match(question))
}

/// How much analysis to request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    /// Profile only, straight to generation
    Quick,
    /// Profile plus customization options
    Detailed,
}

impl AnalysisMode {
    fn template(&self) -> &'static str {
        match self {
            AnalysisMode::Quick => "analysis-quick",
            AnalysisMode::Detailed => "analysis-detailed",
        }
    }
}

/// Semantic profile of one question
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub persona: String,
    pub method: String,
    pub key_points: Vec<String>,
    pub context: String,
    pub question_type: String,
    pub option_schema: Option<OptionSchema>,
}

#[derive(Debug, Deserialize)]
struct RawAnalysis {
    persona: String,
    method: String,
    #[serde(default)]
    key_points: Vec<String>,
    #[serde(default)]
    context: String,
    #[serde(default)]
    question_type: String,
    #[serde(default)]
    custom_options: Option<Value>,
}

#[derive(Serialize)]
struct AnalysisContext<'a> {
    question: &'a str,
    academic: bool,
    min_options: usize,
    max_options: usize,
}

/// Shape hint sent along with analysis prompts
fn response_schema(mode: AnalysisMode) -> Value {
    let mut schema = json!({
        "type": "object",
        "required": ["persona", "method", "key_points", "context", "question_type"],
        "properties": {
            "persona": { "type": "string" },
            "method": { "type": "string" },
            "key_points": { "type": "array", "items": { "type": "string" } },
            "context": { "type": "string" },
            "question_type": { "type": "string" }
        }
    });

    if mode == AnalysisMode::Detailed {
        schema["required"] = json!(["persona", "method", "key_points", "context", "question_type", "custom_options"]);
        schema["properties"]["custom_options"] = json!({
            "type": "array",
            "items": {
                "type": "object",
                "required": ["key", "label", "values"],
                "properties": {
                    "key": { "type": "string" },
                    "label": { "type": "string" },
                    "description": { "type": "string" },
                    "values": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "value": { "type": "string" },
                                "label": { "type": "string" }
                            }
                        }
                    },
                    "default": { "type": "string" },
                    "recommended": { "type": "string" }
                }
            }
        });
    }

    schema
}

/// Turn the model's JSON object into an analysis
///
/// Quick analyses drop any volunteered schema. Detailed analyses require
/// one and validate it.
pub fn parse_analysis(value: Value, mode: AnalysisMode) -> Result<AnalysisResult, PipelineError> {
    debug!(?mode, "parse_analysis: called");
    let raw: RawAnalysis =
        serde_json::from_value(value).map_err(|e| PipelineError::MalformedAnalysis(e.to_string()))?;

    if raw.persona.trim().is_empty() || raw.method.trim().is_empty() {
        return Err(PipelineError::MalformedAnalysis("persona and method must be non-empty".to_string()));
    }

    let option_schema = match mode {
        AnalysisMode::Quick => None,
        AnalysisMode::Detailed => {
            let options = raw
                .custom_options
                .filter(|v| !v.is_null())
                .ok_or_else(|| PipelineError::MalformedAnalysis("detailed analysis without custom_options".to_string()))?;
            let schema = OptionSchema::from_json(options)?;
            if !schema.contains(keys::LOGIC_STRUCTURE) {
                warn!("Detailed analysis has no {} option", keys::LOGIC_STRUCTURE);
            }
            Some(schema)
        }
    };

    Ok(AnalysisResult {
        persona: raw.persona,
        method: raw.method,
        key_points: raw.key_points,
        context: raw.context,
        question_type: raw.question_type,
        option_schema,
    })
}

/// Builds analysis prompts and interprets the replies
pub struct QuestionAnalyzer {
    gateway: Arc<LlmGateway>,
    prompts: Arc<PromptLoader>,
    min_options: usize,
    max_options: usize,
}

impl QuestionAnalyzer {
    pub fn new(gateway: Arc<LlmGateway>, prompts: Arc<PromptLoader>, config: &AnalysisConfig) -> Self {
        let min_options = config.min_options.max(1);
        Self {
            gateway,
            prompts,
            min_options,
            max_options: config.max_options.max(min_options),
        }
    }

    /// Analyze a question with the model
    ///
    /// Transport failures and unreadable replies come back as errors; see
    /// [`analyze_or_fallback`](Self::analyze_or_fallback) for the recovering
    /// variant.
    pub async fn analyze(&self, question: &str, mode: AnalysisMode) -> Result<AnalysisResult, PipelineError> {
        debug!(?mode, question_len = question.len(), "QuestionAnalyzer::analyze: called");
        let question = question.trim();
        if question.is_empty() {
            return Err(PipelineError::EmptyQuestion);
        }
        if self.gateway.is_offline() {
            return Err(PipelineError::Transport(LlmError::NotConfigured));
        }

        let academic = mode == AnalysisMode::Detailed && detect_academic(question);
        if academic {
            info!("Academic context detected");
        }

        let prompt = self
            .prompts
            .render(
                mode.template(),
                &AnalysisContext {
                    question,
                    academic,
                    min_options: self.min_options,
                    max_options: self.max_options,
                },
            )
            .map_err(|e| PipelineError::Template(e.to_string()))?;

        let schema = response_schema(mode);
        let value = match self.gateway.invoke(&prompt, Some(&schema)).await? {
            GatewayOutput::Structured(value) => value,
            GatewayOutput::Text(text) => {
                return Err(PipelineError::MalformedAnalysis(format!("expected JSON, got text: {}", text)));
            }
        };

        let analysis = parse_analysis(value, mode)?;
        info!(persona = %analysis.persona, method = %analysis.method, ?mode, "Question analyzed");
        Ok(analysis)
    }

    /// Analyze, substituting the deterministic fallback on transport or parse failure
    pub async fn analyze_or_fallback(&self, question: &str, mode: AnalysisMode) -> Result<AnalysisResult, PipelineError> {
        match self.analyze(question, mode).await {
            Ok(analysis) => Ok(analysis),
            Err(e) if e.is_recoverable_analysis() => {
                warn!(error = %e, ?mode, "Analysis failed, using fallback analysis");
                Ok(fallback::fallback_analysis(question.trim(), mode))
            }
            Err(e) => Err(e),
        }
    }
}
