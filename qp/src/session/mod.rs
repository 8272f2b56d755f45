//! Transformation session
//!
//! [`SessionMachine`] holds the state and its legal transitions.
//! [`TransformationSession`] drives it: it runs the analyzer and synthesizer
//! for each transition and appends finished prompts to history.

mod state;

use std::sync::Arc;

use historystore::{EntryId, HistoryStore, NewHistoryEntry};
use tracing::{debug, warn};

pub use state::{
    AfterAnalysis, Draft, Generated, GenerationOrigin, RequestKind, SessionMachine, SessionState, Ticket,
};

use crate::analysis::{AnalysisMode, QuestionAnalyzer};
use crate::config::Config;
use crate::error::PipelineError;
use crate::llm::LlmGateway;
use crate::options::{OptionSelectionMap, SelectedValue, resolve};
use crate::prompts::PromptLoader;
use crate::synth::PromptSynthesizer;

/// One user's walk from question to optimized prompt
pub struct TransformationSession {
    machine: SessionMachine,
    analyzer: QuestionAnalyzer,
    synthesizer: PromptSynthesizer,
    history: Option<HistoryStore>,
}

impl TransformationSession {
    pub fn new(analyzer: QuestionAnalyzer, synthesizer: PromptSynthesizer, history: Option<HistoryStore>) -> Self {
        Self {
            machine: SessionMachine::new(),
            analyzer,
            synthesizer,
            history,
        }
    }

    /// Wire up gateway, templates and history from configuration
    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        debug!("TransformationSession::from_config: called");
        let gateway = Arc::new(LlmGateway::from_config(&config.llm));
        let prompts = Arc::new(PromptLoader::new(config.prompts.dir.as_ref()));
        let history = HistoryStore::open(&config.history.dir)?;

        Ok(Self::new(
            QuestionAnalyzer::new(gateway.clone(), prompts.clone(), &config.analysis),
            PromptSynthesizer::new(gateway, prompts),
            Some(history),
        ))
    }

    pub fn machine(&self) -> &SessionMachine {
        &self.machine
    }

    pub fn state(&self) -> &SessionState {
        self.machine.state()
    }

    pub fn set_question(&mut self, text: impl Into<String>) -> Result<(), PipelineError> {
        self.machine.set_question(text)
    }

    pub fn select_option(&mut self, key: &str, value: SelectedValue) -> Result<(), PipelineError> {
        self.machine.select_option(key, value)
    }

    pub fn reset(&mut self) {
        self.machine.reset()
    }

    pub fn back_to_options(&mut self) -> Result<(), PipelineError> {
        self.machine.back_to_options()
    }

    pub fn reopen_options(&mut self) -> Result<(), PipelineError> {
        self.machine.reopen_options()
    }

    /// Quick path: analyze, then generate with no options
    ///
    /// Returns the optimized prompt.
    pub async fn request_quick_generate(&mut self) -> Result<String, PipelineError> {
        let ticket = self.machine.begin_analysis(AnalysisMode::Quick)?;
        let question = self.machine.state().question().to_string();
        let result = self.analyzer.analyze_or_fallback(&question, AnalysisMode::Quick).await;

        match self.machine.finish_analysis(ticket, result)? {
            AfterAnalysis::Generate(ticket) => self.run_generation(ticket).await,
            AfterAnalysis::AwaitOptions => Err(PipelineError::InvalidTransition {
                state: self.machine.state().name(),
                action: "quick generate",
            }),
        }
    }

    /// Detailed path, first half: analyze and stop at the option picker
    pub async fn request_options_analysis(&mut self) -> Result<(), PipelineError> {
        let ticket = self.machine.begin_analysis(AnalysisMode::Detailed)?;
        let question = self.machine.state().question().to_string();
        let result = self.analyzer.analyze_or_fallback(&question, AnalysisMode::Detailed).await;

        self.machine.finish_analysis(ticket, result).map(|_| ())
    }

    /// Detailed path, second half: generate from the current selections
    pub async fn request_generate_with_options(&mut self) -> Result<String, PipelineError> {
        let ticket = self.machine.begin_generation()?;
        self.run_generation(ticket).await
    }

    async fn run_generation(&mut self, ticket: Ticket) -> Result<String, PipelineError> {
        let SessionState::Generating {
            question,
            analysis,
            selections,
            ..
        } = self.machine.state().clone()
        else {
            return Err(PipelineError::InvalidTransition {
                state: self.machine.state().name(),
                action: "generate",
            });
        };

        let fragments = analysis
            .option_schema
            .as_ref()
            .map(|schema| resolve(schema, &selections))
            .unwrap_or_default();
        debug!(fragment_count = fragments.len(), "run_generation: fragments resolved");

        let generated = match self.synthesizer.synthesize(&question, &analysis, &fragments).await {
            Ok(prompt) => {
                // Nothing is recorded for a response the session no longer wants
                self.machine.check_current(ticket)?;
                let entry_id = self.record(&question, &prompt, &selections, &analysis.persona, &analysis.method);
                Ok(Generated { prompt, entry_id })
            }
            Err(e) => Err(e),
        };

        self.machine.finish_generation(ticket, generated)?;
        Ok(self.machine.prompt().unwrap_or_default().to_string())
    }

    /// Append the finished transformation; a failed write is logged, not fatal
    fn record(
        &self,
        question: &str,
        prompt: &str,
        selections: &OptionSelectionMap,
        persona: &str,
        method: &str,
    ) -> Option<EntryId> {
        let store = self.history.as_ref()?;
        let entry = NewHistoryEntry {
            original_question: question.to_string(),
            optimized_prompt: prompt.to_string(),
            options: selections.to_wire(),
            persona: persona.to_string(),
            method: method.to_string(),
        };
        match store.create(entry) {
            Ok(entry) => Some(entry.id),
            Err(e) => {
                warn!(error = %e, "Failed to write history entry");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::llm::LlmError;
    use crate::llm::client::mock::MockLlmClient;
    use crate::options::keys;
    use tempfile::TempDir;

    const DETAILED_REPLY: &str = r#"{
        "persona": "プレゼンテーションコーチ",
        "method": "PREP法",
        "key_points": ["結論を先に", "根拠を示す"],
        "context": "社内提案",
        "question_type": "提案・説得",
        "custom_options": [
            {
                "key": "logic_structure",
                "label": "論理構造",
                "values": [
                    {"value": "conclusion_first", "label": "結論→理由→例"},
                    {"value": "not_specified", "label": "指定しない"},
                    {"value": "other", "label": "その他"}
                ],
                "default": "conclusion_first",
                "recommended": "conclusion_first"
            },
            {
                "key": "length",
                "label": "分量",
                "values": [
                    {"value": "short", "label": "短め"},
                    {"value": "not_specified", "label": "指定しない"},
                    {"value": "other", "label": "その他（文字数指定など）"}
                ],
                "default": "not_specified"
            }
        ]
    }"#;

    fn session(gateway: LlmGateway, temp: &TempDir) -> TransformationSession {
        let gateway = Arc::new(gateway);
        let prompts = Arc::new(PromptLoader::embedded_only());
        TransformationSession::new(
            QuestionAnalyzer::new(gateway.clone(), prompts.clone(), &AnalysisConfig::default()),
            PromptSynthesizer::new(gateway, prompts),
            Some(HistoryStore::open(temp.path()).unwrap()),
        )
    }

    fn history(temp: &TempDir) -> Vec<historystore::HistoryEntry> {
        HistoryStore::open(temp.path()).unwrap().list().unwrap()
    }

    #[tokio::test]
    async fn test_options_path_records_selections() {
        let temp = TempDir::new().unwrap();
        let client = Arc::new(MockLlmClient::texts(&[DETAILED_REPLY, "最適化済みプロンプト"]));
        let mut session = session(LlmGateway::remote(client.clone(), 4096), &temp);

        session.set_question("上司にアイデアを提案したい").unwrap();
        session.request_options_analysis().await.unwrap();
        assert_eq!(session.state().name(), "options");

        session
            .select_option(keys::LENGTH, SelectedValue::freeform("800字"))
            .unwrap();
        let prompt = session.request_generate_with_options().await.unwrap();
        assert_eq!(prompt, "最適化済みプロンプト");
        assert_eq!(session.machine().prompt(), Some("最適化済みプロンプト"));

        // The optimization prompt carried the strict length fragment
        let sent = client.prompts();
        assert!(sent[1].contains("- 文字数制限: 800字"));

        let entries = history(&temp);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].persona, "プレゼンテーションコーチ");
        assert_eq!(entries[0].options["length"], "other:800字");
        assert_eq!(entries[0].options["logic_structure"], "conclusion_first");
    }

    #[tokio::test]
    async fn test_generation_transport_failure_keeps_options() {
        let temp = TempDir::new().unwrap();
        let client = Arc::new(MockLlmClient::scripted(vec![
            Ok(crate::llm::CompletionResponse::text(DETAILED_REPLY)),
            Err(LlmError::ApiError {
                status: 503,
                message: "unavailable".to_string(),
            }),
        ]));
        let mut session = session(LlmGateway::remote(client, 4096), &temp);

        session.set_question("上司にアイデアを提案したい").unwrap();
        session.request_options_analysis().await.unwrap();
        session.select_option(keys::LENGTH, SelectedValue::choice("short")).unwrap();
        let before = session.state().clone();

        let err = session.request_generate_with_options().await.unwrap_err();
        assert!(matches!(err, PipelineError::GenerationFailed(_)));
        assert_eq!(session.state(), &before);
        assert!(history(&temp).is_empty());
    }

    #[tokio::test]
    async fn test_quick_path_falls_back_when_analysis_is_malformed() {
        let temp = TempDir::new().unwrap();
        let client = Arc::new(MockLlmClient::texts(&["not json at all", "プロンプト"]));
        let mut session = session(LlmGateway::remote(client, 4096), &temp);

        session.set_question("質問").unwrap();
        let prompt = session.request_quick_generate().await.unwrap();
        assert_eq!(prompt, "プロンプト");

        let entries = history(&temp);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].persona, "戦略コンサルタント");
        assert!(entries[0].options.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_schema_returns_to_input() {
        let temp = TempDir::new().unwrap();
        let bad = DETAILED_REPLY.replace("\"default\": \"not_specified\"", "\"default\": \"huge\"");
        let client = Arc::new(MockLlmClient::texts(&[bad.as_str()]));
        let mut session = session(LlmGateway::remote(client, 4096), &temp);

        session.set_question("質問").unwrap();
        let err = session.request_options_analysis().await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidSchema(_)));
        assert_eq!(session.state().name(), "input");
        assert_eq!(session.state().question(), "質問");
    }

    #[tokio::test]
    async fn test_empty_question_makes_no_calls() {
        let temp = TempDir::new().unwrap();
        let client = Arc::new(MockLlmClient::texts(&[]));
        let mut session = session(LlmGateway::remote(client.clone(), 4096), &temp);

        let err = session.request_quick_generate().await.unwrap_err();
        assert!(matches!(err, PipelineError::EmptyQuestion));
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_back_to_options_then_regenerate() {
        let temp = TempDir::new().unwrap();
        let mut session = session(LlmGateway::offline(), &temp);

        session.set_question("上司にアイデアを提案したい").unwrap();
        session.request_options_analysis().await.unwrap();
        session.request_generate_with_options().await.unwrap();

        session.back_to_options().unwrap();
        session.reopen_options().unwrap();
        session.select_option(keys::TONE, SelectedValue::choice("strict")).unwrap();
        let prompt = session.request_generate_with_options().await.unwrap();

        assert!(prompt.contains("- トーン: 厳しい"));
        assert_eq!(history(&temp).len(), 2);
    }

    #[tokio::test]
    async fn test_session_without_history() {
        let gateway = Arc::new(LlmGateway::offline());
        let prompts = Arc::new(PromptLoader::embedded_only());
        let mut session = TransformationSession::new(
            QuestionAnalyzer::new(gateway.clone(), prompts.clone(), &AnalysisConfig::default()),
            PromptSynthesizer::new(gateway, prompts),
            None,
        );

        session.set_question("質問").unwrap();
        session.request_quick_generate().await.unwrap();
        let SessionState::Result { entry_id, .. } = session.state() else {
            panic!("expected result state");
        };
        assert!(entry_id.is_none());
    }
}
