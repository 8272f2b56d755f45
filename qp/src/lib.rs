//! Question Plus - turn a rough question into an optimized LLM prompt
//!
//! A question goes through a two-stage pipeline. The analyzer asks the model
//! for an expert persona, an answering method and key points, plus (on the
//! detailed path) a set of adjustable options. The synthesizer then folds the
//! analysis and the user's option choices into a finished prompt, which is
//! appended to the history collection.
//!
//! Without a credential every model call is replaced by a deterministic local
//! generator, so the pipeline always produces a prompt.
//!
//! # Modules
//!
//! - [`session`] - state machine and async driver for one transformation
//! - [`analysis`] - question analysis and its response parsing
//! - [`synth`] - optimized prompt synthesis
//! - [`options`] - option schema, selections and fragment resolution
//! - [`fallback`] - deterministic offline generator
//! - [`llm`] - provider client and gateway
//! - [`prompts`] - Handlebars templates with user overrides
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod fallback;
pub mod llm;
pub mod options;
pub mod prompts;
pub mod session;
pub mod synth;

pub use analysis::{AnalysisMode, AnalysisResult, QuestionAnalyzer};
pub use config::{Config, CredentialStatus, LlmConfig};
pub use error::PipelineError;
pub use llm::{LlmClient, LlmError, LlmGateway};
pub use options::{OptionSchema, OptionSelectionMap, SelectedValue};
pub use prompts::PromptLoader;
pub use session::{SessionMachine, SessionState, TransformationSession};
pub use synth::PromptSynthesizer;
