//! Session state machine
//!
//! Pure transitions only; no I/O happens here. Work that needs the model is
//! split into a `begin_*` half that hands out a [`Ticket`] and a `finish_*`
//! half that takes the ticket back with the result.

use std::fmt;

use historystore::EntryId;
use tracing::{debug, info};

use crate::analysis::{AnalysisMode, AnalysisResult};
use crate::error::PipelineError;
use crate::options::{OptionSchema, OptionSelectionMap, SchemaError, SelectedValue};

/// What an outstanding request is doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Analysis,
    Generation,
}

/// Handle for one outstanding model call
///
/// A `reset` bumps the session epoch, so a ticket issued before it no
/// longer matches and its result is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub epoch: u64,
    pub kind: RequestKind,
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ticket (epoch {})", self.kind, self.epoch)
    }
}

/// Analysis and selections kept across `back_to_options`
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub analysis: AnalysisResult,
    pub selections: OptionSelectionMap,
}

/// Which path led into generation; decides where a failure returns to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationOrigin {
    Quick,
    Options,
}

/// A finished generation
#[derive(Debug, Clone, PartialEq)]
pub struct Generated {
    pub prompt: String,
    pub entry_id: Option<EntryId>,
}

/// Where an analysis leads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterAnalysis {
    /// Detailed path: the user picks options next
    AwaitOptions,
    /// Quick path: generation starts right away with this ticket
    Generate(Ticket),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Input {
        question: String,
        retained: Option<Draft>,
    },
    Analyzing {
        question: String,
        mode: AnalysisMode,
        retained: Option<Draft>,
    },
    AwaitingOptions {
        question: String,
        analysis: AnalysisResult,
        selections: OptionSelectionMap,
    },
    Generating {
        question: String,
        analysis: AnalysisResult,
        selections: OptionSelectionMap,
        origin: GenerationOrigin,
    },
    Result {
        question: String,
        analysis: AnalysisResult,
        selections: OptionSelectionMap,
        prompt: String,
        entry_id: Option<EntryId>,
    },
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Input { .. } => "input",
            SessionState::Analyzing { .. } => "analyzing",
            SessionState::AwaitingOptions { .. } => "options",
            SessionState::Generating { .. } => "generating",
            SessionState::Result { .. } => "result",
        }
    }

    pub fn question(&self) -> &str {
        match self {
            SessionState::Input { question, .. }
            | SessionState::Analyzing { question, .. }
            | SessionState::AwaitingOptions { question, .. }
            | SessionState::Generating { question, .. }
            | SessionState::Result { question, .. } => question,
        }
    }

    pub fn analysis(&self) -> Option<&AnalysisResult> {
        match self {
            SessionState::AwaitingOptions { analysis, .. }
            | SessionState::Generating { analysis, .. }
            | SessionState::Result { analysis, .. } => Some(analysis),
            SessionState::Input { .. } | SessionState::Analyzing { .. } => None,
        }
    }

    pub fn selections(&self) -> Option<&OptionSelectionMap> {
        match self {
            SessionState::AwaitingOptions { selections, .. }
            | SessionState::Generating { selections, .. }
            | SessionState::Result { selections, .. } => Some(selections),
            SessionState::Input { .. } | SessionState::Analyzing { .. } => None,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self, SessionState::Analyzing { .. } | SessionState::Generating { .. })
    }
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::Input {
            question: String::new(),
            retained: None,
        }
    }
}

/// The one live state of a session plus its epoch bookkeeping
#[derive(Debug, Default)]
pub struct SessionMachine {
    state: SessionState,
    epoch: u64,
    in_flight: Option<Ticket>,
}

impl SessionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn in_flight(&self) -> Option<Ticket> {
        self.in_flight
    }

    /// Final prompt, once in `Result`
    pub fn prompt(&self) -> Option<&str> {
        match &self.state {
            SessionState::Result { prompt, .. } => Some(prompt),
            _ => None,
        }
    }

    fn invalid(&self, action: &'static str) -> PipelineError {
        if self.state.is_in_flight() {
            PipelineError::Busy {
                state: self.state.name(),
            }
        } else {
            PipelineError::InvalidTransition {
                state: self.state.name(),
                action,
            }
        }
    }

    fn issue(&mut self, kind: RequestKind) -> Ticket {
        let ticket = Ticket {
            epoch: self.epoch,
            kind,
        };
        self.in_flight = Some(ticket);
        ticket
    }

    /// Fail unless `ticket` is the request this session is waiting on
    pub fn check_current(&self, ticket: Ticket) -> Result<(), PipelineError> {
        if ticket.epoch != self.epoch {
            debug!(%ticket, current = self.epoch, "check_current: stale");
            return Err(PipelineError::StaleResponse {
                ticket,
                current: self.epoch,
            });
        }
        if self.in_flight != Some(ticket) {
            return Err(PipelineError::InvalidTransition {
                state: self.state.name(),
                action: "accept response",
            });
        }
        Ok(())
    }

    /// Edit the question; only while in `Input`
    ///
    /// A changed question drops any retained draft.
    pub fn set_question(&mut self, text: impl Into<String>) -> Result<(), PipelineError> {
        let text = text.into();
        match &mut self.state {
            SessionState::Input { question, retained } => {
                if *question != text {
                    *retained = None;
                    *question = text;
                }
                Ok(())
            }
            _ => Err(self.invalid("edit question")),
        }
    }

    /// `Input` → `Analyzing`
    pub fn begin_analysis(&mut self, mode: AnalysisMode) -> Result<Ticket, PipelineError> {
        debug!(?mode, "begin_analysis: called");
        let SessionState::Input { question, retained } = &mut self.state else {
            return Err(self.invalid("analyze"));
        };
        if question.trim().is_empty() {
            return Err(PipelineError::EmptyQuestion);
        }

        self.state = SessionState::Analyzing {
            question: std::mem::take(question),
            mode,
            retained: retained.take(),
        };
        info!(?mode, "Session: input -> analyzing");
        Ok(self.issue(RequestKind::Analysis))
    }

    /// `Analyzing` → `AwaitingOptions` (detailed), `Generating` (quick), or back to `Input`
    pub fn finish_analysis(
        &mut self,
        ticket: Ticket,
        result: Result<AnalysisResult, PipelineError>,
    ) -> Result<AfterAnalysis, PipelineError> {
        debug!(%ticket, ok = result.is_ok(), "finish_analysis: called");
        self.check_current(ticket)?;
        if !matches!(self.state, SessionState::Analyzing { .. }) {
            return Err(self.invalid("finish analysis"));
        }
        let SessionState::Analyzing {
            question,
            mode,
            retained,
        } = std::mem::take(&mut self.state)
        else {
            return Err(self.invalid("finish analysis"));
        };
        self.in_flight = None;

        let analysis = match result {
            Ok(analysis) => analysis,
            Err(e) => {
                info!(error = %e, "Session: analyzing -> input");
                self.state = SessionState::Input { question, retained };
                return Err(e);
            }
        };

        match mode {
            AnalysisMode::Quick => {
                self.state = SessionState::Generating {
                    question,
                    analysis,
                    selections: OptionSelectionMap::new(),
                    origin: GenerationOrigin::Quick,
                };
                info!("Session: analyzing -> generating");
                Ok(AfterAnalysis::Generate(self.issue(RequestKind::Generation)))
            }
            AnalysisMode::Detailed => {
                let Some(schema) = analysis.option_schema.as_ref() else {
                    self.state = SessionState::Input { question, retained };
                    return Err(PipelineError::InvalidSchema(SchemaError::Empty));
                };
                let selections = OptionSelectionMap::initialize(schema);
                self.state = SessionState::AwaitingOptions {
                    question,
                    analysis,
                    selections,
                };
                info!("Session: analyzing -> options");
                Ok(AfterAnalysis::AwaitOptions)
            }
        }
    }

    /// Change one option; only while in `AwaitingOptions`
    pub fn select_option(&mut self, key: &str, value: SelectedValue) -> Result<(), PipelineError> {
        let SessionState::AwaitingOptions {
            analysis, selections, ..
        } = &mut self.state
        else {
            return Err(self.invalid("select option"));
        };
        let schema = analysis
            .option_schema
            .as_ref()
            .ok_or(PipelineError::InvalidSchema(SchemaError::Empty))?;
        selections.set(schema, key, value)?;
        Ok(())
    }

    /// Option schema under edit, while in `AwaitingOptions`
    pub fn schema(&self) -> Option<&OptionSchema> {
        match &self.state {
            SessionState::AwaitingOptions { analysis, .. } => analysis.option_schema.as_ref(),
            _ => None,
        }
    }

    /// `AwaitingOptions` → `Generating`; selections are frozen from here on
    pub fn begin_generation(&mut self) -> Result<Ticket, PipelineError> {
        debug!("begin_generation: called");
        if !matches!(self.state, SessionState::AwaitingOptions { .. }) {
            return Err(self.invalid("generate"));
        }
        let SessionState::AwaitingOptions {
            question,
            analysis,
            selections,
        } = std::mem::take(&mut self.state)
        else {
            return Err(self.invalid("generate"));
        };

        self.state = SessionState::Generating {
            question,
            analysis,
            selections,
            origin: GenerationOrigin::Options,
        };
        info!("Session: options -> generating");
        Ok(self.issue(RequestKind::Generation))
    }

    /// `Generating` → `Result`, or back to where generation started on failure
    pub fn finish_generation(
        &mut self,
        ticket: Ticket,
        result: Result<Generated, PipelineError>,
    ) -> Result<(), PipelineError> {
        debug!(%ticket, ok = result.is_ok(), "finish_generation: called");
        self.check_current(ticket)?;
        if !matches!(self.state, SessionState::Generating { .. }) {
            return Err(self.invalid("finish generation"));
        }
        let SessionState::Generating {
            question,
            analysis,
            selections,
            origin,
        } = std::mem::take(&mut self.state)
        else {
            return Err(self.invalid("finish generation"));
        };
        self.in_flight = None;

        match result {
            Ok(Generated { prompt, entry_id }) => {
                self.state = SessionState::Result {
                    question,
                    analysis,
                    selections,
                    prompt,
                    entry_id,
                };
                info!("Session: generating -> result");
                Ok(())
            }
            Err(e) => {
                self.state = match origin {
                    GenerationOrigin::Quick => SessionState::Input {
                        question,
                        retained: None,
                    },
                    GenerationOrigin::Options => SessionState::AwaitingOptions {
                        question,
                        analysis,
                        selections,
                    },
                };
                info!(error = %e, "Session: generating -> {}", self.state.name());
                Err(e)
            }
        }
    }

    /// Discard everything and start over
    ///
    /// Allowed from any state. Bumps the epoch so an in-flight response is
    /// recognized as stale when it arrives.
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.in_flight = None;
        self.state = SessionState::default();
        info!(epoch = self.epoch, "Session reset");
    }

    /// `Result` → `Input`, keeping the question and the options draft
    pub fn back_to_options(&mut self) -> Result<(), PipelineError> {
        if !matches!(self.state, SessionState::Result { .. }) {
            return Err(self.invalid("go back"));
        }
        let SessionState::Result {
            question,
            analysis,
            selections,
            ..
        } = std::mem::take(&mut self.state)
        else {
            return Err(self.invalid("go back"));
        };

        // A quick analysis has no options to return to
        let retained = analysis
            .option_schema
            .is_some()
            .then_some(Draft { analysis, selections });
        self.state = SessionState::Input { question, retained };
        info!("Session: result -> input");
        Ok(())
    }

    /// `Input` → `AwaitingOptions` from the retained draft, without a model call
    pub fn reopen_options(&mut self) -> Result<(), PipelineError> {
        let SessionState::Input { question, retained } = &mut self.state else {
            return Err(self.invalid("reopen options"));
        };
        let Some(Draft { analysis, selections }) = retained.take() else {
            return Err(PipelineError::InvalidTransition {
                state: "input",
                action: "reopen options",
            });
        };

        self.state = SessionState::AwaitingOptions {
            question: std::mem::take(question),
            analysis,
            selections,
        };
        info!("Session: input -> options");
        Ok(())
    }
}
