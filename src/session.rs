//! Per-session state.
//!
//! [`Session`] is the single owner of everything the approval flow needs: the
//! gate, the execution history, transcript visibility, the auto-execute flag,
//! and the connection generation. It does no I/O. Operations that require a
//! statement to run return an [`ExecutionTicket`]; the caller executes it and
//! hands the [`Completion`] back through [`Session::complete`].

use tracing::{debug, info, warn};

use crate::chat::{MessageId, TranscriptMessage, VisibilityCoordinator};
use crate::config::SessionConfig;
use crate::error::{GateError, Result};
use crate::gate::{ApprovalGate, Dispatch, GateState, Observation, PendingStatement};
use crate::query::{
    Completion, EntryId, ExecutionHistory, ExecutionTicket, HistoryEntry, RequestId,
};
use crate::service::{QueryResult, SchemaPayload, SuggestionResponse};

/// What became of a completed execution.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionReport {
    /// The statement ran and was recorded in history.
    Recorded { entry: EntryId, result: QueryResult },
    /// The service returned an error; the banner text is now set.
    Failed { banner: String },
    /// The answer belongs to a previous connection and was discarded.
    Stale,
}

/// State of the suggestions panel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuggestionPanel {
    /// Statement the suggestions were requested for.
    pub statement: String,
    pub response: Option<SuggestionResponse>,
    pub error: Option<String>,
}

/// Per-session orchestration state.
#[derive(Debug)]
pub struct Session {
    gate: ApprovalGate,
    history: ExecutionHistory,
    visibility: VisibilityCoordinator,
    auto_execute: bool,
    generation: u64,
    in_flight: Option<ExecutionTicket>,
    next_request: u64,
    row_limit: usize,
    /// Operator's own statement surface.
    editor: String,
    /// Result currently on display.
    displayed: Option<QueryResult>,
    banner: Option<String>,
    suggestions: SuggestionPanel,
    schema: Option<SchemaPayload>,
}

impl Session {
    pub fn new(config: &SessionConfig, auto_execute: bool) -> Self {
        Self {
            gate: ApprovalGate::new(),
            history: ExecutionHistory::with_limit(config.history_limit),
            visibility: VisibilityCoordinator::new(),
            auto_execute,
            generation: 0,
            in_flight: None,
            next_request: 1,
            row_limit: config.row_limit,
            editor: String::new(),
            displayed: None,
            banner: None,
            suggestions: SuggestionPanel::default(),
            schema: None,
        }
    }

    // --- transcript ---------------------------------------------------------

    /// Looks at the newest transcript message for a proposed statement.
    ///
    /// Returns a ticket when auto-execute sends the statement straight to the
    /// service. Re-running this for an unchanged transcript does nothing.
    pub fn observe_transcript(
        &mut self,
        transcript: &[TranscriptMessage],
    ) -> Option<ExecutionTicket> {
        let latest = transcript.last()?;
        let can_execute = !self.is_executing();

        match self.gate.observe(latest, self.auto_execute, can_execute) {
            Observation::Ignored | Observation::NoStatement => None,
            Observation::Dropped { statement } => {
                debug!(
                    message = %latest.id,
                    "Ignoring proposed statement while another awaits approval: {statement}"
                );
                None
            }
            Observation::Opened(event) => {
                self.visibility.apply(&event);
                None
            }
            Observation::Execute(dispatch) => Some(self.begin(dispatch)),
        }
    }

    /// Returns the transcript with pending and rejected messages removed.
    pub fn visible_transcript(&self, transcript: &[TranscriptMessage]) -> Vec<TranscriptMessage> {
        self.visibility.visible_transcript(transcript)
    }

    pub fn hidden_message(&self) -> Option<&MessageId> {
        self.visibility.hidden_message()
    }

    // --- gate decisions -----------------------------------------------------

    pub fn gate_state(&self) -> GateState<'_> {
        self.gate.state()
    }

    pub fn pending(&self) -> Option<&PendingStatement> {
        self.gate.pending()
    }

    /// Replaces the pending statement's text.
    pub fn edit_pending(&mut self, text: impl Into<String>) -> Result<()> {
        self.gate.edit(text)
    }

    /// Approves the pending statement.
    ///
    /// Fails with [`GateError::Busy`] while another run is in flight, leaving
    /// the statement pending. The source message is revealed at once.
    pub fn approve(&mut self, edited: Option<&str>) -> Result<ExecutionTicket> {
        if self.is_executing() {
            return Err(GateError::Busy);
        }
        let dispatch = self.gate.approve(edited)?;
        Ok(self.begin(dispatch))
    }

    /// Rejects the pending statement and drops its message from view.
    pub fn reject(&mut self) -> Result<()> {
        let event = self.gate.reject()?;
        self.visibility.apply(&event);
        Ok(())
    }

    // --- auto-execute -------------------------------------------------------

    pub fn auto_execute(&self) -> bool {
        self.auto_execute
    }

    /// Flips the auto-execute switch.
    ///
    /// Switching it on while a statement is pending runs that statement now.
    /// If a run is in flight, the pending statement runs when it completes.
    pub fn set_auto_execute(&mut self, enabled: bool) -> Option<ExecutionTicket> {
        let was = self.auto_execute;
        self.auto_execute = enabled;
        info!(enabled, "Auto-execute preference changed");

        if enabled && !was && !self.is_executing() {
            return self.drain_pending();
        }
        None
    }

    fn drain_pending(&mut self) -> Option<ExecutionTicket> {
        let dispatch = self.gate.auto_execute_enabled()?;
        Some(self.begin(dispatch))
    }

    // --- operator runs ------------------------------------------------------

    pub fn editor(&self) -> &str {
        &self.editor
    }

    pub fn set_editor(&mut self, text: impl Into<String>) {
        self.editor = text.into();
    }

    /// Runs the operator's own statement, bypassing the gate.
    ///
    /// With `None` the editor contents run.
    pub fn run_manual(&mut self, statement: Option<&str>) -> Result<ExecutionTicket> {
        if self.is_executing() {
            return Err(GateError::Busy);
        }
        let statement = statement.unwrap_or(&self.editor).trim().to_string();
        if statement.is_empty() {
            return Err(GateError::state("Nothing to run"));
        }
        let dispatch = self.gate.manual(statement);
        Ok(self.begin(dispatch))
    }

    // --- execution lifecycle -----------------------------------------------

    pub fn is_executing(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn in_flight(&self) -> Option<&ExecutionTicket> {
        self.in_flight.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn begin(&mut self, dispatch: Dispatch) -> ExecutionTicket {
        if let Some(event) = &dispatch.event {
            self.visibility.apply(event);
        }

        let ticket = ExecutionTicket {
            request: RequestId::from_raw(self.next_request),
            generation: self.generation,
            statement: dispatch.statement,
            limit: self.row_limit,
            origin: dispatch.origin,
            resolution: dispatch.resolution,
        };
        self.next_request += 1;
        self.in_flight = Some(ticket.clone());
        ticket
    }

    /// Applies an execution's outcome.
    ///
    /// Returns the report and, when auto-execute is on and a statement pended
    /// during the run, the ticket for that statement.
    pub fn complete(
        &mut self,
        completion: Completion,
    ) -> (ExecutionReport, Option<ExecutionTicket>) {
        let current = self
            .in_flight
            .as_ref()
            .is_some_and(|t| t.request == completion.ticket.request);

        if completion.ticket.generation != self.generation || !current {
            debug!(
                request = %completion.ticket.request,
                generation = completion.ticket.generation,
                current_generation = self.generation,
                "Discarding stale execution result"
            );
            let follow_up = if self.auto_execute && !self.is_executing() {
                self.drain_pending()
            } else {
                None
            };
            return (ExecutionReport::Stale, follow_up);
        }
        self.in_flight = None;

        let ticket = completion.ticket;
        let report = match completion.outcome {
            Ok(result) => {
                let entry = self
                    .history
                    .record(ticket.statement, result.clone(), ticket.origin)
                    .id;
                self.banner = None;
                self.displayed = Some(result.clone());
                ExecutionReport::Recorded { entry, result }
            }
            Err(e) => {
                warn!(request = %ticket.request, "Execution failed: {e}");
                let banner = e.banner_text();
                self.banner = Some(banner.clone());
                ExecutionReport::Failed { banner }
            }
        };

        let follow_up = if self.auto_execute {
            self.drain_pending()
        } else {
            None
        };
        (report, follow_up)
    }

    // --- results and history -----------------------------------------------

    /// Shows the cached result for a statement without running it.
    ///
    /// Returns `None` on a cache miss; the caller decides whether to run it.
    pub fn select_statement(&mut self, statement: &str) -> Option<&QueryResult> {
        let hit = self.history.lookup(statement)?.clone();
        self.displayed = Some(hit);
        self.displayed.as_ref()
    }

    /// Shows a history entry's result and loads its text into the editor.
    pub fn select_history(&mut self, id: EntryId) -> Option<&QueryResult> {
        let entry = self.history.get(id)?.clone();
        self.editor = entry.statement_text.clone();
        self.displayed = entry
            .result
            .or_else(|| self.history.lookup(&entry.statement_text).cloned());
        self.displayed.as_ref()
    }

    pub fn history(&self) -> &ExecutionHistory {
        &self.history
    }

    pub fn history_entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.history.entries()
    }

    pub fn displayed_result(&self) -> Option<&QueryResult> {
        self.displayed.as_ref()
    }

    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.banner = None;
    }

    // --- connection ---------------------------------------------------------

    /// Starts a new connection generation.
    ///
    /// History and cache are cleared, and any in-flight answer will be
    /// discarded when it arrives. A pending statement stays pending unless
    /// auto-execute is on, in which case its ticket is returned to run on the
    /// new connection.
    pub fn reconnect(&mut self) -> Option<ExecutionTicket> {
        self.generation += 1;
        self.history.clear();
        self.in_flight = None;
        self.displayed = None;
        self.banner = None;
        self.schema = None;
        self.suggestions = SuggestionPanel::default();
        info!(generation = self.generation, "Connection changed, cache cleared");

        if self.auto_execute {
            self.drain_pending()
        } else {
            None
        }
    }

    pub fn schema(&self) -> Option<&SchemaPayload> {
        self.schema.as_ref()
    }

    pub fn set_schema(&mut self, schema: SchemaPayload) {
        self.schema = Some(schema);
    }

    // --- suggestions --------------------------------------------------------

    pub fn suggestions(&self) -> &SuggestionPanel {
        &self.suggestions
    }

    /// Records the advisor's answer. Failures stay in the panel and never
    /// touch the gate.
    pub fn set_suggestions(&mut self, statement: &str, outcome: Result<SuggestionResponse>) {
        self.suggestions = match outcome {
            Ok(response) => SuggestionPanel {
                statement: statement.to_string(),
                response: Some(response),
                error: None,
            },
            Err(e) => {
                warn!("Suggestion request failed: {e}");
                SuggestionPanel {
                    statement: statement.to_string(),
                    response: None,
                    error: Some(e.to_string()),
                }
            }
        };
    }

    /// Loads a suggestion into the editor. It is not run.
    pub fn apply_suggestion(&mut self, index: usize) -> Result<()> {
        let sql = self
            .suggestions
            .response
            .as_ref()
            .and_then(|r| r.suggestions.get(index))
            .map(|s| s.sql.clone())
            .ok_or_else(|| GateError::state(format!("No suggestion at position {}", index + 1)))?;
        self.editor = sql;
        Ok(())
    }
}
