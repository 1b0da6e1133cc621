//! Core orchestrator for sql-gate.
//!
//! Couples the synchronous [`Session`] to the outside world: statements are
//! executed on spawned tasks and their completions come back over a channel,
//! the auto-execute switch is persisted through a [`PreferenceStore`], and
//! schema and suggestion requests go straight to the execution service.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::chat::TranscriptMessage;
use crate::config::SessionConfig;
use crate::error::{GateError, Result};
use crate::persistence::PreferenceStore;
use crate::query::{Completion, ExecutionTicket, QueryExecutor};
use crate::service::{ExecutionService, SchemaPayload};
use crate::session::{ExecutionReport, Session, SuggestionPanel};

/// Drives one approval session.
pub struct Orchestrator {
    session: Session,
    executor: QueryExecutor,
    service: Arc<dyn ExecutionService>,
    preferences: Arc<dyn PreferenceStore>,
    max_suggestions: usize,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
}

impl Orchestrator {
    /// Creates an orchestrator, reading the stored auto-execute preference.
    ///
    /// A preference that cannot be read starts the session with auto-execute
    /// off.
    pub async fn new(
        service: Arc<dyn ExecutionService>,
        preferences: Arc<dyn PreferenceStore>,
        config: &SessionConfig,
    ) -> Self {
        let auto_execute = match preferences.load_auto_execute().await {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to load auto-execute preference: {e}");
                false
            }
        };
        info!(auto_execute, "Session started");

        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        Self {
            session: Session::new(config, auto_execute),
            executor: QueryExecutor::new(service.clone()),
            service,
            preferences,
            max_suggestions: config.max_suggestions,
            completion_tx,
            completion_rx,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Feeds an updated transcript. Returns true if a statement was sent for
    /// execution.
    pub fn on_transcript(&mut self, transcript: &[TranscriptMessage]) -> bool {
        match self.session.observe_transcript(transcript) {
            Some(ticket) => {
                self.dispatch(ticket);
                true
            }
            None => false,
        }
    }

    pub fn approve(&mut self, edited: Option<&str>) -> Result<()> {
        let ticket = self.session.approve(edited)?;
        self.dispatch(ticket);
        Ok(())
    }

    pub fn reject(&mut self) -> Result<()> {
        self.session.reject()
    }

    /// Runs an operator statement, or the editor contents when `None`.
    pub fn run_manual(&mut self, statement: Option<&str>) -> Result<()> {
        let ticket = self.session.run_manual(statement)?;
        self.dispatch(ticket);
        Ok(())
    }

    /// Changes and persists the auto-execute switch.
    ///
    /// A failed write is logged; the new value still applies to this session.
    pub async fn set_auto_execute(&mut self, enabled: bool) {
        if let Err(e) = self.preferences.save_auto_execute(enabled).await {
            warn!("Failed to persist auto-execute preference: {e}");
        }
        if let Some(ticket) = self.session.set_auto_execute(enabled) {
            self.dispatch(ticket);
        }
    }

    fn dispatch(&self, ticket: ExecutionTicket) {
        let executor = self.executor.clone();
        let tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let completion = executor.run(ticket).await;
            if tx.send(completion).is_err() {
                debug!("Session closed before execution finished");
            }
        });
    }

    /// Waits for the next execution to finish and applies it.
    pub async fn next_completion(&mut self) -> Result<ExecutionReport> {
        let completion = self
            .completion_rx
            .recv()
            .await
            .ok_or_else(|| GateError::internal("completion channel closed"))?;

        let (report, follow_up) = self.session.complete(completion);
        if let Some(ticket) = follow_up {
            self.dispatch(ticket);
        }
        Ok(report)
    }

    /// Applies completions until nothing is executing, including statements
    /// drained from the gate along the way.
    pub async fn wait_idle(&mut self) -> Result<Vec<ExecutionReport>> {
        let mut reports = Vec::new();
        while self.session.is_executing() {
            reports.push(self.next_completion().await?);
        }
        Ok(reports)
    }

    /// Loads the schema, serving it from the session once fetched.
    pub async fn refresh_schema(&mut self, force: bool) -> Result<&SchemaPayload> {
        if force || self.session.schema().is_none() {
            let schema = self.service.fetch_schema().await?;
            debug!("Loaded schema: {}", schema.summary());
            self.session.set_schema(schema);
        }
        self.session
            .schema()
            .ok_or_else(|| GateError::internal("schema missing after load"))
    }

    /// Asks the advisor about a statement, or the editor contents when `None`.
    ///
    /// The answer lands in the suggestions panel. Nothing is executed.
    pub async fn request_suggestions(&mut self, statement: Option<&str>) -> &SuggestionPanel {
        let statement = statement
            .map(str::to_string)
            .unwrap_or_else(|| self.session.editor().to_string());

        let outcome = if statement.trim().is_empty() {
            Err(GateError::state("Nothing to analyze"))
        } else {
            self.service
                .request_suggestions(&statement, true, self.max_suggestions)
                .await
        };
        self.session.set_suggestions(&statement, outcome);
        self.session.suggestions()
    }

    /// Switches to a new execution service. Results still in flight for the
    /// old one are discarded when they arrive.
    ///
    /// With auto-execute on, a pending statement runs against the new service.
    pub fn reconnect(&mut self, service: Arc<dyn ExecutionService>) {
        self.executor = QueryExecutor::new(service.clone());
        self.service = service;
        if let Some(ticket) = self.session.reconnect() {
            self.dispatch(ticket);
        }
    }
}
