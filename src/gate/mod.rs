//! Approval gate for AI-proposed statements.
//!
//! A pure state machine with no I/O. The session asks it what to do with a new
//! assistant message or an operator decision, and it answers with a
//! [`Dispatch`] (run this statement now) and/or a [`GateEvent`] (for the
//! visibility coordinator). Keeping the async work outside makes every
//! transition unit-testable.
//!
//! ```text
//! Idle ──new statement, auto off──▶ Pending ──approve──▶ Resolved(Approved)
//!   │                                  │ ──reject───▶ Resolved(Rejected)
//!   │                                  └─auto on───▶ Resolved(Auto)
//!   ├──new statement, auto on──▶ Resolved(Executing)
//!   └──operator run──────────▶ Resolved(Manual)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;
use tracing::{debug, info};

use crate::chat::{first_statement, MessageId, TranscriptMessage};
use crate::error::{GateError, Result};
use crate::query::Origin;

/// Identifier of a pending statement, unique within one gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PendingId(u64);

impl PendingId {
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PendingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Who proposed a pending statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Proposer {
    Assistant,
    Operator,
}

impl Proposer {
    /// Provenance recorded in history once the statement runs.
    pub fn origin(&self) -> Origin {
        match self {
            Self::Assistant => Origin::Ai,
            Self::Operator => Origin::Operator,
        }
    }
}

/// A statement awaiting the operator's decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingStatement {
    pub id: PendingId,
    /// Current text, possibly edited by the operator.
    pub statement_text: String,
    /// Text as originally proposed.
    pub proposed_text: String,
    pub origin: Proposer,
    pub proposed_at: SystemTime,
    /// Transcript message the statement came from.
    pub source_message: Option<MessageId>,
}

impl PendingStatement {
    pub fn is_edited(&self) -> bool {
        self.statement_text != self.proposed_text
    }
}

/// How the last statement left the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// Auto-execute was on when the statement arrived; it never pended.
    Executing,
    Approved,
    Rejected,
    /// Auto-execute was switched on while the statement was pending.
    Auto,
    /// The operator ran their own statement.
    Manual,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Executing => "executing",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Auto => "auto",
            Self::Manual => "manual",
        };
        f.write_str(label)
    }
}

/// Observable gate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState<'a> {
    Idle,
    Pending(&'a PendingStatement),
    Resolved(Resolution),
}

/// Signals for the visibility coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateEvent {
    Opened {
        pending: PendingId,
        message: Option<MessageId>,
    },
    Resolved {
        pending: PendingId,
        message: Option<MessageId>,
        resolution: Resolution,
    },
}

/// A statement the session must send to the execution service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub statement: String,
    pub origin: Origin,
    pub resolution: Resolution,
    /// Present when the dispatch resolves a pending statement.
    pub event: Option<GateEvent>,
}

/// What the gate made of an assistant message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// Not an assistant message, or already inspected.
    Ignored,
    /// No fenced SQL in the message.
    NoStatement,
    /// A statement is already pending; the new candidate is dropped.
    Dropped { statement: String },
    /// The statement now awaits approval.
    Opened(GateEvent),
    /// Auto-execute is on; run the statement now.
    Execute(Dispatch),
}

/// The gate. Owns the pending statement's whole lifecycle.
#[derive(Debug)]
pub struct ApprovalGate {
    pending: Option<PendingStatement>,
    last_resolution: Option<Resolution>,
    /// Identity of the last message inspected for statements.
    last_processed: Option<MessageId>,
    next_id: u64,
}

impl Default for ApprovalGate {
    fn default() -> Self {
        Self {
            pending: None,
            last_resolution: None,
            last_processed: None,
            next_id: 1,
        }
    }
}

impl ApprovalGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> GateState<'_> {
        match (&self.pending, self.last_resolution) {
            (Some(pending), _) => GateState::Pending(pending),
            (None, Some(resolution)) => GateState::Resolved(resolution),
            (None, None) => GateState::Idle,
        }
    }

    pub fn pending(&self) -> Option<&PendingStatement> {
        self.pending.as_ref()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn last_processed(&self) -> Option<&MessageId> {
        self.last_processed.as_ref()
    }

    /// Inspects a transcript message for a statement.
    ///
    /// Each message identity is inspected once; later passes over the same
    /// message are ignored. Only the first statement of a message is taken.
    /// When auto-execute is on but `can_execute` is false (another run in
    /// flight), the statement pends instead so it is not lost.
    pub fn observe(
        &mut self,
        message: &TranscriptMessage,
        auto_execute: bool,
        can_execute: bool,
    ) -> Observation {
        if !message.is_assistant() || self.last_processed.as_ref() == Some(&message.id) {
            return Observation::Ignored;
        }
        self.last_processed = Some(message.id.clone());

        let Some(extracted) = first_statement(&message.content) else {
            return Observation::NoStatement;
        };
        let statement = extracted.raw_statement;

        if self.pending.is_some() {
            debug!(message = %message.id, "Statement already pending, dropping new candidate");
            return Observation::Dropped { statement };
        }

        if auto_execute && can_execute {
            info!(message = %message.id, "Auto-executing proposed statement");
            self.last_resolution = Some(Resolution::Executing);
            return Observation::Execute(Dispatch {
                statement,
                origin: Origin::Ai,
                resolution: Resolution::Executing,
                event: None,
            });
        }

        Observation::Opened(self.open(statement, Proposer::Assistant, Some(message.id.clone())))
    }

    /// Opens a pending statement directly.
    ///
    /// Fails if one is already pending; the existing one is never overwritten.
    pub fn propose(
        &mut self,
        statement: impl Into<String>,
        origin: Proposer,
        source_message: Option<MessageId>,
    ) -> Result<GateEvent> {
        if self.pending.is_some() {
            return Err(GateError::state("A statement is already awaiting approval"));
        }
        Ok(self.open(statement.into(), origin, source_message))
    }

    fn open(
        &mut self,
        statement: String,
        origin: Proposer,
        source_message: Option<MessageId>,
    ) -> GateEvent {
        let id = PendingId(self.next_id);
        self.next_id += 1;

        info!(pending = %id, "Statement awaiting approval");
        self.pending = Some(PendingStatement {
            id,
            statement_text: statement.clone(),
            proposed_text: statement,
            origin,
            proposed_at: SystemTime::now(),
            source_message: source_message.clone(),
        });

        GateEvent::Opened {
            pending: id,
            message: source_message,
        }
    }

    /// Replaces the pending statement's text before approval.
    pub fn edit(&mut self, text: impl Into<String>) -> Result<()> {
        let pending = self
            .pending
            .as_mut()
            .ok_or_else(|| GateError::state("No statement is awaiting approval"))?;
        pending.statement_text = text.into();
        Ok(())
    }

    /// Approves the pending statement, optionally with a final edit.
    ///
    /// The pending record is taken in the same step, so a second approval
    /// finds nothing to run.
    pub fn approve(&mut self, edited: Option<&str>) -> Result<Dispatch> {
        if let Some(text) = edited {
            self.edit(text)?;
        }
        self.resolve(Resolution::Approved)
    }

    /// Rejects the pending statement. Nothing runs.
    pub fn reject(&mut self) -> Result<GateEvent> {
        let pending = self
            .pending
            .take()
            .ok_or_else(|| GateError::state("No statement is awaiting approval"))?;

        info!(pending = %pending.id, "Statement rejected");
        self.last_resolution = Some(Resolution::Rejected);
        Ok(GateEvent::Resolved {
            pending: pending.id,
            message: pending.source_message,
            resolution: Resolution::Rejected,
        })
    }

    /// Called when auto-execute is switched on. Drains the pending statement,
    /// if any.
    pub fn auto_execute_enabled(&mut self) -> Option<Dispatch> {
        if self.pending.is_none() {
            return None;
        }
        self.resolve(Resolution::Auto).ok()
    }

    /// Records an operator-initiated run. The pending statement, if any, is
    /// left untouched.
    pub fn manual(&mut self, statement: impl Into<String>) -> Dispatch {
        if self.pending.is_none() {
            self.last_resolution = Some(Resolution::Manual);
        }
        Dispatch {
            statement: statement.into(),
            origin: Origin::Operator,
            resolution: Resolution::Manual,
            event: None,
        }
    }

    fn resolve(&mut self, resolution: Resolution) -> Result<Dispatch> {
        let pending = self
            .pending
            .as_ref()
            .ok_or_else(|| GateError::state("No statement is awaiting approval"))?;

        if pending.statement_text.trim().is_empty() {
            return Err(GateError::state("Cannot run an empty statement"));
        }

        let pending = self
            .pending
            .take()
            .ok_or_else(|| GateError::internal("pending statement vanished"))?;

        info!(pending = %pending.id, %resolution, "Pending statement resolved");
        self.last_resolution = Some(resolution);
        Ok(Dispatch {
            statement: pending.statement_text,
            origin: pending.origin.origin(),
            resolution,
            event: Some(GateEvent::Resolved {
                pending: pending.id,
                message: pending.source_message,
                resolution,
            }),
        })
    }
}
