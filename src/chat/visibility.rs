//! Transcript visibility while a statement awaits approval.
//!
//! The coordinator never decides anything itself. It follows the gate's
//! events: a message is hidden when its statement becomes pending, shown again
//! when the statement is approved or auto-executed, and dropped for good when
//! the statement is rejected.

use std::collections::HashSet;
use tracing::debug;

use super::transcript::{MessageId, TranscriptMessage};
use crate::gate::{GateEvent, PendingId, Resolution};

#[derive(Debug, Clone, PartialEq, Eq)]
struct HiddenMessage {
    message: MessageId,
    pending: PendingId,
}

/// Tracks which transcript entries are hidden or dropped.
#[derive(Debug, Default)]
pub struct VisibilityCoordinator {
    hidden: Option<HiddenMessage>,
    dropped: HashSet<MessageId>,
}

impl VisibilityCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a gate event.
    ///
    /// Returns the message that became visible again, if any. A message is
    /// revealed at most once: a second resolution for the same pending id finds
    /// nothing hidden.
    pub fn apply(&mut self, event: &GateEvent) -> Option<MessageId> {
        match event {
            GateEvent::Opened { pending, message } => {
                if let Some(message) = message {
                    debug!(%message, "Hiding message until its statement is resolved");
                    self.hidden = Some(HiddenMessage {
                        message: message.clone(),
                        pending: *pending,
                    });
                }
                None
            }
            GateEvent::Resolved {
                pending,
                resolution,
                ..
            } => {
                if self.hidden.as_ref().map(|h| h.pending) != Some(*pending) {
                    return None;
                }
                let hidden = self.hidden.take()?;
                if *resolution == Resolution::Rejected {
                    debug!(message = %hidden.message, "Dropping rejected message");
                    self.dropped.insert(hidden.message);
                    None
                } else {
                    debug!(message = %hidden.message, "Revealing message");
                    Some(hidden.message)
                }
            }
        }
    }

    /// Returns the message currently hidden, if any.
    pub fn hidden_message(&self) -> Option<&MessageId> {
        self.hidden.as_ref().map(|h| &h.message)
    }

    pub fn is_hidden(&self, id: &MessageId) -> bool {
        self.hidden_message() == Some(id)
    }

    pub fn is_dropped(&self, id: &MessageId) -> bool {
        self.dropped.contains(id)
    }

    /// Returns the transcript the operator should see.
    ///
    /// Pure with respect to the coordinator's state, so calling it repeatedly
    /// with the same transcript gives the same answer. Revealed messages keep
    /// their transcript position, which is the end of the transcript as it was
    /// when they were hidden.
    pub fn visible_transcript(&self, transcript: &[TranscriptMessage]) -> Vec<TranscriptMessage> {
        transcript
            .iter()
            .filter(|m| !self.is_hidden(&m.id) && !self.is_dropped(&m.id))
            .cloned()
            .collect()
    }
}
