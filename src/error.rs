//! Error types for sql-gate.
//!
//! Defines the main error enum used throughout the crate.

use thiserror::Error;

/// Default banner text when the backend gives no detail.
pub const DEFAULT_EXECUTION_ERROR: &str = "Unable to execute SQL query.";

/// Main error type for sql-gate operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    /// The execution service rejected the statement (SQL error, backend error).
    #[error("Execution error: {0}")]
    Execution(String),

    /// Transport-level failures talking to the execution service.
    #[error("Service error: {0}")]
    Service(String),

    /// Configuration errors (invalid config file, bad URL, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local state database errors.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// An operation was requested in a gate state that does not allow it.
    #[error("State error: {0}")]
    State(String),

    /// Another execution is still in flight.
    #[error("An execution is already in progress")]
    Busy,

    /// Internal errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GateError {
    /// Creates an execution error with the given message.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Creates a service error with the given message.
    pub fn service(msg: impl Into<String>) -> Self {
        Self::Service(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a persistence error with the given message.
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Creates a state error with the given message.
    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Execution(_) => "Execution Error",
            Self::Service(_) => "Service Error",
            Self::Config(_) => "Configuration Error",
            Self::Persistence(_) => "Persistence Error",
            Self::State(_) => "State Error",
            Self::Busy => "Busy",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Short, human-readable text for the banner next to the statement editor.
    ///
    /// Backend detail is shown verbatim; anything else collapses to the
    /// generic message.
    pub fn banner_text(&self) -> String {
        match self {
            Self::Execution(detail) if !detail.trim().is_empty() => detail.clone(),
            _ => DEFAULT_EXECUTION_ERROR.to_string(),
        }
    }
}

/// Result type alias using GateError.
pub type Result<T> = std::result::Result<T, GateError>;
