//! Statement bookkeeping.
//!
//! Normalization of statement text, execution against the service, and the
//! record of what has run.

pub mod executor;
pub mod history;
pub mod normalize;

pub use executor::{Completion, ExecutionTicket, QueryExecutor, RequestId};
pub use history::{EntryId, ExecutionHistory, HistoryEntry, Origin, DEFAULT_HISTORY_LIMIT};
pub use normalize::{normalize, same_statement};
