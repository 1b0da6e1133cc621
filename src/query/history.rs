//! Executed-statement history and result cache.
//!
//! Keeps a bounded, newest-first list of statements that actually ran, plus a
//! map from normalized statement text to the latest result for that text. The
//! map lets the operator re-open an earlier result without another round trip.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::time::SystemTime;

use super::normalize::normalize;
use crate::service::{QueryResult, ResultKind};

/// Default number of entries kept.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Who caused a statement to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Proposed by the assistant.
    Ai,
    /// Typed by the operator.
    Operator,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ai => write!(f, "ai"),
            Self::Operator => write!(f, "operator"),
        }
    }
}

/// Identifier of a history entry, unique within one history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId(u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A statement that ran, with its result. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: EntryId,
    pub statement_text: String,
    pub executed_at: SystemTime,
    pub result_kind: ResultKind,
    pub row_count: usize,
    pub result: Option<QueryResult>,
    pub origin: Origin,
}

/// Bounded execution log plus normalized-text result cache.
#[derive(Debug)]
pub struct ExecutionHistory {
    /// Newest first.
    entries: VecDeque<HistoryEntry>,
    cache: HashMap<String, QueryResult>,
    limit: usize,
    next_id: u64,
}

impl Default for ExecutionHistory {
    fn default() -> Self {
        Self::with_limit(DEFAULT_HISTORY_LIMIT)
    }
}

impl ExecutionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a history keeping at most `limit` entries (minimum 1).
    pub fn with_limit(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            cache: HashMap::new(),
            limit: limit.max(1),
            next_id: 1,
        }
    }

    /// Records a statement that ran and caches its result.
    ///
    /// The entry goes to the front; the oldest entries beyond the limit are
    /// evicted. The cache is written under the normalized statement text.
    pub fn record(
        &mut self,
        statement_text: impl Into<String>,
        result: QueryResult,
        origin: Origin,
    ) -> &HistoryEntry {
        let statement_text = statement_text.into();
        let id = EntryId(self.next_id);
        self.next_id += 1;

        self.cache.insert(normalize(&statement_text), result.clone());

        self.entries.push_front(HistoryEntry {
            id,
            statement_text,
            executed_at: SystemTime::now(),
            result_kind: result.kind(),
            row_count: result.row_count(),
            result: Some(result),
            origin,
        });
        self.entries.truncate(self.limit);

        &self.entries[0]
    }

    /// Returns the cached result for a statement, ignoring whitespace and case.
    pub fn lookup(&self, statement_text: &str) -> Option<&QueryResult> {
        self.cache.get(&normalize(statement_text))
    }

    /// Returns an entry by id, if it has not been evicted.
    pub fn get(&self, id: EntryId) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Entries, newest first.
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.front()
    }

    /// Drops every entry and cached result.
    ///
    /// Used when the connection changes: a result for a statement against one
    /// database says nothing about another.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}
