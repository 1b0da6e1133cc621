//! Payload types exchanged with the execution service.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Which variant of [`QueryResult`] a statement produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    Rows,
    Ack,
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rows => write!(f, "rows"),
            Self::Ack => write!(f, "ack"),
        }
    }
}

/// Result of executing a statement remotely.
///
/// Only the execution service produces these; the session never fabricates one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum QueryResult {
    /// A row-set returned by a query.
    Rows(RowSet),
    /// An acknowledgement for a statement that returns no rows.
    Ack(Acknowledgement),
}

/// Rows returned by a query, bounded by the request's row limit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub row_count: usize,
    pub execution_time_ms: u64,
    /// True when the backend stopped at the row limit.
    #[serde(default)]
    pub has_more: bool,
}

/// Acknowledgement for a statement such as INSERT or CREATE.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Acknowledgement {
    pub message: String,
    pub row_count: usize,
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Builds a row-set result; `row_count` is taken from `rows`.
    pub fn rows(columns: Vec<String>, rows: Vec<Row>) -> Self {
        let row_count = rows.len();
        Self::Rows(RowSet {
            columns,
            rows,
            row_count,
            execution_time_ms: 0,
            has_more: false,
        })
    }

    /// Builds an acknowledgement result.
    pub fn ack(message: impl Into<String>, row_count: usize) -> Self {
        Self::Ack(Acknowledgement {
            message: message.into(),
            row_count,
            execution_time_ms: 0,
        })
    }

    /// Sets the execution time.
    pub fn with_execution_time(mut self, duration: Duration) -> Self {
        let ms = duration.as_millis() as u64;
        match &mut self {
            Self::Rows(set) => set.execution_time_ms = ms,
            Self::Ack(ack) => ack.execution_time_ms = ms,
        }
        self
    }

    pub fn kind(&self) -> ResultKind {
        match self {
            Self::Rows(_) => ResultKind::Rows,
            Self::Ack(_) => ResultKind::Ack,
        }
    }

    /// Rows returned, or rows affected for an acknowledgement.
    pub fn row_count(&self) -> usize {
        match self {
            Self::Rows(set) => set.row_count,
            Self::Ack(ack) => ack.row_count,
        }
    }

    pub fn execution_time(&self) -> Duration {
        let ms = match self {
            Self::Rows(set) => set.execution_time_ms,
            Self::Ack(ack) => ack.execution_time_ms,
        };
        Duration::from_millis(ms)
    }

    /// Returns a truncation warning when the row limit cut the result short.
    pub fn truncation_warning(&self) -> Option<String> {
        match self {
            Self::Rows(set) if set.has_more => Some(format!(
                "Result truncated: showing the first {} rows",
                set.row_count
            )),
            _ => None,
        }
    }
}

/// A row of data from a query result.
pub type Row = Vec<Value>;

/// A single cell value as it arrives over JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Attempts to convert the value to a string representation.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

/// Database structure as reported by the service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaPayload {
    /// Human-readable label of the active connection.
    #[serde(default)]
    pub connection: String,
    #[serde(default)]
    pub tables: Vec<Relation>,
    #[serde(default)]
    pub views: Vec<Relation>,
}

/// A table or view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<SchemaColumn>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaColumn {
    pub name: String,
    #[serde(default, rename = "type")]
    pub data_type: String,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub column: String,
    pub references_table: String,
    pub references_column: String,
}

impl SchemaPayload {
    /// One line per relation, e.g. `users (id, email) -> orgs`.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        if !self.connection.is_empty() {
            out.push_str(&format!("Connection: {}\n", self.connection));
        }
        for (label, relations) in [("table", &self.tables), ("view", &self.views)] {
            for relation in relations {
                let columns: Vec<&str> =
                    relation.columns.iter().map(|c| c.name.as_str()).collect();
                out.push_str(&format!("{label} {} ({})", relation.name, columns.join(", ")));
                let targets: Vec<&str> = relation
                    .foreign_keys
                    .iter()
                    .map(|fk| fk.references_table.as_str())
                    .collect();
                if !targets.is_empty() {
                    out.push_str(&format!(" -> {}", targets.join(", ")));
                }
                out.push('\n');
            }
        }
        out
    }
}

/// Advisory output for a statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuggestionResponse {
    #[serde(default)]
    pub analysis: String,
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(alias = "query")]
    pub sql: String,
    #[serde(default)]
    pub explanation: Option<String>,
}
