//! Mock execution services for testing.
//!
//! Provides an in-memory service that records every call so tests can assert
//! exactly how many times a statement reached the backend.

use super::{ExecutionService, QueryResult, SchemaPayload, SuggestionResponse, Value};
use crate::error::{GateError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// A call observed by [`MockExecutionService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCall {
    Execute { statement: String, limit: usize },
    FetchSchema,
    Suggestions { statement: String, include_schema: bool, max_suggestions: usize },
}

#[derive(Default)]
struct MockState {
    calls: Vec<ServiceCall>,
    scripted: VecDeque<Result<QueryResult>>,
    by_statement: HashMap<String, QueryResult>,
}

/// A mock service that returns predefined results.
///
/// Lookup order for `execute`: scripted responses (FIFO), then results
/// registered for the exact statement text, then a generated default.
#[derive(Default)]
pub struct MockExecutionService {
    state: Mutex<MockState>,
    schema: SchemaPayload,
    suggestions: SuggestionResponse,
    delay: Option<Duration>,
}

impl MockExecutionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response for the next `execute` call.
    pub fn push_response(&self, response: Result<QueryResult>) {
        self.lock().scripted.push_back(response);
    }

    /// Registers the result returned whenever `statement` is executed.
    pub fn with_result(self, statement: impl Into<String>, result: QueryResult) -> Self {
        self.lock().by_statement.insert(statement.into(), result);
        self
    }

    pub fn with_schema(mut self, schema: SchemaPayload) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_suggestions(mut self, suggestions: SuggestionResponse) -> Self {
        self.suggestions = suggestions;
        self
    }

    /// Makes every call sleep first, so tests can interleave work with an
    /// in-flight request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every call seen so far, in order.
    pub fn calls(&self) -> Vec<ServiceCall> {
        self.lock().calls.clone()
    }

    /// Statements passed to `execute`, in order.
    pub fn executed(&self) -> Vec<(String, usize)> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                ServiceCall::Execute { statement, limit } => Some((statement.clone(), *limit)),
                _ => None,
            })
            .collect()
    }

    pub fn execute_count(&self) -> usize {
        self.executed().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        // A poisoned lock only means another test thread panicked mid-call.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn default_result(statement: &str) -> QueryResult {
        let upper = statement.trim_start().to_uppercase();
        if upper.starts_with("SELECT") || upper.starts_with("WITH") {
            QueryResult::rows(
                vec!["result".to_string()],
                vec![vec![Value::String(format!("Mock result for: {statement}"))]],
            )
        } else {
            QueryResult::ack("Statement executed.", 0)
        }
        .with_execution_time(Duration::from_millis(1))
    }
}

#[async_trait]
impl ExecutionService for MockExecutionService {
    async fn execute(&self, statement: &str, limit: usize) -> Result<QueryResult> {
        let next = {
            let mut state = self.lock();
            state.calls.push(ServiceCall::Execute {
                statement: statement.to_string(),
                limit,
            });
            state
                .scripted
                .pop_front()
                .or_else(|| state.by_statement.get(statement).cloned().map(Ok))
        };
        self.pause().await;
        next.unwrap_or_else(|| Ok(Self::default_result(statement)))
    }

    async fn fetch_schema(&self) -> Result<SchemaPayload> {
        self.lock().calls.push(ServiceCall::FetchSchema);
        self.pause().await;
        Ok(self.schema.clone())
    }

    async fn request_suggestions(
        &self,
        statement: &str,
        include_schema: bool,
        max_suggestions: usize,
    ) -> Result<SuggestionResponse> {
        self.lock().calls.push(ServiceCall::Suggestions {
            statement: statement.to_string(),
            include_schema,
            max_suggestions,
        });
        self.pause().await;
        let mut response = self.suggestions.clone();
        response.suggestions.truncate(max_suggestions);
        Ok(response)
    }
}

/// A service where every call fails with the given error.
pub struct FailingExecutionService {
    error: GateError,
}

impl FailingExecutionService {
    pub fn new(error: GateError) -> Self {
        Self { error }
    }
}

#[async_trait]
impl ExecutionService for FailingExecutionService {
    async fn execute(&self, _statement: &str, _limit: usize) -> Result<QueryResult> {
        Err(self.error.clone())
    }

    async fn fetch_schema(&self) -> Result<SchemaPayload> {
        Err(self.error.clone())
    }

    async fn request_suggestions(
        &self,
        _statement: &str,
        _include_schema: bool,
        _max_suggestions: usize,
    ) -> Result<SuggestionResponse> {
        Err(self.error.clone())
    }
}
