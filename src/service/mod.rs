//! Remote SQL execution service.
//!
//! The session never talks to a database directly. Statements go to an opaque
//! service that takes a statement and a row limit and answers with rows or an
//! acknowledgement.

mod http;
mod mock;
mod types;

pub use http::HttpExecutionService;
pub use mock::{FailingExecutionService, MockExecutionService, ServiceCall};
pub use types::{
    Acknowledgement, ForeignKey, QueryResult, Relation, ResultKind, Row, RowSet, SchemaColumn,
    SchemaPayload, Suggestion, SuggestionResponse, Value,
};

use crate::error::Result;
use async_trait::async_trait;

/// Interface to the remote execution backend.
///
/// All operations are async and return Results with GateError.
#[async_trait]
pub trait ExecutionService: Send + Sync {
    /// Executes a statement, returning at most `limit` rows.
    async fn execute(&self, statement: &str, limit: usize) -> Result<QueryResult>;

    /// Fetches tables, views, columns and foreign keys of the active connection.
    async fn fetch_schema(&self) -> Result<SchemaPayload>;

    /// Asks the advisor for improvements to a statement. Never executes anything.
    async fn request_suggestions(
        &self,
        statement: &str,
        include_schema: bool,
        max_suggestions: usize,
    ) -> Result<SuggestionResponse>;
}
