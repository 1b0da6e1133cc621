//! Statement execution against the remote service.
//!
//! An execution is described by an [`ExecutionTicket`] and answered by a
//! [`Completion`]. The ticket carries the connection generation it was issued
//! under so the session can tell a current answer from a stale one.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::Origin;
use crate::error::Result;
use crate::gate::Resolution;
use crate::service::{ExecutionService, QueryResult};

/// Identifier of one execution request, unique within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

impl RequestId {
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A statement cleared to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionTicket {
    pub request: RequestId,
    /// Connection generation at issue time.
    pub generation: u64,
    pub statement: String,
    pub limit: usize,
    pub origin: Origin,
    pub resolution: Resolution,
}

/// The service's answer to a ticket.
#[derive(Debug, Clone)]
pub struct Completion {
    pub ticket: ExecutionTicket,
    pub outcome: Result<QueryResult>,
    pub elapsed: Duration,
}

/// Runs tickets against an execution service.
#[derive(Clone)]
pub struct QueryExecutor {
    service: Arc<dyn ExecutionService>,
}

impl QueryExecutor {
    pub fn new(service: Arc<dyn ExecutionService>) -> Self {
        Self { service }
    }

    /// Executes the ticket's statement once. Errors are returned inside the
    /// completion, never retried.
    pub async fn run(&self, ticket: ExecutionTicket) -> Completion {
        debug!(
            request = %ticket.request,
            origin = %ticket.origin,
            limit = ticket.limit,
            "Executing statement"
        );

        let start = Instant::now();
        let outcome = self.service.execute(&ticket.statement, ticket.limit).await;
        let elapsed = start.elapsed();

        match &outcome {
            Ok(result) => debug!(
                request = %ticket.request,
                kind = %result.kind(),
                rows = result.row_count(),
                "Statement finished in {:?}",
                elapsed
            ),
            Err(e) => warn!(request = %ticket.request, "Statement failed: {e}"),
        }

        Completion {
            ticket,
            outcome,
            elapsed,
        }
    }
}
