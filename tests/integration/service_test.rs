//! HTTP execution service tests.
//!
//! The live tests need a running service. Set SQL_GATE_TEST_URL to run them.

use sql_gate::app::Orchestrator;
use sql_gate::config::{ServiceConfig, SessionConfig};
use sql_gate::error::GateError;
use sql_gate::persistence::MemoryPreferenceStore;
use sql_gate::service::{ExecutionService, HttpExecutionService, ResultKind};
use sql_gate::session::ExecutionReport;
use std::sync::Arc;

fn get_test_service() -> Option<HttpExecutionService> {
    let url = std::env::var("SQL_GATE_TEST_URL").ok()?;
    HttpExecutionService::new(&ServiceConfig {
        base_url: url,
        token: std::env::var("SQL_GATE_TOKEN").ok(),
        ..Default::default()
    })
    .ok()
}

/// Nothing listens on the discard port on a test host.
fn unreachable_service() -> HttpExecutionService {
    HttpExecutionService::new(&ServiceConfig {
        base_url: "http://127.0.0.1:9/api".to_string(),
        timeout_secs: 2,
        token: None,
    })
    .unwrap()
}

#[test]
fn test_rejects_non_http_url() {
    let result = HttpExecutionService::new(&ServiceConfig {
        base_url: "ftp://example.com/api".to_string(),
        ..Default::default()
    });
    assert!(matches!(result, Err(GateError::Config(_))));
}

#[tokio::test]
async fn test_unreachable_service_surfaces_banner() {
    let mut orch = Orchestrator::new(
        Arc::new(unreachable_service()),
        Arc::new(MemoryPreferenceStore::new(false)),
        &SessionConfig::default(),
    )
    .await;

    orch.run_manual(Some("SELECT 1")).unwrap();
    let report = orch.next_completion().await.unwrap();

    assert_eq!(
        report,
        ExecutionReport::Failed {
            banner: "Unable to execute SQL query.".to_string()
        }
    );
    assert!(orch.session().history().is_empty());
    assert!(!orch.session().is_executing());
}

#[tokio::test]
async fn test_live_execute_select() {
    let Some(service) = get_test_service() else {
        eprintln!("Skipping test: SQL_GATE_TEST_URL not set");
        return;
    };

    let result = service.execute("SELECT 1 AS num", 10).await.unwrap();
    assert_eq!(result.kind(), ResultKind::Rows);
    assert_eq!(result.row_count(), 1);
}

#[tokio::test]
async fn test_live_fetch_schema() {
    let Some(service) = get_test_service() else {
        eprintln!("Skipping test: SQL_GATE_TEST_URL not set");
        return;
    };

    let schema = service.fetch_schema().await.unwrap();
    assert!(!schema.summary().is_empty() || schema.tables.is_empty());
}
