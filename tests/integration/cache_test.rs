//! Result cache and history behaviour across a session.

use pretty_assertions::assert_eq;
use sql_gate::app::Orchestrator;
use sql_gate::config::SessionConfig;
use sql_gate::persistence::MemoryPreferenceStore;
use sql_gate::query::normalize;
use sql_gate::service::{MockExecutionService, QueryResult, Value};
use sql_gate::session::ExecutionReport;
use std::sync::Arc;
use std::time::Duration;

async fn setup(config: &SessionConfig) -> (Orchestrator, Arc<MockExecutionService>) {
    let service = Arc::new(MockExecutionService::new().with_result(
        "SELECT * FROM orders",
        QueryResult::rows(vec!["id".to_string()], vec![vec![Value::Int(7)]]),
    ));
    let orch = Orchestrator::new(
        service.clone(),
        Arc::new(MemoryPreferenceStore::new(false)),
        config,
    )
    .await;
    (orch, service)
}

#[test]
fn test_normalization_properties() {
    for s in ["SELECT * FROM t;\n  ", "  Select\t*\nFROM   T ;", ""] {
        assert_eq!(normalize(&normalize(s)), normalize(s));
    }
    assert_eq!(
        normalize("SELECT * FROM t;\n  "),
        normalize("select * from t;")
    );
}

#[tokio::test]
async fn test_cache_hit_avoids_execution() {
    let (mut orch, service) = setup(&SessionConfig::default()).await;
    orch.run_manual(Some("SELECT * FROM orders")).unwrap();
    orch.wait_idle().await.unwrap();
    assert_eq!(service.execute_count(), 1);

    let cached = orch
        .session_mut()
        .select_statement("  select *\n  from ORDERS ")
        .cloned();

    assert_eq!(
        cached,
        Some(QueryResult::rows(vec!["id".to_string()], vec![vec![Value::Int(7)]]))
    );
    assert_eq!(service.execute_count(), 1);
}

#[tokio::test]
async fn test_history_selection_avoids_execution() {
    let (mut orch, service) = setup(&SessionConfig::default()).await;
    orch.run_manual(Some("SELECT * FROM orders")).unwrap();
    let reports = orch.wait_idle().await.unwrap();
    let ExecutionReport::Recorded { entry, .. } = &reports[0] else {
        panic!("expected the run to be recorded");
    };

    assert!(orch.session_mut().select_history(*entry).is_some());
    assert_eq!(orch.session().editor(), "SELECT * FROM orders");
    assert_eq!(service.execute_count(), 1);
}

#[tokio::test]
async fn test_reconnect_invalidates_cache() {
    let (mut orch, _) = setup(&SessionConfig::default()).await;
    orch.run_manual(Some("SELECT * FROM orders")).unwrap();
    orch.wait_idle().await.unwrap();
    assert!(orch.session_mut().select_statement("SELECT * FROM orders").is_some());

    let replacement = Arc::new(MockExecutionService::new());
    orch.reconnect(replacement.clone());

    assert!(orch.session_mut().select_statement("SELECT * FROM orders").is_none());
    assert!(orch.session().history().is_empty());

    // A miss means the statement must run again, against the new service
    orch.run_manual(Some("SELECT * FROM orders")).unwrap();
    orch.wait_idle().await.unwrap();
    assert_eq!(replacement.execute_count(), 1);
}

#[tokio::test]
async fn test_stale_result_after_reconnect_is_dropped() {
    let service = Arc::new(MockExecutionService::new().with_delay(Duration::from_millis(30)));
    let mut orch = Orchestrator::new(
        service,
        Arc::new(MemoryPreferenceStore::new(false)),
        &SessionConfig::default(),
    )
    .await;

    orch.run_manual(Some("SELECT now()")).unwrap();
    orch.reconnect(Arc::new(MockExecutionService::new()));

    assert_eq!(orch.next_completion().await.unwrap(), ExecutionReport::Stale);
    assert!(orch.session().history().is_empty());
    assert!(orch.session().displayed_result().is_none());
}

#[tokio::test]
async fn test_history_bounded_newest_first() {
    let config = SessionConfig {
        history_limit: 3,
        ..SessionConfig::default()
    };
    let (mut orch, _) = setup(&config).await;

    for i in 1..=5 {
        orch.run_manual(Some(&format!("SELECT {i}"))).unwrap();
        orch.wait_idle().await.unwrap();
    }

    let statements: Vec<&str> = orch
        .session()
        .history_entries()
        .map(|entry| entry.statement_text.as_str())
        .collect();
    assert_eq!(statements, vec!["SELECT 5", "SELECT 4", "SELECT 3"]);
}

#[tokio::test]
async fn test_same_statement_reexecuted_updates_cache() {
    let (mut orch, service) = setup(&SessionConfig::default()).await;
    service.push_response(Ok(QueryResult::ack("UPDATE 1", 1)));
    service.push_response(Ok(QueryResult::ack("UPDATE 2", 2)));

    for _ in 0..2 {
        orch.run_manual(Some("UPDATE t SET x = 1")).unwrap();
        orch.wait_idle().await.unwrap();
    }

    assert_eq!(orch.session().history().len(), 2);
    assert_eq!(
        orch.session().history().lookup("update t set x = 1"),
        Some(&QueryResult::ack("UPDATE 2", 2))
    );
}
