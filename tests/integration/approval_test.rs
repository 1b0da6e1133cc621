//! Approval flow: proposals, approval, rejection and auto-execute.

use pretty_assertions::assert_eq;
use sql_gate::app::Orchestrator;
use sql_gate::chat::TranscriptMessage;
use sql_gate::config::SessionConfig;
use sql_gate::gate::{GateState, Resolution};
use sql_gate::persistence::MemoryPreferenceStore;
use sql_gate::query::Origin;
use sql_gate::service::{MockExecutionService, QueryResult, Value};
use sql_gate::session::ExecutionReport;
use std::sync::Arc;
use std::time::Duration;

const TRY_THIS: &str = "Try this:\n```sql\nSELECT id FROM users LIMIT 5\n```";

async fn setup(auto_execute: bool) -> (Orchestrator, Arc<MockExecutionService>) {
    setup_with(MockExecutionService::new(), auto_execute).await
}

async fn setup_with(
    service: MockExecutionService,
    auto_execute: bool,
) -> (Orchestrator, Arc<MockExecutionService>) {
    let service = Arc::new(service);
    let store = Arc::new(MemoryPreferenceStore::new(auto_execute));
    let orch = Orchestrator::new(service.clone(), store, &SessionConfig::default()).await;
    (orch, service)
}

fn user_ids() -> QueryResult {
    QueryResult::rows(
        vec!["id".to_string()],
        vec![vec![Value::Int(1)], vec![Value::Int(2)]],
    )
}

#[tokio::test]
async fn test_try_this_scenario() {
    let (mut orch, service) = setup_with(
        MockExecutionService::new().with_result("SELECT id FROM users LIMIT 5", user_ids()),
        false,
    )
    .await;
    let transcript = vec![
        TranscriptMessage::user("m1", "Show me a few users"),
        TranscriptMessage::assistant("m2", TRY_THIS),
    ];

    orch.on_transcript(&transcript);

    let pending = orch.session().pending().unwrap();
    assert_eq!(pending.statement_text, "SELECT id FROM users LIMIT 5");
    assert_eq!(
        orch.session().visible_transcript(&transcript),
        vec![transcript[0].clone()]
    );

    orch.approve(None).unwrap();
    orch.wait_idle().await.unwrap();

    assert_eq!(
        service.executed(),
        vec![("SELECT id FROM users LIMIT 5".to_string(), 200)]
    );
    let entry = orch.session().history().latest().unwrap();
    assert_eq!(entry.origin, Origin::Ai);
    assert_eq!(entry.row_count, 2);
    assert_eq!(
        orch.session().history().lookup("select id from users limit 5"),
        Some(&user_ids())
    );

    let visible = orch.session().visible_transcript(&transcript);
    assert_eq!(visible.last(), Some(&transcript[1]));
    assert_eq!(visible.len(), 2);
}

#[tokio::test]
async fn test_at_most_one_pending() {
    let (mut orch, service) = setup(false).await;
    let mut transcript = vec![TranscriptMessage::assistant(
        "a1",
        "```sql\nSELECT 1\n```",
    )];
    orch.on_transcript(&transcript);

    for i in 2..6 {
        transcript.push(TranscriptMessage::assistant(
            format!("a{i}"),
            format!("```sql\nSELECT {i}\n```"),
        ));
        orch.on_transcript(&transcript);

        assert_eq!(orch.session().pending().unwrap().statement_text, "SELECT 1");
    }
    assert_eq!(service.execute_count(), 0);
}

#[tokio::test]
async fn test_double_approve_executes_once() {
    let (mut orch, service) = setup(false).await;
    orch.on_transcript(&[TranscriptMessage::assistant("a1", TRY_THIS)]);

    orch.approve(Some("SELECT id FROM users LIMIT 10")).unwrap();
    assert!(orch.approve(None).is_err());
    orch.wait_idle().await.unwrap();
    assert!(orch.approve(None).is_err());

    assert_eq!(
        service.executed(),
        vec![("SELECT id FROM users LIMIT 10".to_string(), 200)]
    );
    assert_eq!(orch.session().history().len(), 1);
}

#[tokio::test]
async fn test_rejection_never_executes() {
    let (mut orch, service) = setup(false).await;
    let transcript = vec![
        TranscriptMessage::user("u1", "Drop the users table"),
        TranscriptMessage::assistant("a1", "```sql\nDROP TABLE users\n```"),
    ];

    orch.on_transcript(&transcript);
    orch.reject().unwrap();
    // Later re-renders must not bring the message or statement back
    orch.on_transcript(&transcript);

    assert_eq!(service.execute_count(), 0);
    assert!(orch.session().pending().is_none());
    assert_eq!(
        orch.session().visible_transcript(&transcript),
        vec![transcript[0].clone()]
    );
    assert_eq!(
        orch.session().gate_state(),
        GateState::Resolved(Resolution::Rejected)
    );
}

#[tokio::test]
async fn test_auto_execute_flip_drains_pending() {
    let (mut orch, service) = setup(false).await;
    let transcript = vec![TranscriptMessage::assistant("a1", TRY_THIS)];
    orch.on_transcript(&transcript);
    assert_eq!(service.execute_count(), 0);

    orch.set_auto_execute(true).await;
    orch.wait_idle().await.unwrap();

    assert_eq!(service.execute_count(), 1);
    assert!(orch.session().pending().is_none());
    assert_eq!(orch.session().visible_transcript(&transcript).len(), 1);
}

#[tokio::test]
async fn test_auto_execute_runs_immediately() {
    let (mut orch, service) = setup(true).await;

    assert!(orch.on_transcript(&[TranscriptMessage::assistant("a1", TRY_THIS)]));
    let reports = orch.wait_idle().await.unwrap();

    assert_eq!(reports.len(), 1);
    assert!(matches!(reports[0], ExecutionReport::Recorded { .. }));
    assert_eq!(service.execute_count(), 1);
    assert_eq!(orch.session().gate_state(), GateState::Resolved(Resolution::Executing));
}

#[tokio::test]
async fn test_auto_execute_while_busy_runs_after() {
    let (mut orch, service) =
        setup_with(MockExecutionService::new().with_delay(Duration::from_millis(20)), true).await;

    orch.run_manual(Some("SELECT pg_sleep(1)")).unwrap();
    assert!(!orch.on_transcript(&[TranscriptMessage::assistant("a1", TRY_THIS)]));
    assert!(orch.session().pending().is_some());

    let reports = orch.wait_idle().await.unwrap();

    assert_eq!(reports.len(), 2);
    assert_eq!(
        service.executed(),
        vec![
            ("SELECT pg_sleep(1)".to_string(), 200),
            ("SELECT id FROM users LIMIT 5".to_string(), 200),
        ]
    );
    let origins: Vec<Origin> = orch
        .session()
        .history_entries()
        .map(|entry| entry.origin)
        .collect();
    assert_eq!(origins, vec![Origin::Ai, Origin::Operator]);
}

#[tokio::test]
async fn test_only_first_block_is_gated() {
    let (mut orch, service) = setup(false).await;
    let message = TranscriptMessage::assistant(
        "a1",
        "First:\n```sql\nSELECT 1\n```\nThen:\n```sql\nSELECT 2\n```",
    );

    orch.on_transcript(&[message]);
    orch.approve(None).unwrap();
    orch.wait_idle().await.unwrap();

    assert_eq!(service.executed(), vec![("SELECT 1".to_string(), 200)]);
    assert!(orch.session().pending().is_none());
}

#[tokio::test]
async fn test_user_messages_never_gated() {
    let (mut orch, service) = setup(true).await;

    orch.on_transcript(&[TranscriptMessage::user("u1", "```sql\nDELETE FROM users\n```")]);

    assert!(orch.session().pending().is_none());
    assert_eq!(service.execute_count(), 0);
}

#[tokio::test]
async fn test_auto_execute_enabled_mid_run_survives_reconnect() {
    let slow = MockExecutionService::new().with_delay(Duration::from_millis(30));
    let (mut orch, old_service) = setup_with(slow, false).await;

    orch.run_manual(Some("SELECT pg_sleep(1)")).unwrap();
    let mut transcript = vec![TranscriptMessage::assistant("a1", TRY_THIS)];
    orch.on_transcript(&transcript);
    orch.set_auto_execute(true).await;

    let fresh = Arc::new(MockExecutionService::new());
    orch.reconnect(fresh.clone());
    orch.wait_idle().await.unwrap();

    assert!(orch.session().pending().is_none());
    assert_eq!(
        fresh.executed(),
        vec![("SELECT id FROM users LIMIT 5".to_string(), 200)]
    );

    transcript.push(TranscriptMessage::assistant("a2", "```sql\nSELECT 2\n```"));
    assert!(orch.on_transcript(&transcript));
    orch.wait_idle().await.unwrap();

    assert_eq!(fresh.execute_count(), 2);
    assert_eq!(old_service.execute_count(), 1);
}
