//! Integration tests for the state database.

use sql_gate::app::Orchestrator;
use sql_gate::config::SessionConfig;
use sql_gate::persistence::{PreferenceStore, PreferenceDb};
use sql_gate::service::MockExecutionService;
use std::sync::Arc;
use tempfile::tempdir;

#[tokio::test]
async fn test_state_db_creation() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("preferences.db");

    let db = PreferenceDb::open(&path).await.unwrap();
    assert!(path.exists());
    assert_eq!(db.path(), path.as_path());
    db.close().await;
}

#[tokio::test]
async fn test_auto_execute_survives_sessions() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("preferences.db");

    {
        let db = Arc::new(PreferenceDb::open(&path).await.unwrap());
        let mut orch = Orchestrator::new(
            Arc::new(MockExecutionService::new()),
            db.clone(),
            &SessionConfig::default(),
        )
        .await;
        assert!(!orch.session().auto_execute());

        orch.set_auto_execute(true).await;
        db.close().await;
    }

    let db = Arc::new(PreferenceDb::open(&path).await.unwrap());
    assert!(db.load_auto_execute().await.unwrap());

    let orch = Orchestrator::new(
        Arc::new(MockExecutionService::new()),
        db.clone(),
        &SessionConfig::default(),
    )
    .await;
    assert!(orch.session().auto_execute());
    db.close().await;
}

#[tokio::test]
async fn test_corrupt_database_recovered() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("preferences.db");
    std::fs::write(&path, b"this is not a sqlite database").unwrap();

    let db = PreferenceDb::open(&path).await.unwrap();
    assert!(db.set_aside().is_some());
    assert!(!db.load_auto_execute().await.unwrap());
    db.save_auto_execute(true).await.unwrap();
    assert!(db.load_auto_execute().await.unwrap());
    db.close().await;
}
