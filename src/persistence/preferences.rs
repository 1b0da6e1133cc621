//! Durable operator preferences.
//!
//! The auto-execute switch is stored under a fixed key as the string
//! `"true"` or `"false"`, read once at session start and written on every
//! toggle.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::PreferenceDb;
use crate::error::{GateError, Result};

/// Storage key of the auto-execute preference.
pub const AUTO_EXECUTE_KEY: &str = "sqlAutoExecute";

/// Where the auto-execute preference lives between sessions.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Returns the stored value, `false` when never set.
    async fn load_auto_execute(&self) -> Result<bool>;

    async fn save_auto_execute(&self, enabled: bool) -> Result<()>;
}

fn encode(enabled: bool) -> &'static str {
    if enabled {
        "true"
    } else {
        "false"
    }
}

/// Anything other than `"true"` reads as off.
fn decode(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

/// Reads a preference value.
pub async fn get_preference(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM preferences WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await
        .map_err(|e| GateError::persistence(format!("Failed to read preference: {e}")))?;

    Ok(row.map(|(value,)| value))
}

/// Writes a preference value, replacing any previous one.
pub async fn set_preference(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO preferences (key, value, updated_at)
        VALUES (?, ?, datetime('now'))
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await
    .map_err(|e| GateError::persistence(format!("Failed to save preference: {e}")))?;

    Ok(())
}

#[async_trait]
impl PreferenceStore for PreferenceDb {
    async fn load_auto_execute(&self) -> Result<bool> {
        Ok(get_preference(self.pool(), AUTO_EXECUTE_KEY)
            .await?
            .as_deref()
            .map(decode)
            .unwrap_or(false))
    }

    async fn save_auto_execute(&self, enabled: bool) -> Result<()> {
        set_preference(self.pool(), AUTO_EXECUTE_KEY, encode(enabled)).await
    }
}

/// In-process store for tests and `--ephemeral` runs.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    auto_execute: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryPreferenceStore {
    pub fn new(auto_execute: bool) -> Self {
        Self {
            auto_execute: AtomicBool::new(auto_execute),
            writes: AtomicUsize::new(0),
        }
    }

    /// Number of saves so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn load_auto_execute(&self) -> Result<bool> {
        Ok(self.auto_execute.load(Ordering::SeqCst))
    }

    async fn save_auto_execute(&self, enabled: bool) -> Result<()> {
        self.auto_execute.store(enabled, Ordering::SeqCst);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
