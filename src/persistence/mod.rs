//! Durable preferences for sql-gate.
//!
//! One small SQLite file holds the operator's preferences between runs.
//! Today that is only the auto-execute switch (see [`preferences`]).

mod migrations;
pub mod preferences;

pub use preferences::{MemoryPreferenceStore, PreferenceStore, AUTO_EXECUTE_KEY};

use crate::error::{GateError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

const FILE_NAME: &str = "preferences.db";

/// Suffix given to a preferences file that could not be opened.
const UNREADABLE_SUFFIX: &str = "unreadable";

/// The on-disk preference store.
pub struct PreferenceDb {
    pool: SqlitePool,
    path: PathBuf,
    set_aside: Option<PathBuf>,
}

impl PreferenceDb {
    /// Opens the preferences file in the user's config directory,
    /// e.g. `~/.config/sql-gate/preferences.db`.
    pub async fn open_default() -> Result<Self> {
        Self::open(&Self::default_path()?).await
    }

    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| GateError::persistence("No config directory for preferences"))?;
        Ok(config_dir.join("sql-gate").join(FILE_NAME))
    }

    /// Opens or creates the preferences file at `path`.
    ///
    /// A file that exists but cannot be read as a preferences database is
    /// renamed out of the way and replaced by an empty one, so every
    /// preference falls back to its default. [`PreferenceDb::set_aside`]
    /// reports where the old file went.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| {
                GateError::persistence(format!(
                    "Cannot create preferences directory {}: {e}",
                    dir.display()
                ))
            })?;
        }

        let (pool, set_aside) = match load(path).await {
            Ok(pool) => (pool, None),
            Err(LoadError::Unreadable(e)) if path.exists() => {
                warn!("Preferences at {} are unreadable: {e}", path.display());
                let moved = set_aside_unreadable(path)?;
                let pool = load(path).await.map_err(|e| {
                    GateError::persistence(format!(
                        "Cannot start fresh preferences: {}",
                        e.into_inner()
                    ))
                })?;
                (pool, Some(moved))
            }
            Err(e) => return Err(e.into_inner()),
        };

        debug!("Preferences loaded from {}", path.display());
        Ok(Self {
            pool,
            path: path.to_path_buf(),
            set_aside,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where an unreadable preferences file was moved when this one was
    /// opened, if that happened.
    pub fn set_aside(&self) -> Option<&Path> {
        self.set_aside.as_deref()
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

enum LoadError {
    /// The file is not a preferences database we can read.
    Unreadable(GateError),
    /// The file is fine but must be left alone, e.g. written by a newer
    /// sql-gate.
    Refused(GateError),
}

impl LoadError {
    fn into_inner(self) -> GateError {
        match self {
            LoadError::Unreadable(e) | LoadError::Refused(e) => e,
        }
    }
}

/// Connects and brings the preferences table up to date.
async fn load(path: &Path) -> std::result::Result<SqlitePool, LoadError> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5));

    // One CLI process, one writer.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .map_err(|e| {
            LoadError::Unreadable(GateError::persistence(format!(
                "Cannot open preferences: {e}"
            )))
        })?;

    let outcome = match migrations::schema_version(&pool).await {
        Err(e) => Err(LoadError::Unreadable(e)),
        Ok(version) if version > migrations::CURRENT_VERSION => {
            Err(LoadError::Refused(GateError::persistence(format!(
                "Preferences were written by a newer sql-gate (schema v{version}, \
                 this build understands v{}). Please upgrade sql-gate.",
                migrations::CURRENT_VERSION
            ))))
        }
        Ok(_) => migrations::run_migrations(&pool)
            .await
            .map_err(LoadError::Unreadable),
    };

    match outcome {
        Ok(()) => Ok(pool),
        Err(e) => {
            pool.close().await;
            Err(e)
        }
    }
}

fn set_aside_unreadable(path: &Path) -> Result<PathBuf> {
    let mut target = path.as_os_str().to_owned();
    target.push(".");
    target.push(UNREADABLE_SUFFIX);
    let target = PathBuf::from(target);

    std::fs::rename(path, &target).map_err(|e| {
        GateError::persistence(format!(
            "Cannot move unreadable preferences to {}: {e}",
            target.display()
        ))
    })?;
    warn!(
        "Auto-execute and other preferences reset; old file kept at {}",
        target.display()
    );
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_open_creates_file_and_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a").join("b").join(FILE_NAME);

        let db = PreferenceDb::open(&path).await.unwrap();
        assert!(path.exists());
        assert_eq!(db.path(), path.as_path());
        assert!(db.set_aside().is_none());
        db.close().await;
    }

    #[tokio::test]
    async fn test_unreadable_file_is_set_aside() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(FILE_NAME);
        std::fs::write(&path, b"definitely not sqlite").unwrap();

        let db = PreferenceDb::open(&path).await.unwrap();
        let moved = db.set_aside().unwrap().to_path_buf();

        assert_eq!(moved, dir.path().join("preferences.db.unreadable"));
        assert_eq!(std::fs::read(&moved).unwrap(), b"definitely not sqlite");
        assert!(path.exists());
        db.close().await;
    }

    #[tokio::test]
    async fn test_reopen_keeps_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(FILE_NAME);

        PreferenceDb::open(&path).await.unwrap().close().await;
        let db = PreferenceDb::open(&path).await.unwrap();

        assert!(db.set_aside().is_none());
        db.close().await;
    }

    #[tokio::test]
    async fn test_newer_file_left_in_place() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(FILE_NAME);
        let db = PreferenceDb::open(&path).await.unwrap();
        sqlx::query("INSERT INTO schema_versions (version) VALUES (?)")
            .bind(migrations::CURRENT_VERSION + 1)
            .execute(db.pool())
            .await
            .unwrap();
        db.close().await;

        let err = PreferenceDb::open(&path).await.err().unwrap();

        assert!(err.to_string().contains("newer sql-gate"));
        assert!(path.exists());
        assert!(!dir.path().join("preferences.db.unreadable").exists());
    }

    #[test]
    fn test_default_path_names_file() {
        if let Ok(path) = PreferenceDb::default_path() {
            assert!(path.ends_with("sql-gate/preferences.db"));
        }
    }
}
