//! Diagnostic logging for the sql-gate CLI.
//!
//! stdout belongs to transcripts, prompts and result tables, so log lines
//! never go there. By default they go to stderr; `--log-file` sends them to
//! `sql-gate.log` in the platform state directory instead, which keeps an
//! interactive `review` session readable. `RUST_LOG` overrides the level.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Our own events at info, dependencies (sqlx echoes every statement at info)
/// only when something is wrong.
const DEFAULT_FILTER: &str = "warn,sql_gate=info";

const LOG_FILE_NAME: &str = "sql-gate.log";

/// Where diagnostic output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

impl LogTarget {
    /// Picks the target for the `--log-file` flag.
    pub fn from_flag(log_file: bool) -> Self {
        if log_file {
            LogTarget::File(log_file_path())
        } else {
            LogTarget::Stderr
        }
    }
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global subscriber and returns the target actually in use.
///
/// A log file that cannot be opened falls back to stderr with a warning.
pub fn init(target: LogTarget) -> LogTarget {
    let target = match target {
        LogTarget::File(path) => match open_log_file(&path) {
            Ok(file) => {
                tracing_subscriber::fmt()
                    .with_env_filter(filter())
                    .with_writer(file)
                    .with_ansi(false)
                    .init();
                return LogTarget::File(path);
            }
            Err(e) => {
                eprintln!("Warning: cannot log to {}: {e}", path.display());
                LogTarget::Stderr
            }
        },
        LogTarget::Stderr => LogTarget::Stderr,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_writer(io::stderr)
        .init();
    target
}

/// Creates the file fresh for each run.
fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    File::create(path)
}

/// `~/.local/state/sql-gate/sql-gate.log` on Linux; the config directory or
/// the temp directory where there is no state directory.
pub fn log_file_path() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::config_dir)
        .map(|dir| dir.join("sql-gate").join(LOG_FILE_NAME))
        .unwrap_or_else(|| std::env::temp_dir().join(LOG_FILE_NAME))
}
