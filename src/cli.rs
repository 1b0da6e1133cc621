//! Command-line argument parsing for sql-gate.

use clap::{Parser, Subcommand, ValueEnum};
use sql_gate::config::Config;
use std::path::PathBuf;

/// Human approval gate between AI-proposed SQL and a live database.
#[derive(Parser, Debug)]
#[command(name = "sql-gate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Execution service base URL (overrides config and SQL_GATE_URL)
    #[arg(long, value_name = "URL", global = true)]
    pub url: Option<String>,

    /// Keep preferences in memory only
    #[arg(long, global = true)]
    pub ephemeral: bool,

    /// Log to the state directory instead of stderr
    #[arg(long, global = true)]
    pub log_file: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Replay a transcript, approving or rejecting each proposed statement
    Review {
        /// JSON array of {id, sender, content} messages
        #[arg(value_name = "TRANSCRIPT")]
        transcript: PathBuf,
    },
    /// Run a statement directly, bypassing approval
    Run {
        #[arg(value_name = "SQL")]
        sql: String,
    },
    /// Show or set the durable auto-execute preference
    AutoExecute {
        #[arg(value_enum)]
        state: Option<Switch>,
    },
    /// Print the database schema
    Schema,
    /// Ask the advisor for improvements to a statement
    Suggest {
        #[arg(value_name = "SQL")]
        sql: String,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Switch {
    On,
    Off,
}

impl Switch {
    pub fn enabled(self) -> bool {
        matches!(self, Switch::On)
    }
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }
}
