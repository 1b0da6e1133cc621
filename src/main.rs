//! sql-gate - a human approval gate between AI-proposed SQL and a live database.

mod cli;

use anyhow::{Context, Result};
use cli::{Cli, Command};
use sql_gate::app::Orchestrator;
use sql_gate::chat::TranscriptMessage;
use sql_gate::config::Config;
use sql_gate::error::GateError;
use sql_gate::logging;
use sql_gate::persistence::{MemoryPreferenceStore, PreferenceDb, PreferenceStore};
use sql_gate::service::{ExecutionService, HttpExecutionService, QueryResult};
use sql_gate::session::ExecutionReport;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();
    let target = logging::init(logging::LogTarget::from_flag(cli.log_file));
    debug!(?target, "Logging initialised");

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<GateError>() {
            Some(gate) => error!("{}: {}", gate.category(), gate),
            None => error!("{e:#}"),
        }
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;

    // Precedence: --url, then SQL_GATE_URL, then the config file.
    config.service.apply_env_overrides();
    if let Some(url) = &cli.url {
        config.service.base_url = url.clone();
    }
    config.validate()?;

    let preference_db = if cli.ephemeral {
        None
    } else {
        let db = PreferenceDb::open_default().await?;
        if let Some(old) = db.set_aside() {
            eprintln!(
                "Preferences were unreadable and have been reset (old file: {})",
                old.display()
            );
        }
        Some(Arc::new(db))
    };
    let preferences: Arc<dyn PreferenceStore> = match &preference_db {
        Some(db) => db.clone(),
        None => Arc::new(MemoryPreferenceStore::new(false)),
    };
    let service: Arc<dyn ExecutionService> =
        Arc::new(HttpExecutionService::new(&config.service)?);

    let mut orch = Orchestrator::new(service, preferences, &config.session).await;

    let outcome = execute(&mut orch, cli.command).await;

    if let Some(db) = preference_db {
        db.close().await;
    }
    outcome
}

async fn execute(orch: &mut Orchestrator, command: Command) -> Result<()> {
    match command {
        Command::Review { transcript } => review(orch, &transcript).await,
        Command::Run { sql } => run_statement(orch, &sql).await,
        Command::AutoExecute { state } => {
            if let Some(state) = state {
                orch.set_auto_execute(state.enabled()).await;
            }
            let label = if orch.session().auto_execute() { "on" } else { "off" };
            println!("Auto-execute is {label}");
            Ok(())
        }
        Command::Schema => {
            let schema = orch.refresh_schema(true).await?;
            print!("{}", schema.summary());
            Ok(())
        }
        Command::Suggest { sql } => {
            let panel = orch.request_suggestions(Some(&sql)).await;
            if let Some(error) = &panel.error {
                anyhow::bail!("Suggestions unavailable: {error}");
            }
            if let Some(response) = &panel.response {
                println!("{}", response.analysis);
                for (i, suggestion) in response.suggestions.iter().enumerate() {
                    println!("\n{}. {}", i + 1, suggestion.sql);
                    if let Some(explanation) = &suggestion.explanation {
                        println!("   {explanation}");
                    }
                }
            }
            Ok(())
        }
    }
}

async fn run_statement(orch: &mut Orchestrator, sql: &str) -> Result<()> {
    orch.run_manual(Some(sql))?;
    for report in orch.wait_idle().await? {
        if let ExecutionReport::Failed { banner } = report {
            anyhow::bail!(banner);
        }
    }
    if let Some(result) = orch.session().displayed_result() {
        print!("{}", render_result(result));
    }
    Ok(())
}

/// Replays a transcript one message at a time, prompting for every statement
/// that lands in the gate.
async fn review(orch: &mut Orchestrator, path: &Path) -> Result<()> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read transcript {}", path.display()))?;
    let messages: Vec<TranscriptMessage> =
        serde_json::from_str(&content).context("Transcript must be a JSON array of messages")?;

    let mut input = BufReader::new(tokio::io::stdin()).lines();

    'replay: for end in 1..=messages.len() {
        orch.on_transcript(&messages[..end]);
        print_reports(orch.wait_idle().await?);

        while let Some(pending) = orch.session().pending().cloned() {
            println!("\nProposed statement:\n{}", pending.statement_text);
            let Some(answer) = prompt(&mut input, "Run it? [y]es/[n]o/[e]dit/[a]uto-execute: ").await?
            else {
                println!();
                break 'replay;
            };

            match answer.trim() {
                "y" | "yes" => match orch.approve(None) {
                    // Busy: let the running statement finish, then ask again
                    Ok(()) | Err(GateError::Busy) => print_reports(orch.wait_idle().await?),
                    Err(e) => eprintln!("{e}"),
                },
                "n" | "no" => orch.reject()?,
                "e" | "edit" => {
                    let Some(text) = prompt(&mut input, "New statement: ").await? else {
                        break 'replay;
                    };
                    if let Err(e) = orch.session_mut().edit_pending(text.trim()) {
                        eprintln!("{e}");
                    }
                }
                "a" | "auto" => {
                    orch.set_auto_execute(true).await;
                    print_reports(orch.wait_idle().await?);
                }
                _ => println!("Please answer y, n, e or a."),
            }
        }
    }

    println!("\n--- Transcript ---");
    for message in orch.session().visible_transcript(&messages) {
        println!("[{}] {}", message.sender.label(), message.content);
    }

    println!("\n--- History ---");
    for entry in orch.session().history_entries() {
        println!(
            "{} ({}, {} rows) {}",
            entry.id, entry.origin, entry.row_count, entry.statement_text
        );
    }
    Ok(())
}

async fn prompt(input: &mut Lines<BufReader<Stdin>>, text: &str) -> Result<Option<String>> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(text.as_bytes()).await?;
    stdout.flush().await?;
    Ok(input.next_line().await?)
}

fn print_reports(reports: Vec<ExecutionReport>) {
    for report in reports {
        match report {
            ExecutionReport::Recorded { result, .. } => print!("{}", render_result(&result)),
            ExecutionReport::Failed { banner } => eprintln!("! {banner}"),
            ExecutionReport::Stale => {}
        }
    }
}

/// Plain-text rendering of a result for the terminal.
fn render_result(result: &QueryResult) -> String {
    let mut out = String::new();
    match result {
        QueryResult::Rows(set) => {
            out.push_str(&set.columns.join(" | "));
            out.push('\n');
            for row in &set.rows {
                let cells: Vec<String> = row.iter().map(|v| v.to_display_string()).collect();
                out.push_str(&cells.join(" | "));
                out.push('\n');
            }
            out.push_str(&format!(
                "({} rows, {} ms)\n",
                set.row_count, set.execution_time_ms
            ));
        }
        QueryResult::Ack(ack) => {
            out.push_str(&format!(
                "{} ({} rows affected, {} ms)\n",
                ack.message, ack.row_count, ack.execution_time_ms
            ));
        }
    }
    if let Some(warning) = result.truncation_warning() {
        out.push_str(&warning);
        out.push('\n');
    }
    out
}
