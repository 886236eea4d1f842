//! # casework
//!
//! Casework orchestration binary: wires the transport, protocol, task
//! queues and dispatcher together, and exposes the workflow state machine
//! on the command line.

#![deny(unsafe_code)]

mod app;
mod dispatcher;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use casework_core::BackoffPolicy;
use casework_settings::CaseworkSettings;
use casework_tasks::{NewTask, TaskManager};
use casework_workflow::{Workflow, WorkflowAction};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::app::App;
use crate::dispatcher::Dispatcher;

/// How often `run` prints queue status.
const STATUS_INTERVAL: Duration = Duration::from_secs(10);

/// Casework agent orchestration.
#[derive(Parser, Debug)]
#[command(name = "casework", about = "Casework agent orchestration")]
struct Cli {
    /// Settings file (defaults to `~/.casework/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect to the worker endpoint and dispatch queued tasks.
    Run {
        /// Use the synthetic transport instead of a socket.
        #[arg(long)]
        mock: bool,

        /// Worker endpoint URL (overrides settings).
        #[arg(long)]
        url: Option<String>,

        /// JSON file with an array of tasks to queue on startup.
        #[arg(long)]
        tasks: Option<PathBuf>,
    },

    /// Evaluate a workflow action against a case record.
    Workflow {
        /// Case record JSON file.
        record: PathBuf,

        /// Action (`submit_review`, `approve`, ...).
        action: String,
    },

    /// List the workflow actions available to a case record.
    Actions {
        /// Case record JSON file.
        record: PathBuf,
    },
}

fn load_settings(path: Option<&Path>) -> Result<CaseworkSettings> {
    let path = path.map_or_else(casework_settings::settings_path, Path::to_path_buf);
    casework_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))
}

fn read_json(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Workflow commands
// ─────────────────────────────────────────────────────────────────────────────

fn evaluate_workflow(record: &Value, action: &str) -> Result<Value> {
    let action: WorkflowAction = action.parse().map_err(anyhow::Error::msg)?;
    Ok(match Workflow::transition_workflow(record, action) {
        Ok(to) => json!({ "success": true, "newState": to }),
        Err(rejection) => {
            let mut out = serde_json::to_value(&rejection)?;
            out["success"] = json!(false);
            out
        }
    })
}

fn available_actions(record: &Value) -> Value {
    json!(Workflow::get_available_actions(record))
}

// ─────────────────────────────────────────────────────────────────────────────
// Run
// ─────────────────────────────────────────────────────────────────────────────

fn seed_tasks(tasks: &TaskManager, path: &Path) -> Result<usize> {
    let value = read_json(path)?;
    let batch: Vec<NewTask> = serde_json::from_value(value)
        .with_context(|| format!("Invalid task list in {}", path.display()))?;
    let count = batch.len();
    for new in batch {
        let _ = tasks.submit(new);
    }
    Ok(count)
}

fn print_queue_status(tasks: &TaskManager) {
    for status in tasks.queue_statuses() {
        println!(
            "{:<14} pending {:>3}  processing {:>2}/{}  processed {:>4}  success {:>5.1}%  avg {:.0}ms{}",
            status.category.as_str(),
            status.pending,
            status.processing,
            status.capacity,
            status.metrics.total_processed,
            status.metrics.success_rate,
            status.metrics.average_processing_time_ms,
            if status.paused { "  (paused)" } else { "" },
        );
    }
}

async fn run(
    mut settings: CaseworkSettings,
    mock: bool,
    url: Option<String>,
    seed: Option<PathBuf>,
) -> Result<()> {
    if mock {
        settings.transport.mock = true;
    }
    if let Some(url) = url {
        settings.transport.url = url;
    }
    settings.validate().context("Invalid settings")?;

    let app = App::new(settings);
    let cancel = CancellationToken::new();

    let mut dashboard = app.protocol.dashboard_events();
    let dashboard_cancel = cancel.clone();
    let _dashboard_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                () = dashboard_cancel.cancelled() => break,
                ev = dashboard.recv() => match ev {
                    Ok(ev) => println!("[{}] {}", ev.kind(), ev.summary()),
                    Err(RecvError::Lagged(n)) => tracing::warn!(skipped = n, "dashboard printer lagging"),
                    Err(RecvError::Closed) => break,
                },
            }
        }
    });

    let mut connection = app.protocol.watch_connection();
    let connection_cancel = cancel.clone();
    let _connection_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                () = connection_cancel.cancelled() => break,
                changed = connection.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    println!("connection: {}", *connection.borrow_and_update());
                }
            }
        }
    });

    if let Err(e) = app.protocol.connect().await {
        tracing::warn!(error = %e, "initial connect failed, retrying in background");
    }

    let retry = BackoffPolicy {
        max_attempts: 2,
        ..app.settings.transport.reconnect
    };
    let dispatcher = Arc::new(Dispatcher::new(app.protocol.clone(), app.tasks.clone(), retry));
    let dispatcher_handle = tokio::spawn(dispatcher.run(cancel.clone()));

    if let Some(path) = seed {
        let count = seed_tasks(&app.tasks, &path)?;
        tracing::info!(count, path = %path.display(), "queued tasks from file");
    }

    let mut status_tick = tokio::time::interval(STATUS_INTERVAL);
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for ctrl-c")?;
                break;
            }
            _ = status_tick.tick() => print_queue_status(&app.tasks),
        }
    }

    tracing::info!("Shutting down...");
    cancel.cancel();
    let _ = dispatcher_handle.await;
    app.protocol.disconnect().await;
    print_queue_status(&app.tasks);
    tracing::info!("Shutdown complete");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(cli.settings.as_deref())?;
    casework_core::logging::init_subscriber(&settings.logging.level, settings.logging.json);

    match cli.command {
        Command::Run { mock, url, tasks } => run(settings, mock, url, tasks).await,
        Command::Workflow { record, action } => {
            let record = read_json(&record)?;
            let result = evaluate_workflow(&record, &action)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Command::Actions { record } => {
            let record = read_json(&record)?;
            println!("{}", available_actions(&record));
            Ok(())
        }
    }
}
