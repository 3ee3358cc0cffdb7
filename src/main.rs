//! Workspace Engine CLI
//!
//! One subcommand per engine operation, each printing the JSON response.
//! `serve` reads one JSON request per line from stdin and keeps the process
//! alive so background tasks and change polling keep running.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use workspace_engine::models::command::PresetKind;
use workspace_engine::models::task::{TaskStatus, TaskType};
use workspace_engine::storage::ConfigService;
use workspace_engine::{dispatch, dispatch_json, EngineState, Request};

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "workspace-engine")]
#[command(about = "Workspace execution and code-intelligence engine")]
struct Cli {
    /// Path to config file (default: ~/.workspace-engine/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Owner the request is made on behalf of
    #[arg(long, global = true, default_value = "local")]
    owner: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read JSON requests from stdin, one per line, until EOF
    Serve,

    /// Start a background task
    CreateTask {
        workspace_id: String,
        /// install, build, test, lint or custom
        #[arg(value_parser = parse_task_type)]
        task_type: TaskType,
        command: String,
        /// Wait for the task to finish and print its final state
        #[arg(long)]
        wait: bool,
    },

    /// List recent tasks of a workspace
    ListTasks {
        workspace_id: String,
        #[arg(long, value_parser = parse_task_status)]
        status: Option<TaskStatus>,
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show one task
    GetTask { task_id: String },

    /// Cancel a pending or running task
    CancelTask { task_id: String },

    /// Run install, build, test or lint and wait for it
    RunPreset {
        workspace_id: String,
        #[arg(value_parser = parse_preset)]
        preset: PresetKind,
    },

    /// Run a shell command in the workspace and wait for it
    Exec {
        workspace_id: String,
        command: String,
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Print a workspace file
    ReadFile { workspace_id: String, path: String },

    /// Write a workspace file
    WriteFile {
        workspace_id: String,
        path: String,
        content: String,
    },

    /// Delete a workspace file
    DeleteFile { workspace_id: String, path: String },

    /// Build/rebuild the codebase index
    BuildIndex {
        workspace_id: String,
        /// Directory to index, relative to the workspace root
        #[arg(long, default_value = ".")]
        path: String,
        /// Also generate embeddings for semantic search
        #[arg(long)]
        embeddings: bool,
    },

    /// Show index status
    IndexStatus { workspace_id: String },

    /// Find indexed symbols by name
    Symbols {
        workspace_id: String,
        pattern: String,
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Semantic search over embedded chunks
    Search {
        workspace_id: String,
        query: String,
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Print changes after a watermark
    Changes {
        workspace_id: String,
        #[arg(long, default_value = "0")]
        since: i64,
    },

    /// Poll for changes until interrupted, printing each event
    Watch {
        workspace_id: String,
        #[arg(long, default_value = "0")]
        since: i64,
    },
}

fn parse_task_type(s: &str) -> Result<TaskType, String> {
    TaskType::parse(s).ok_or_else(|| format!("unknown task type: {}", s))
}

fn parse_task_status(s: &str) -> Result<TaskStatus, String> {
    TaskStatus::parse(s).ok_or_else(|| format!("unknown task status: {}", s))
}

fn parse_preset(s: &str) -> Result<PresetKind, String> {
    PresetKind::parse(s).ok_or_else(|| format!("unknown preset: {}", s))
}

impl Command {
    /// The request this subcommand maps to; `None` for the interactive modes.
    fn to_request(&self) -> Option<Request> {
        let request = match self {
            Command::Serve | Command::Watch { .. } => return None,
            Command::CreateTask {
                workspace_id,
                task_type,
                command,
                ..
            } => Request::CreateTask {
                workspace_id: workspace_id.clone(),
                task_type: *task_type,
                command: command.clone(),
            },
            Command::ListTasks {
                workspace_id,
                status,
                limit,
            } => Request::ListTasks {
                workspace_id: workspace_id.clone(),
                status: *status,
                limit: *limit,
            },
            Command::GetTask { task_id } => Request::GetTask {
                task_id: task_id.clone(),
            },
            Command::CancelTask { task_id } => Request::CancelTask {
                task_id: task_id.clone(),
            },
            Command::RunPreset {
                workspace_id,
                preset,
            } => Request::RunPreset {
                workspace_id: workspace_id.clone(),
                preset: *preset,
            },
            Command::Exec {
                workspace_id,
                command,
                timeout_ms,
            } => Request::ExecuteCommand {
                workspace_id: workspace_id.clone(),
                command: command.clone(),
                timeout_ms: *timeout_ms,
            },
            Command::ReadFile { workspace_id, path } => Request::ReadFile {
                workspace_id: workspace_id.clone(),
                path: path.clone(),
            },
            Command::WriteFile {
                workspace_id,
                path,
                content,
            } => Request::WriteFile {
                workspace_id: workspace_id.clone(),
                path: path.clone(),
                content: content.clone(),
            },
            Command::DeleteFile { workspace_id, path } => Request::DeleteFile {
                workspace_id: workspace_id.clone(),
                path: path.clone(),
            },
            Command::BuildIndex {
                workspace_id,
                path,
                embeddings,
            } => Request::BuildIndex {
                workspace_id: workspace_id.clone(),
                path: path.clone(),
                include_embeddings: *embeddings,
            },
            Command::IndexStatus { workspace_id } => Request::IndexStatus {
                workspace_id: workspace_id.clone(),
            },
            Command::Symbols {
                workspace_id,
                pattern,
                limit,
            } => Request::QuerySymbols {
                workspace_id: workspace_id.clone(),
                pattern: pattern.clone(),
                limit: *limit,
            },
            Command::Search {
                workspace_id,
                query,
                limit,
            } => Request::Search {
                workspace_id: workspace_id.clone(),
                query: query.clone(),
                limit: *limit,
            },
            Command::Changes {
                workspace_id,
                since,
            } => Request::PollChanges {
                workspace_id: workspace_id.clone(),
                since: *since,
            },
        };
        Some(request)
    }
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Poll the task until it reaches a terminal state and return the last response.
async fn wait_for_task(state: &EngineState, owner: &str, created: Value) -> Value {
    let Some(task_id) = created["data"]["task_id"].as_str().map(str::to_string) else {
        return created;
    };
    loop {
        let response = dispatch(
            state,
            owner,
            Request::GetTask {
                task_id: task_id.clone(),
            },
        )
        .await;
        let terminal = response["data"]["status"]
            .as_str()
            .and_then(TaskStatus::parse)
            .map(TaskStatus::is_terminal)
            .unwrap_or(true);
        if terminal {
            return response;
        }
        tokio::time::sleep(WAIT_POLL_INTERVAL).await;
    }
}

async fn serve(state: &EngineState, owner: &str) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let poller = state.spawn_change_polling(cancel.clone());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = dispatch_json(state, owner, &line).await;
        println!("{}", serde_json::to_string(&response)?);
    }

    cancel.cancel();
    poller.await?;
    Ok(())
}

async fn watch(state: &EngineState, owner: &str, workspace_id: &str, since: i64) -> anyhow::Result<()> {
    let mut watermark = since;
    let mut ticker = tokio::time::interval(state.config().watcher.poll_interval());
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {}
        }
        let response = dispatch(
            state,
            owner,
            Request::PollChanges {
                workspace_id: workspace_id.to_string(),
                since: watermark,
            },
        )
        .await;
        if response["success"] != Value::Bool(true) {
            print_json(&response)?;
            break;
        }
        if let Some(events) = response["data"].as_array() {
            for event in events {
                println!("{}", serde_json::to_string(event)?);
                if let Some(ts) = event["timestamp"].as_i64() {
                    watermark = watermark.max(ts);
                }
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("workspace_engine=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_service = match &cli.config {
        Some(path) => ConfigService::open(path),
        None => ConfigService::new(),
    }
    .context("failed to load configuration")?;
    let state = EngineState::new(config_service.get_config().clone())
        .context("failed to initialize engine")?;

    match &cli.command {
        Command::Serve => serve(&state, &cli.owner).await?,
        Command::Watch {
            workspace_id,
            since,
        } => watch(&state, &cli.owner, workspace_id, *since).await?,
        command => {
            let Some(request) = command.to_request() else {
                return Ok(());
            };
            let mut response = dispatch(&state, &cli.owner, request).await;
            if let Command::CreateTask { wait: true, .. } = command {
                response = wait_for_task(&state, &cli.owner, response).await;
            }
            print_json(&response)?;
        }
    }

    Ok(())
}
