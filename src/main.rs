//! # Brain Assistant CLI (`brain`)
//!
//! ## Usage
//!
//! ```bash
//! brain --config ./config/brain.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `brain init` | Create the SQLite index and run schema migrations |
//! | `brain index` | Run one incremental indexing pass |
//! | `brain watch` | Index, then re-index whenever the vault changes |
//! | `brain ask "<question>"` | Answer a question from the vault |
//! | `brain status` | Show what the index holds |
//! | `brain budget show` | Refresh usage and print the remaining credits |
//! | `brain budget reset` | Start counting credits from now |
//! | `brain serve` | Start the HTTP API with a background watcher |
//!
//! Logs go to stderr and honour `RUST_LOG` (default `info`).

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use brain_assistant::ask::answer_query;
use brain_assistant::budget::{budget_text, refresh_budget, BudgetLedger};
use brain_assistant::config::{self, Config};
use brain_assistant::gateway::AlephAlphaGateway;
use brain_assistant::indexer::run_index_pass;
use brain_assistant::sqlite_index::SqliteIndex;
use brain_assistant::watch::{watch_vault, IndexWorker, PassContext};
use brain_assistant::{server, status};
use brain_assistant_core::gateway::EmbeddingGateway;
use brain_assistant_core::models::EMBEDDING_DIMS;
use brain_assistant_core::store::VectorIndex;

/// Brain Assistant: ask questions about your notes.
#[derive(Parser)]
#[command(
    name = "brain",
    about = "Brain Assistant: question answering over a local notes vault",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/brain.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the index database. Safe to run repeatedly.
    Init,

    /// Embed new and changed notes and drop deleted ones.
    Index,

    /// Run an indexing pass, then keep re-indexing on vault changes until Ctrl-C.
    Watch,

    /// Answer a question from the most relevant notes.
    Ask {
        /// The question.
        question: String,
    },

    /// Show index location, size, and note count.
    Status {
        /// Also list every indexed path.
        #[arg(long)]
        paths: bool,
    },

    /// Track provider credit usage.
    Budget {
        #[command(subcommand)]
        action: BudgetAction,
    },

    /// Start the HTTP API.
    Serve,
}

#[derive(Subcommand)]
enum BudgetAction {
    /// Fetch recent usage and print the remaining budget.
    Show,
    /// Set the budget fix point to now and clear the ledger.
    Reset,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let index = SqliteIndex::open(&cfg.index.path, EMBEDDING_DIMS).await?;
            index.close().await;
            println!("Index initialized at {}", cfg.index.path.display());
        }
        Commands::Index => run_index(&cfg).await?,
        Commands::Watch => run_watch(&cfg).await?,
        Commands::Ask { question } => run_ask(&cfg, &question).await?,
        Commands::Status { paths } => status::run_status(&cfg, paths).await?,
        Commands::Budget { action } => match action {
            BudgetAction::Show => {
                let gateway = AlephAlphaGateway::new(&cfg.provider)?;
                let remaining =
                    refresh_budget(&gateway, &cfg.budget.ledger_path, cfg.budget.credits).await?;
                println!("{}", budget_text(remaining));
            }
            BudgetAction::Reset => {
                let mut ledger = BudgetLedger::load(&cfg.budget.ledger_path);
                ledger.reset(chrono::Utc::now());
                ledger.save(&cfg.budget.ledger_path)?;
                println!("{}", budget_text(ledger.remaining(cfg.budget.credits)));
            }
        },
        Commands::Serve => server::run_server(&cfg).await?,
    }

    Ok(())
}

async fn open_backends(cfg: &Config) -> Result<(Arc<dyn EmbeddingGateway>, Arc<dyn VectorIndex>)> {
    let gateway: Arc<dyn EmbeddingGateway> = Arc::new(AlephAlphaGateway::new(&cfg.provider)?);
    let index: Arc<dyn VectorIndex> =
        Arc::new(SqliteIndex::open(&cfg.index.path, EMBEDDING_DIMS).await?);
    Ok((gateway, index))
}

async fn run_index(cfg: &Config) -> Result<()> {
    let (gateway, index) = open_backends(cfg).await?;
    let stats = run_index_pass(
        &cfg.vault,
        gateway.as_ref(),
        index.as_ref(),
        cfg.index.batch_size,
    )
    .await?;

    println!("Indexing complete:");
    println!("  scanned:   {}", stats.scanned);
    println!("  added:     {}", stats.added);
    println!("  updated:   {}", stats.updated);
    println!("  deleted:   {}", stats.deleted);
    println!("  unchanged: {}", stats.unchanged);
    if stats.skipped_files > 0 {
        println!("  skipped:   {} (unreadable)", stats.skipped_files);
    }
    Ok(())
}

async fn run_watch(cfg: &Config) -> Result<()> {
    let (gateway, index) = open_backends(cfg).await?;
    let worker = IndexWorker::spawn(
        PassContext {
            vault: cfg.vault.clone(),
            gateway,
            index,
            batch_size: cfg.index.batch_size,
        },
        cfg.watch.debounce(),
    );
    let mut outcomes = worker.subscribe();
    let _watcher = watch_vault(&cfg.vault, worker.clone())?;
    worker.trigger("startup").await?;

    println!("Watching {} (Ctrl-C to stop)", cfg.vault.root.display());
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            outcome = outcomes.recv() => match outcome {
                Ok(outcome) => match (&outcome.stats, &outcome.error) {
                    (Some(stats), _) if stats.changed() => println!(
                        "[{}] +{} ~{} -{} ({} ms)",
                        outcome.reason, stats.added, stats.updated, stats.deleted, outcome.duration_ms
                    ),
                    (_, Some(error)) => println!("[{}] failed: {}", outcome.reason, error),
                    _ => {}
                },
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "missed pass reports");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    worker.shutdown().await;
    Ok(())
}

async fn run_ask(cfg: &Config, question: &str) -> Result<()> {
    let (gateway, index) = open_backends(cfg).await?;
    let answer = answer_query(gateway.as_ref(), index.as_ref(), &cfg.vault.root, question).await?;

    println!("{}", answer.answer);
    if !answer.sources.is_empty() {
        println!();
        println!("Sources:");
        for source in &answer.sources {
            println!("  - {}", source);
        }
    }
    Ok(())
}
