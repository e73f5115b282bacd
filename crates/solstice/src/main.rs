//! Solstice: event custom-table migration driver.
//!
//! Main binary with subcommands:
//! - `status`: show the persisted migration phase and gates
//! - `preview`: dry-run the strategy over the events file
//! - `migrate`: migrate events into the custom tables
//! - `cancel`: resolve an in-progress run back to the preview prompt
//! - `undo`: reverse a completed migration (locked in this version)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::Result;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use solstice_migration::{
    JsonFileStore, LegacyEvent, MemoryEvents, MemoryTables, MigrationState,
    SINGLE_EVENT_SLUG, SingleEventStrategy, StrategyRegistry, TableWriter,
};

mod runner;

use runner::{BatchSummary, RunKind};

#[derive(Parser)]
#[command(name = "solstice")]
#[command(about = "Event custom-table migration driver", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the persisted migration phase and gates
    Status {
        /// Directory holding the durable migration state
        #[arg(long, env = "SOLSTICE_DATA_DIR", default_value = "./data")]
        data_dir: PathBuf,
    },

    /// Dry-run the migration over the events file without touching tables
    Preview {
        /// Directory holding the durable migration state
        #[arg(long, env = "SOLSTICE_DATA_DIR", default_value = "./data")]
        data_dir: PathBuf,

        /// JSON file of legacy events to process
        #[arg(long, env = "SOLSTICE_EVENTS")]
        events: PathBuf,

        /// Strategy slug to apply per event
        #[arg(long, default_value = SINGLE_EVENT_SLUG)]
        strategy: String,
    },

    /// Migrate events into the custom tables and advance the phase
    Migrate {
        /// Directory holding the durable migration state
        #[arg(long, env = "SOLSTICE_DATA_DIR", default_value = "./data")]
        data_dir: PathBuf,

        /// JSON file of legacy events to process
        #[arg(long, env = "SOLSTICE_EVENTS")]
        events: PathBuf,

        /// Strategy slug to apply per event
        #[arg(long, default_value = SINGLE_EVENT_SLUG)]
        strategy: String,
    },

    /// Resolve an in-progress run back to the preview prompt
    Cancel {
        /// Directory holding the durable migration state
        #[arg(long, env = "SOLSTICE_DATA_DIR", default_value = "./data")]
        data_dir: PathBuf,
    },

    /// Reverse a completed migration
    Undo {
        /// Directory holding the durable migration state
        #[arg(long, env = "SOLSTICE_DATA_DIR", default_value = "./data")]
        data_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "solstice=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Status { data_dir } => run_status(&data_dir),

        Commands::Preview {
            data_dir,
            events,
            strategy,
        } => run_pass_command(&data_dir, &events, &strategy, RunKind::Preview).await,

        Commands::Migrate {
            data_dir,
            events,
            strategy,
        } => run_pass_command(&data_dir, &events, &strategy, RunKind::Migration).await,

        Commands::Cancel { data_dir } => run_cancel(&data_dir),

        Commands::Undo { data_dir } => run_undo(&data_dir),
    }
}

/// Hydrate the migration state from the options file under `data_dir`.
fn open_state(data_dir: &Path) -> Result<MigrationState> {
    let store = Arc::new(JsonFileStore::new(data_dir.join("options.json")));
    MigrationState::load(store).map_err(|e| miette::miette!("{}", e))
}

async fn load_events(path: &Path) -> Result<Vec<LegacyEvent>> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| miette::miette!("cannot read events file {}: {}", path.display(), e))?;
    serde_json::from_str(&contents)
        .map_err(|e| miette::miette!("cannot parse events file {}: {}", path.display(), e))
}

fn run_status(data_dir: &Path) -> Result<()> {
    let state = open_state(data_dir)?;

    println!("phase:                 {}", state.phase());
    println!("completed:             {}", state.is_completed());
    println!("running:               {}", state.is_running());
    println!("locked for maintenance: {}", state.should_lock_for_maintenance());
    println!("required:              {}", state.is_required());
    println!("can be undone:         {}", state.can_be_undone());
    match state.complete_timestamp() {
        Some(at) => println!("completed at:          {}", at.to_rfc3339()),
        None => println!("completed at:          -"),
    }

    for kind in ["preview", "migration"] {
        if let Some(total) = state.get(&[kind, "total"]) {
            let succeeded = state.get_or(&[kind, "succeeded"], &serde_json::Value::Null);
            let failed = state.get_or(&[kind, "failed"], &serde_json::Value::Null);
            println!("last {kind}: {total} total, {succeeded} succeeded, {failed} failed");
        }
    }

    Ok(())
}

async fn run_pass_command(
    data_dir: &Path,
    events_path: &Path,
    slug: &str,
    kind: RunKind,
) -> Result<()> {
    let mut state = open_state(data_dir)?;

    if state.is_running() {
        return Err(miette::miette!(
            "a run is already in progress (phase {}); finish or cancel it first",
            state.phase()
        ));
    }
    if kind == RunKind::Migration && state.phase() == solstice_migration::Phase::MigrationComplete
    {
        println!("Migration is already complete; nothing to do.");
        return Ok(());
    }

    let events = load_events(events_path).await?;
    let ids: Vec<_> = events.iter().map(|event| event.id).collect();

    // A preview writes to a scratch sink; a migration keeps its rows.
    let tables = Arc::new(MemoryTables::new());
    let source = Arc::new(MemoryEvents::new(events));
    let mut registry = StrategyRegistry::with_defaults();
    registry
        .register(Arc::new(SingleEventStrategy::new(
            source,
            Arc::clone(&tables) as Arc<dyn TableWriter>,
        )))
        .map_err(|e| miette::miette!("{}", e))?;

    // Stop between events on ctrl-c; never mid-apply.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    let summary = runner::run_pass(&mut state, &registry, slug, &ids, kind, &shutdown_rx)
        .map_err(|e| miette::miette!("{}", e))?;

    match kind {
        RunKind::Preview => print_summary("Preview", &summary),
        RunKind::Migration => {
            print_summary("Migration", &summary);
            if !summary.interrupted {
                let rows_path = data_dir.join("event-rows.json");
                let rows = serde_json::to_string_pretty(&tables.rows())
                    .map_err(|e| miette::miette!("{}", e))?;
                tokio::fs::write(&rows_path, rows)
                    .await
                    .map_err(|e| miette::miette!("cannot write {}: {}", rows_path.display(), e))?;
                println!("Wrote {} row(s) to {}", tables.len(), rows_path.display());
            }
        }
    }

    Ok(())
}

fn run_cancel(data_dir: &Path) -> Result<()> {
    let mut state = open_state(data_dir)?;

    if !state.is_running() {
        println!("No run in progress (phase {}); nothing to cancel.", state.phase());
        return Ok(());
    }

    runner::cancel(&mut state).map_err(|e| miette::miette!("{}", e))?;
    println!("Cancelled; back to the preview prompt.");
    Ok(())
}

fn run_undo(data_dir: &Path) -> Result<()> {
    let state = open_state(data_dir)?;

    // Stable gate: the state machine does not allow undo in this version,
    // whatever phase the migration is in. Strategies already carry their
    // per-event undo; the pass gets wired in when the gate opens.
    if state.can_be_undone() {
        return Err(miette::miette!(
            "undo gate is open but the undo pass is not wired into this driver"
        ));
    }

    println!(
        "Undo is not available for this migration (phase {}).",
        state.phase()
    );
    Ok(())
}

fn print_summary(kind: &str, summary: &BatchSummary) {
    println!(
        "{kind}: {} event(s), {} succeeded, {} failed",
        summary.total, summary.succeeded, summary.failed
    );
    for report in summary.reports.iter().filter(|r| r.is_failure()) {
        println!(
            "  - event {}: {}",
            report.event_id(),
            report.error().unwrap_or("unknown error")
        );
    }
    if summary.interrupted {
        println!("Interrupted before completion; run `solstice cancel` to reset the phase.");
    }
}
