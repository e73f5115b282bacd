//! Batch runner: drives a strategy over a set of events and moves the
//! persisted phase through a pass.
//!
//! The runner owns no selection policy; it processes exactly the ids it
//! is handed. A shutdown signal is honored between events, never inside a
//! strategy's `apply`.

use chrono::Utc;
use tokio::sync::watch;
use tracing::{info, warn};

use solstice_migration::{
    EventId, EventReport, MigrationError, MigrationState, Phase,
    StrategyRegistry,
};

/// Aggregated outcome of one batch run.
#[derive(Debug)]
pub struct BatchSummary {
    /// Events handed to the runner.
    pub total: usize,
    /// Events whose report ended in success.
    pub succeeded: usize,
    /// Events whose report ended in failure.
    pub failed: usize,
    /// Whether a shutdown signal stopped the run before the end.
    pub interrupted: bool,
    /// Per-event reports, in processing order.
    pub reports: Vec<EventReport>,
}

/// Which pass a run performs. Both passes drive the same loop; they differ
/// in the phases they move through and whether completion is stamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    /// Dry-run against a scratch sink; ends at the migration prompt.
    Preview,
    /// The real pass; ends at migration complete.
    Migration,
}

impl RunKind {
    fn in_progress_phase(&self) -> Phase {
        match self {
            RunKind::Preview => Phase::PreviewInProgress,
            RunKind::Migration => Phase::MigrationInProgress,
        }
    }

    fn done_phase(&self) -> Phase {
        match self {
            RunKind::Preview => Phase::MigrationPrompt,
            RunKind::Migration => Phase::MigrationComplete,
        }
    }

    fn key(&self) -> &'static str {
        match self {
            RunKind::Preview => "preview",
            RunKind::Migration => "migration",
        }
    }
}

/// Apply the strategy registered under `slug` to each event, aggregating
/// one report per event. Checks `shutdown` between events.
pub fn run_batch(
    registry: &StrategyRegistry,
    slug: &str,
    events: &[EventId],
    shutdown: &watch::Receiver<bool>,
) -> Result<BatchSummary, MigrationError> {
    let strategy = registry.require(slug)?;

    let mut summary = BatchSummary {
        total: events.len(),
        succeeded: 0,
        failed: 0,
        interrupted: false,
        reports: Vec::with_capacity(events.len()),
    };

    for &id in events {
        if *shutdown.borrow() {
            warn!(processed = summary.reports.len(), "shutdown requested, stopping batch");
            summary.interrupted = true;
            break;
        }

        let mut report = EventReport::new(id);
        report.record_strategy(slug);
        let report = strategy.apply(report);

        if report.is_success() {
            summary.succeeded += 1;
        } else {
            summary.failed += 1;
            warn!(event = %id, error = ?report.error(), "event migration failed");
        }
        summary.reports.push(report);
    }

    info!(
        total = summary.total,
        succeeded = summary.succeeded,
        failed = summary.failed,
        interrupted = summary.interrupted,
        "batch finished"
    );
    Ok(summary)
}

/// Run a full pass: move to the in-progress phase, process the batch, and
/// on an uninterrupted finish advance to the pass's end phase.
///
/// An interrupted run leaves the in-progress phase persisted for `cancel`
/// to resolve. A migration pass stamps the completion time and both
/// passes record their tallies in the state's extension data.
pub fn run_pass(
    state: &mut MigrationState,
    registry: &StrategyRegistry,
    slug: &str,
    events: &[EventId],
    kind: RunKind,
    shutdown: &watch::Receiver<bool>,
) -> Result<BatchSummary, MigrationError> {
    state.set_phase(kind.in_progress_phase());
    state.save()?;

    let summary = run_batch(registry, slug, events, shutdown)?;

    if summary.interrupted {
        return Ok(summary);
    }

    state.set_phase(kind.done_phase());
    if kind == RunKind::Migration {
        state.set_complete_timestamp(Some(Utc::now()));
    }
    state.set(&[kind.key(), "total"], summary.total);
    state.set(&[kind.key(), "succeeded"], summary.succeeded);
    state.set(&[kind.key(), "failed"], summary.failed);
    state.save()?;

    Ok(summary)
}

/// Resolve an in-progress pass back to the starting prompt.
pub fn cancel(state: &mut MigrationState) -> Result<(), MigrationError> {
    state.set_phase(Phase::CancellationInProgress);
    state.save()?;

    // Nothing to wait on in this driver: strategies are synchronous, so an
    // in-progress phase with no running worker is already quiescent.
    state.set_phase(Phase::PreviewPrompt);
    state.set_complete_timestamp(None);
    state.save()?;

    info!("migration cancelled, back to preview prompt");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use solstice_migration::{
        MemoryStore, NULL_STRATEGY_SLUG, StateStore,
    };

    fn ids(range: std::ops::Range<u64>) -> Vec<EventId> {
        range.map(EventId).collect()
    }

    fn fresh_state(store: &Arc<MemoryStore>) -> MigrationState {
        MigrationState::load(Arc::clone(store) as Arc<dyn StateStore>).unwrap()
    }

    #[test]
    fn null_batch_succeeds_for_every_event() {
        let registry = StrategyRegistry::with_defaults();
        let (_tx, rx) = watch::channel(false);

        let summary = run_batch(&registry, NULL_STRATEGY_SLUG, &ids(1..6), &rx).unwrap();
        assert_eq!(summary.total, 5);
        assert_eq!(summary.succeeded, 5);
        assert_eq!(summary.failed, 0);
        assert!(!summary.interrupted);
        assert!(summary.reports.iter().all(|r| r.is_success()));
    }

    #[test]
    fn unknown_slug_is_an_error() {
        let registry = StrategyRegistry::new();
        let (_tx, rx) = watch::channel(false);
        assert!(matches!(
            run_batch(&registry, "missing", &ids(1..2), &rx),
            Err(MigrationError::UnknownStrategy(_))
        ));
    }

    #[test]
    fn shutdown_before_start_processes_nothing() {
        let registry = StrategyRegistry::with_defaults();
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let summary = run_batch(&registry, NULL_STRATEGY_SLUG, &ids(1..10), &rx).unwrap();
        assert!(summary.interrupted);
        assert!(summary.reports.is_empty());
    }

    #[test]
    fn migration_pass_advances_phase_and_stamps_completion() {
        let store = Arc::new(MemoryStore::new());
        let mut state = fresh_state(&store);
        let registry = StrategyRegistry::with_defaults();
        let (_tx, rx) = watch::channel(false);

        let summary = run_pass(
            &mut state,
            &registry,
            NULL_STRATEGY_SLUG,
            &ids(1..4),
            RunKind::Migration,
            &rx,
        )
        .unwrap();
        assert_eq!(summary.succeeded, 3);

        let reloaded = fresh_state(&store);
        assert_eq!(reloaded.phase(), Phase::MigrationComplete);
        assert!(reloaded.is_completed());
        assert!(reloaded.complete_timestamp().is_some());
        assert_eq!(
            reloaded.get(&["migration", "succeeded"]),
            Some(&serde_json::json!(3))
        );
    }

    #[test]
    fn preview_pass_ends_at_migration_prompt() {
        let store = Arc::new(MemoryStore::new());
        let mut state = fresh_state(&store);
        let registry = StrategyRegistry::with_defaults();
        let (_tx, rx) = watch::channel(false);

        run_pass(
            &mut state,
            &registry,
            NULL_STRATEGY_SLUG,
            &ids(1..4),
            RunKind::Preview,
            &rx,
        )
        .unwrap();

        let reloaded = fresh_state(&store);
        assert_eq!(reloaded.phase(), Phase::MigrationPrompt);
        // "Preview complete" counts as completed, with no timestamp.
        assert!(reloaded.is_completed());
        assert!(reloaded.complete_timestamp().is_none());
    }

    #[test]
    fn interrupted_pass_keeps_the_in_progress_phase() {
        let store = Arc::new(MemoryStore::new());
        let mut state = fresh_state(&store);
        let registry = StrategyRegistry::with_defaults();
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let summary = run_pass(
            &mut state,
            &registry,
            NULL_STRATEGY_SLUG,
            &ids(1..4),
            RunKind::Migration,
            &rx,
        )
        .unwrap();
        assert!(summary.interrupted);

        let reloaded = fresh_state(&store);
        assert_eq!(reloaded.phase(), Phase::MigrationInProgress);
        assert!(reloaded.should_lock_for_maintenance());
    }

    #[test]
    fn cancel_returns_to_preview_prompt() {
        let store = Arc::new(MemoryStore::new());
        let mut state = fresh_state(&store);
        state.set_phase(Phase::MigrationInProgress);
        state.save().unwrap();

        cancel(&mut state).unwrap();

        let reloaded = fresh_state(&store);
        assert_eq!(reloaded.phase(), Phase::PreviewPrompt);
        assert!(reloaded.complete_timestamp().is_none());
        assert!(!reloaded.is_running());
    }
}
