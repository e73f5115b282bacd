//! Migration core for Solstice.
//!
//! Moves event records out of a legacy storage representation into
//! normalized custom tables. This crate holds:
//! - the persisted migration [`MigrationState`] with its phase machine
//! - the [`MigrationStrategy`] abstraction, registry, and variants
//! - the [`StateStore`] port plus memory- and file-backed implementations
//! - the event ports the driver wires real storage into
//!
//! The batch worker that selects events and the admin surfaces live
//! outside this crate; they consume the state and strategies defined here.

mod error;
mod event;
mod phase;
mod report;
mod state;
mod storage;
mod strategy;

pub use error::{MigrationError, StorageError};
pub use event::{
    EventId, EventRow, EventSource, LegacyEvent, MemoryEvents, MemoryTables, TableWriter,
};
pub use phase::Phase;
pub use report::{EventReport, MigrationOutcome};
pub use state::{MigrationState, STATE_OPTION_KEY};
pub use storage::{JsonFileStore, MemoryStore, StateStore};
pub use strategy::{
    MigrationStrategy, NULL_STRATEGY_SLUG, NullMigrationStrategy, SINGLE_EVENT_SLUG,
    SingleEventStrategy, StrategyRegistry,
};
