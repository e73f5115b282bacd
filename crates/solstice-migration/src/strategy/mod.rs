//! Per-event migration strategies.
//!
//! A strategy is the unit of work that migrates (or skips) one event's
//! data. The driver picks a strategy from the [`StrategyRegistry`] by
//! slug, threads an [`EventReport`] through it, and aggregates the
//! returned reports.

use std::collections::HashMap;
use std::sync::Arc;

use crate::{EventReport, MigrationError};

mod null;
mod single_event;

pub use null::{NULL_STRATEGY_SLUG, NullMigrationStrategy};
pub use single_event::{SINGLE_EVENT_SLUG, SingleEventStrategy};

/// One way of migrating a single event.
pub trait MigrationStrategy: Send + Sync {
    /// Stable registry identifier. Persisted in per-event selection
    /// records, so it must not change across releases.
    fn slug(&self) -> &'static str;

    /// Migrate the event the report describes.
    ///
    /// Expected failures are recorded on the report, never returned or
    /// panicked; the same report comes back for chaining.
    fn apply(&self, report: EventReport) -> EventReport;

    /// Reverse a previously applied migration.
    ///
    /// Only valid for events this strategy migrated; calling it on
    /// anything else is a caller contract violation. Variants that cannot
    /// reverse return [`MigrationError::UndoUnsupported`].
    fn undo(&self, report: &mut EventReport) -> Result<(), MigrationError>;
}

/// Maps slugs to strategy instances for selection by the driver.
#[derive(Default)]
pub struct StrategyRegistry {
    strategies: HashMap<&'static str, Arc<dyn MigrationStrategy>>,
}

impl StrategyRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry preloaded with the null strategy.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        // Slugs are unique by construction here.
        let _ = registry.register(Arc::new(NullMigrationStrategy));
        registry
    }

    /// Register a strategy under its slug. Registering a second strategy
    /// with the same slug is an error.
    pub fn register(
        &mut self,
        strategy: Arc<dyn MigrationStrategy>,
    ) -> Result<(), MigrationError> {
        let slug = strategy.slug();
        if self.strategies.contains_key(slug) {
            return Err(MigrationError::StrategyExists(slug.to_string()));
        }
        self.strategies.insert(slug, strategy);
        Ok(())
    }

    /// Look up a strategy by slug.
    pub fn get(&self, slug: &str) -> Option<Arc<dyn MigrationStrategy>> {
        self.strategies.get(slug).cloned()
    }

    /// Like [`get`](Self::get) but failing with
    /// [`MigrationError::UnknownStrategy`] on a miss.
    pub fn require(&self, slug: &str) -> Result<Arc<dyn MigrationStrategy>, MigrationError> {
        self.get(slug)
            .ok_or_else(|| MigrationError::UnknownStrategy(slug.to_string()))
    }

    /// All registered slugs, sorted.
    pub fn slugs(&self) -> Vec<&'static str> {
        let mut slugs: Vec<_> = self.strategies.keys().copied().collect();
        slugs.sort_unstable();
        slugs
    }
}
