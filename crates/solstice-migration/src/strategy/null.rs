//! A strategy that performs no migration and flags the event as migrated.

use crate::{EventReport, MigrationError};

use super::MigrationStrategy;

/// Slug for [`NullMigrationStrategy`]. Stable across releases.
pub const NULL_STRATEGY_SLUG: &str = "solstice-null-strategy";

/// Migrates nothing. Useful for events whose data already matches the
/// custom tables, and as the registry's safe default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMigrationStrategy;

impl MigrationStrategy for NullMigrationStrategy {
    fn slug(&self) -> &'static str {
        NULL_STRATEGY_SLUG
    }

    /// Does not touch the event's data; the report is flagged as a
    /// success. There is no failure path: the strategy cannot fail by
    /// construction.
    fn apply(&self, mut report: EventReport) -> EventReport {
        report.migration_success();
        report
    }

    /// Nothing was written, so there is nothing to reverse. Surfaced as an
    /// explicit unsupported result rather than a silent no-op.
    fn undo(&self, _report: &mut EventReport) -> Result<(), MigrationError> {
        Err(MigrationError::UndoUnsupported(
            NULL_STRATEGY_SLUG.to_string(),
        ))
    }
}
