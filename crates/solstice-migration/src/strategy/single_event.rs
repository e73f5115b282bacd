//! The real per-event strategy: normalize one legacy event into a
//! custom-table row.

use std::sync::Arc;

use tracing::debug;

use crate::{
    EventReport, EventRow, EventSource, LegacyEvent, MigrationError, TableWriter,
};

use super::MigrationStrategy;

/// Slug for [`SingleEventStrategy`]. Stable across releases.
pub const SINGLE_EVENT_SLUG: &str = "solstice-single-event";

/// All-day events cover at least one day.
const DAY_SECS: i64 = 86_400;

/// Migrates one non-recurring event: reads the legacy record, derives the
/// normalized row (UTC range, duration, timezone, all-day flag), and
/// writes it to the custom tables.
pub struct SingleEventStrategy {
    source: Arc<dyn EventSource>,
    tables: Arc<dyn TableWriter>,
}

impl SingleEventStrategy {
    /// Build the strategy over the driver's event source and table writer.
    pub fn new(source: Arc<dyn EventSource>, tables: Arc<dyn TableWriter>) -> Self {
        Self { source, tables }
    }
}

impl MigrationStrategy for SingleEventStrategy {
    fn slug(&self) -> &'static str {
        SINGLE_EVENT_SLUG
    }

    fn apply(&self, mut report: EventReport) -> EventReport {
        let id = report.event_id();

        let event = match self.source.fetch(id) {
            Ok(Some(event)) => event,
            Ok(None) => {
                report.migration_failed(format!("event {id} not found in legacy storage"));
                return report;
            }
            Err(err) => {
                report.migration_failed(format!("failed to read event {id}: {err}"));
                return report;
            }
        };

        let row = match normalize(&event) {
            Ok(row) => row,
            Err(reason) => {
                report.migration_failed(reason);
                return report;
            }
        };

        match self.tables.upsert(&row) {
            Ok(()) => {
                debug!(event = %id, duration = row.duration_secs, "migrated event row");
                report.migration_success();
            }
            Err(err) => {
                report.migration_failed(format!("failed to write row for event {id}: {err}"));
            }
        }

        report
    }

    /// Removes the migrated row, restoring the event to legacy-only.
    fn undo(&self, report: &mut EventReport) -> Result<(), MigrationError> {
        let id = report.event_id();
        self.tables.delete(id)?;
        debug!(event = %id, "removed migrated event row");
        Ok(())
    }
}

/// Derive the custom-table row for a legacy event.
fn normalize(event: &LegacyEvent) -> Result<EventRow, String> {
    let duration = (event.end_utc - event.start_utc).num_seconds();
    if duration < 0 {
        return Err(format!("event {} ends before it starts", event.id));
    }

    let duration = if event.all_day {
        duration.max(DAY_SECS)
    } else {
        duration
    };

    Ok(EventRow {
        event_id: event.id,
        start_utc: event.start_utc,
        end_utc: event.end_utc,
        duration_secs: duration,
        timezone: event.timezone.clone(),
        all_day: event.all_day,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EventId, MemoryEvents, MemoryTables};
    use chrono::{TimeZone, Utc};
    use serde_json::Map;

    fn legacy_event(id: u64, start_hour: u32, end_hour: u32) -> LegacyEvent {
        LegacyEvent {
            id: EventId(id),
            title: format!("Event {id}"),
            start_utc: Utc.with_ymd_and_hms(2024, 6, 1, start_hour, 0, 0).unwrap(),
            end_utc: Utc.with_ymd_and_hms(2024, 6, 1, end_hour, 0, 0).unwrap(),
            timezone: "America/New_York".to_string(),
            all_day: false,
            meta: Map::new(),
        }
    }

    fn strategy_over(
        events: Vec<LegacyEvent>,
    ) -> (SingleEventStrategy, Arc<MemoryTables>) {
        let tables = Arc::new(MemoryTables::new());
        let strategy = SingleEventStrategy::new(
            Arc::new(MemoryEvents::new(events)),
            Arc::clone(&tables) as Arc<dyn TableWriter>,
        );
        (strategy, tables)
    }

    #[test]
    fn success_writes_one_row_with_duration() {
        let (strategy, tables) = strategy_over(vec![legacy_event(1, 10, 12)]);

        let report = strategy.apply(EventReport::new(EventId(1)));
        assert!(report.is_success());
        assert_eq!(tables.len(), 1);

        let row = tables.row(EventId(1)).unwrap();
        assert_eq!(row.duration_secs, 7200);
        assert_eq!(row.timezone, "America/New_York");
    }

    #[test]
    fn all_day_event_covers_at_least_a_day() {
        let mut event = legacy_event(2, 0, 0);
        event.all_day = true;
        let (strategy, tables) = strategy_over(vec![event]);

        let report = strategy.apply(EventReport::new(EventId(2)));
        assert!(report.is_success());
        assert_eq!(tables.row(EventId(2)).unwrap().duration_secs, DAY_SECS);
    }

    #[test]
    fn missing_event_records_failure_without_writing() {
        let (strategy, tables) = strategy_over(vec![]);

        let report = strategy.apply(EventReport::new(EventId(9)));
        assert!(report.is_failure());
        assert!(report.error().unwrap().contains("not found"));
        assert!(tables.is_empty());
    }

    #[test]
    fn inverted_range_records_failure() {
        let (strategy, tables) = strategy_over(vec![legacy_event(3, 12, 10)]);

        let report = strategy.apply(EventReport::new(EventId(3)));
        assert!(report.is_failure());
        assert!(report.error().unwrap().contains("ends before it starts"));
        assert!(tables.is_empty());
    }

    #[test]
    fn undo_removes_the_migrated_row() {
        let (strategy, tables) = strategy_over(vec![legacy_event(4, 8, 9)]);

        let mut report = strategy.apply(EventReport::new(EventId(4)));
        assert_eq!(tables.len(), 1);

        strategy.undo(&mut report).unwrap();
        assert!(tables.is_empty());
    }
}
